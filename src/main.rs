// 该文件是 Guanlan （观澜） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod args;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use guanlan::{
  config::{DISPLAY_HEIGHT, DISPLAY_WIDTH, FALLBACK_FPS, RunConfig, WINDOW_NAME},
  input::{FrameSource, GStreamerCapture},
  labels::LabelTable,
  model::CaffeClassifierBuilder,
  output::{GStreamerVideoSink, display::HighGuiDisplay, draw::Painter},
  task::{AnnotateTask, Interrupt, Task, TaskSummary},
};

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = match args::Args::try_parse() {
    Ok(args) => args,
    Err(e) => {
      // --help / --version 走标准输出，正常退出
      let code = if e.use_stderr() {
        ExitCode::FAILURE
      } else {
        ExitCode::SUCCESS
      };
      let _ = e.print();
      return code;
    }
  };

  match run(args) {
    Ok(summary) => {
      info!("退出原因: {:?}", summary.stop);
      ExitCode::SUCCESS
    }
    Err(e) => {
      error!("{:#}", e);
      ExitCode::FAILURE
    }
  }
}

fn run(args: args::Args) -> Result<TaskSummary> {
  let config = RunConfig::try_from(args).context("参数错误")?;

  info!("输入来源: {}", config.source);
  info!("输出路径: {}", config.output.display());
  info!("模型目录: {}", config.model_dir.display());
  info!("帧间隔: {}", config.frame_skip);

  let capture = GStreamerCapture::open(&config.source).context("无法打开视频")?;

  let labels = LabelTable::load(config.label_path()).context("无法读取标签文件")?;

  let classifier = CaffeClassifierBuilder::new(config.deploy_path(), config.weights_path())
    .accelerate(config.accelerate)
    .build()
    .context("无法加载 Caffe 模型")?;

  let painter = Painter::from_file(&config.font).context("无法加载字体")?;

  let (width, height) = capture.resolution();
  info!("输入尺寸: {}x{}", width, height);
  let fps = capture.fps().unwrap_or(FALLBACK_FPS);
  let sink = GStreamerVideoSink::create(&config.output, DISPLAY_WIDTH, DISPLAY_HEIGHT, fps)
    .context("无法创建输出视频")?;

  let interrupt = Interrupt::new();
  interrupt
    .install_ctrlc()
    .context("无法注册 Ctrl-C 处理")?;

  let mut task = AnnotateTask::from_config(&config, labels, painter).with_interrupt(interrupt);
  if !config.headless {
    task = task.with_display(HighGuiDisplay::new(WINDOW_NAME));
  }

  let summary = task.run_task(capture, classifier, sink)?;
  Ok(summary)
}
