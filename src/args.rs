// 该文件是 Guanlan （观澜） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::{num::NonZeroU16, path::PathBuf};

use clap::{ArgAction, Parser};

use guanlan::{
  config::{DEFAULT_FONT, DEFAULT_OUTPUT, RunConfig},
  input::{SourceSpec, SourceSpecError},
};

/// GoogLeNet 视频分类演示
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源：视频文件路径或 URI；留空使用默认摄像头，数字选择 /dev/videoN
  #[arg(short = 'i', long = "in", value_name = "SOURCE", default_value = "")]
  pub input: String,

  /// 输出视频路径，扩展名决定编码方式（mp4/mkv/avi/webm）
  #[arg(short = 'o', long = "out", value_name = "OUTPUT", default_value = DEFAULT_OUTPUT)]
  pub output: PathBuf,

  /// 有 CUDA 设备时使用 GPU 推理
  #[arg(short = 'c', long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
  pub cuda: bool,

  /// 每 N 帧处理一帧
  #[arg(
    short = 'f',
    long = "frame",
    value_name = "N",
    default_value_t = 1,
    value_parser = clap::value_parser!(u16).range(1..)
  )]
  pub frame: u16,

  /// 模型与标签文件所在目录
  #[arg(long, value_name = "DIR", default_value = ".")]
  pub model_dir: PathBuf,

  /// 叠加文本使用的 TrueType 字体
  #[arg(long, value_name = "FILE", default_value = DEFAULT_FONT)]
  pub font: PathBuf,

  /// 不打开预览窗口
  #[arg(long)]
  pub headless: bool,

  /// 处理指定帧数后退出
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<u64>,

  /// 不显示构建类型标记
  #[arg(long)]
  pub no_build_tag: bool,
}

impl TryFrom<Args> for RunConfig {
  type Error = SourceSpecError;

  fn try_from(args: Args) -> Result<Self, Self::Error> {
    Ok(RunConfig {
      source: SourceSpec::parse(&args.input)?,
      output: args.output,
      accelerate: args.cuda,
      frame_skip: NonZeroU16::new(args.frame).unwrap_or(NonZeroU16::MIN),
      model_dir: args.model_dir,
      font: args.font,
      headless: args.headless,
      max_frames: args.max_frames,
      build_tag: !args.no_build_tag,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_camera_demo() {
    let args = Args::try_parse_from(["guanlan"]).unwrap();
    let config = RunConfig::try_from(args).unwrap();
    assert_eq!(config.source, SourceSpec::DefaultCamera);
    assert_eq!(config.output, PathBuf::from("output.mp4"));
    assert!(config.accelerate);
    assert_eq!(config.frame_skip.get(), 1);
    assert!(config.build_tag);
  }

  #[test]
  fn short_flags_configure_file_variant() {
    let args = Args::try_parse_from([
      "guanlan", "-i", "cat.mp4", "-o", "out.avi", "-c", "false", "-f", "3",
    ])
    .unwrap();
    let config = RunConfig::try_from(args).unwrap();
    assert_eq!(config.source, SourceSpec::File(PathBuf::from("cat.mp4")));
    assert_eq!(config.output, PathBuf::from("out.avi"));
    assert!(!config.accelerate);
    assert_eq!(config.frame_skip.get(), 3);
  }

  #[test]
  fn zero_frame_skip_is_rejected() {
    assert!(Args::try_parse_from(["guanlan", "--frame", "0"]).is_err());
  }

  #[test]
  fn help_is_not_an_error_stream() {
    let err = Args::try_parse_from(["guanlan", "--help"]).unwrap_err();
    assert!(!err.use_stderr());
  }
}
