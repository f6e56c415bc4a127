// 该文件是 Guanlan （观澜） 项目的一部分。
// src/config.rs - 常量与运行配置
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

use std::{
  num::NonZeroU16,
  path::{Path, PathBuf},
  time::Duration,
};

use crate::input::SourceSpec;

/// 标签文件名
pub const LABEL_FILE: &str = "synset_words.txt";
/// 网络描述文件名
pub const DEPLOY_FILE: &str = "bvlc_googlenet.prototxt";
/// 网络权重文件名
pub const WEIGHTS_FILE: &str = "bvlc_googlenet.caffemodel";

/// 显示与输出帧尺寸
pub const DISPLAY_WIDTH: u32 = 500;
pub const DISPLAY_HEIGHT: u32 = 500;

/// 每帧等待按键的时间
pub const KEY_DELAY: Duration = Duration::from_millis(1);
/// Esc 键码
pub const ESCAPE_KEY: i32 = 27;

/// 显示窗口名
pub const WINDOW_NAME: &str = "GoogLeNet-demo";

// 网络输入归一化参数（BGR 顺序）
pub const NET_INPUT_WIDTH: u32 = 224;
pub const NET_INPUT_HEIGHT: u32 = 224;
pub const NET_MEAN_BGR: [f32; 3] = [104.0, 117.0, 123.0];
pub const NET_SCALE: f32 = 1.0;
pub const NET_INPUT_BLOB: &str = "data";
pub const NET_OUTPUT_BLOB: &str = "prob";

/// 源未声明帧率时输出使用的帧率
pub const FALLBACK_FPS: f64 = 30.0;

// 叠加文本位置（基线左端，与文本长度无关）
pub const LABEL_ORIGIN: (i32, i32) = (10, 20);
pub const INFO_LEFT_X: i32 = 10;
pub const BUILD_TAG_X: i32 = 180;
pub const BACKEND_TAG_X: i32 = 300;
pub const RESOLUTION_RIGHT_OFFSET: i32 = 80;
pub const INFO_BOTTOM_MARGIN: i32 = 10;

pub const LABEL_FONT_SIZE: f32 = 18.0;
pub const INFO_FONT_SIZE: f32 = 15.0;
pub const LABEL_COLOR: [u8; 3] = [255, 0, 0]; // 红色
pub const INFO_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

pub const DEFAULT_OUTPUT: &str = "output.mp4";
pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// 运行配置，启动时构建一次，之后只读
#[derive(Debug, Clone)]
pub struct RunConfig {
  pub source: SourceSpec,
  pub output: PathBuf,
  pub accelerate: bool,
  pub frame_skip: NonZeroU16,
  pub model_dir: PathBuf,
  pub font: PathBuf,
  pub headless: bool,
  pub max_frames: Option<u64>,
  pub build_tag: bool,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      source: SourceSpec::DefaultCamera,
      output: PathBuf::from(DEFAULT_OUTPUT),
      accelerate: true,
      frame_skip: NonZeroU16::MIN,
      model_dir: PathBuf::from("."),
      font: PathBuf::from(DEFAULT_FONT),
      headless: false,
      max_frames: None,
      build_tag: true,
    }
  }
}

impl RunConfig {
  pub fn label_path(&self) -> PathBuf {
    self.model_file(LABEL_FILE)
  }

  pub fn deploy_path(&self) -> PathBuf {
    self.model_file(DEPLOY_FILE)
  }

  pub fn weights_path(&self) -> PathBuf {
    self.model_file(WEIGHTS_FILE)
  }

  fn model_file(&self, name: &str) -> PathBuf {
    Path::new(&self.model_dir).join(name)
  }
}
