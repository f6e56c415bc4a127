// 该文件是 Guanlan （观澜） 项目的一部分。
// src/input.rs - 视频输入
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

use std::{fmt, path::PathBuf, str::FromStr};

use thiserror::Error;
use url::Url;

use crate::frame::Frame;

/// 帧来源
pub trait FrameSource {
  type Error;

  /// 读取下一帧，流结束时返回 `None`
  fn read(&mut self) -> Result<Option<Frame>, Self::Error>;

  /// 源声明的帧率
  fn fps(&self) -> Option<f64>;

  /// 源输出的帧尺寸 `(宽, 高)`
  fn resolution(&self) -> (u32, u32);

  /// 释放底层设备或文件，可重复调用
  fn release(&mut self);
}

#[derive(Error, Debug)]
pub enum SourceSpecError {
  #[error("无效的输入 URI '{0}': {1}")]
  InvalidUri(String, url::ParseError),
}

/// 输入来源描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
  /// 第一个可用摄像头
  DefaultCamera,
  /// 按编号选择的摄像头 `/dev/videoN`
  Camera(u32),
  File(PathBuf),
  Uri(Url),
}

impl SourceSpec {
  pub fn parse(input: &str) -> Result<Self, SourceSpecError> {
    let input = input.trim();
    if input.is_empty() {
      return Ok(SourceSpec::DefaultCamera);
    }
    if input.bytes().all(|b| b.is_ascii_digit())
      && let Ok(index) = input.parse::<u32>()
    {
      return Ok(SourceSpec::Camera(index));
    }
    if input.contains("://") {
      return Url::parse(input)
        .map(SourceSpec::Uri)
        .map_err(|e| SourceSpecError::InvalidUri(input.to_string(), e));
    }
    Ok(SourceSpec::File(PathBuf::from(input)))
  }

  pub fn is_camera(&self) -> bool {
    matches!(self, SourceSpec::DefaultCamera | SourceSpec::Camera(_))
  }
}

impl FromStr for SourceSpec {
  type Err = SourceSpecError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SourceSpec::parse(s)
  }
}

impl fmt::Display for SourceSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SourceSpec::DefaultCamera => write!(f, "默认摄像头"),
      SourceSpec::Camera(index) => write!(f, "摄像头 /dev/video{}", index),
      SourceSpec::File(path) => write!(f, "文件 {}", path.display()),
      SourceSpec::Uri(url) => write!(f, "URI {}", url),
    }
  }
}

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerCapture, GStreamerCaptureError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_input_selects_default_camera() {
    assert_eq!(SourceSpec::parse("").unwrap(), SourceSpec::DefaultCamera);
    assert_eq!(SourceSpec::parse("  ").unwrap(), SourceSpec::DefaultCamera);
  }

  #[test]
  fn number_selects_camera_index() {
    assert_eq!(SourceSpec::parse("2").unwrap(), SourceSpec::Camera(2));
    assert!(SourceSpec::parse("0").unwrap().is_camera());
  }

  #[test]
  fn path_selects_file() {
    assert_eq!(
      SourceSpec::parse("videos/cat.mp4").unwrap(),
      SourceSpec::File(PathBuf::from("videos/cat.mp4"))
    );
  }

  #[test]
  fn scheme_selects_uri() {
    let spec: SourceSpec = "rtsp://192.168.1.10:8554/stream".parse().unwrap();
    match spec {
      SourceSpec::Uri(url) => assert_eq!(url.scheme(), "rtsp"),
      other => panic!("unexpected source: {:?}", other),
    }
  }

  #[test]
  fn malformed_uri_is_rejected() {
    assert!(matches!(
      SourceSpec::parse("http://[::1"),
      Err(SourceSpecError::InvalidUri(..))
    ));
  }
}
