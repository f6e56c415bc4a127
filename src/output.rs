// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::Path;

use crate::frame::Frame;

/// 帧输出
pub trait FrameSink {
  type Error;

  fn write(&mut self, frame: &Frame) -> Result<(), Self::Error>;

  /// 结束写入并释放资源，可重复调用
  fn release(&mut self) -> Result<(), Self::Error>;
}

/// 输出容器与编码方式，由文件扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
  Mp4,
  Matroska,
  Avi,
  WebM,
}

impl Container {
  pub fn from_path(path: &Path) -> Self {
    let ext = path
      .extension()
      .and_then(|e| e.to_str())
      .map(str::to_ascii_lowercase);
    match ext.as_deref() {
      Some("mkv") => Container::Matroska,
      Some("avi") => Container::Avi,
      Some("webm") => Container::WebM,
      _ => Container::Mp4,
    }
  }

  /// appsrc 之后的编码与封装段
  pub fn encoder_pipeline(&self) -> &'static str {
    match self {
      Container::Mp4 => {
        "videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux"
      }
      Container::Matroska => {
        "videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! matroskamux"
      }
      Container::Avi => "videoconvert ! video/x-raw,format=I420 ! x264enc ! avimux",
      Container::WebM => "videoconvert ! vp8enc ! webmmux",
    }
  }
}

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::{GStreamerVideoSink, GStreamerVideoSinkError};

pub mod display;
pub mod draw;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn container_follows_extension() {
    assert_eq!(Container::from_path(Path::new("out.mp4")), Container::Mp4);
    assert_eq!(Container::from_path(Path::new("out.MKV")), Container::Matroska);
    assert_eq!(Container::from_path(Path::new("out.avi")), Container::Avi);
    assert_eq!(Container::from_path(Path::new("a/b.webm")), Container::WebM);
  }

  #[test]
  fn unknown_extension_falls_back_to_mp4() {
    assert_eq!(Container::from_path(Path::new("output")), Container::Mp4);
    assert_eq!(Container::from_path(Path::new("out.mov")), Container::Mp4);
  }

  #[test]
  fn webm_uses_vp8() {
    assert!(Container::WebM.encoder_pipeline().contains("vp8enc"));
    assert!(Container::Avi.encoder_pipeline().ends_with("avimux"));
  }
}
