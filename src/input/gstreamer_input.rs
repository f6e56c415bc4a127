// 该文件是 Guanlan （观澜） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频采集
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

//! # GStreamer 视频采集
//!
//! 根据 [`SourceSpec`] 构建解码管道，统一转换为 RGB 后由 appsink 取帧：
//! - 默认摄像头：`autovideosrc`
//! - 编号摄像头：`v4l2src device=/dev/videoN`
//! - 本地文件：`filesrc ! decodebin`
//! - 其他 URI（RTSP、HTTP、file://）：`uridecodebin`
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! 打开时会先拉取第一帧，以便在进入主循环前确认源可用，并得到帧率与分辨率。

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::Frame,
  input::{FrameSource, SourceSpec},
};

#[derive(Error, Debug)]
pub enum GStreamerCaptureError {
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("Cannot open video source: {0}")]
  SourceUnavailable(String),
}

enum PipelineItem<'a> {
  AutoCamera,
  V4l2Camera(u32),
  FileSource(&'a Path),
  UriSource(&'a url::Url),
  TargetFormat,
  AppSink { live: bool },
}

impl PipelineItem<'_> {
  fn to_pipeline(&self) -> String {
    match self {
      PipelineItem::AutoCamera => "autovideosrc".to_string(),
      PipelineItem::V4l2Camera(index) => format!("v4l2src device=/dev/video{}", index),
      PipelineItem::FileSource(path) => {
        format!("filesrc location=\"{}\" ! decodebin", path.display())
      }
      PipelineItem::UriSource(uri) => format!("uridecodebin uri=\"{}\"", uri),
      PipelineItem::TargetFormat => "videoconvert ! video/x-raw,format=RGB".to_string(),
      // 摄像头只保留最新帧，文件则逐帧读取
      PipelineItem::AppSink { live: true } => {
        "appsink name=sink max-buffers=2 drop=true sync=false".to_string()
      }
      PipelineItem::AppSink { live: false } => {
        "appsink name=sink max-buffers=2 sync=false".to_string()
      }
    }
  }
}

/// 生成采集管道描述
pub(crate) fn pipeline_description(spec: &SourceSpec) -> String {
  let source = match spec {
    SourceSpec::DefaultCamera => PipelineItem::AutoCamera,
    SourceSpec::Camera(index) => PipelineItem::V4l2Camera(*index),
    SourceSpec::File(path) => PipelineItem::FileSource(path),
    SourceSpec::Uri(uri) => PipelineItem::UriSource(uri),
  };
  [
    source,
    PipelineItem::TargetFormat,
    PipelineItem::AppSink {
      live: spec.is_camera(),
    },
  ]
  .iter()
  .map(PipelineItem::to_pipeline)
  .collect::<Vec<_>>()
  .join(" ! ")
}

/// 基于 GStreamer 的帧来源
pub struct GStreamerCapture {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  pending: Option<Frame>,
  fps: Option<f64>,
  resolution: (u32, u32),
  released: bool,
}

impl GStreamerCapture {
  pub fn open(spec: &SourceSpec) -> Result<Self, GStreamerCaptureError> {
    gst::init()?;

    let description = pipeline_description(spec);
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerCaptureError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerCaptureError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerCaptureError::AppSinkConversionFailed)?;

    if let Err(e) = pipeline.set_state(gst::State::Playing) {
      // 状态切换错误本身不含原因，具体原因在总线上
      let reason = bus_error(&pipeline).unwrap_or_else(|| e.to_string());
      if let Err(e) = pipeline.set_state(gst::State::Null) {
        warn!("Failed to stop GStreamer pipeline: {}", e);
      }
      return Err(GStreamerCaptureError::SourceUnavailable(reason));
    }

    let mut capture = GStreamerCapture {
      pipeline,
      appsink,
      pending: None,
      fps: None,
      resolution: (0, 0),
      released: false,
    };

    // 第一帧用于确认源可用
    let sample = match capture.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(_) => {
        let reason = bus_error(&capture.pipeline)
          .unwrap_or_else(|| "no frame before end of stream".to_string());
        capture.release();
        return Err(GStreamerCaptureError::SourceUnavailable(reason));
      }
    };
    let (frame, fps) = convert_sample(&sample)?;
    capture.resolution = frame.resolution();
    capture.fps = fps;
    capture.pending = Some(frame);

    info!(
      "视频源已打开: {}x{}, 帧率: {}",
      capture.resolution.0,
      capture.resolution.1,
      fps.map(|f| format!("{:.2}", f))
        .unwrap_or_else(|| "未知".to_string())
    );

    Ok(capture)
  }

}

fn bus_error(pipeline: &gst::Pipeline) -> Option<String> {
  let bus = pipeline.bus()?;
  let message = bus.pop_filtered(&[gst::MessageType::Error])?;
  match message.view() {
    gst::MessageView::Error(err) => Some(format!(
      "{} ({})",
      err.error(),
      err.debug().map(|d| d.to_string()).unwrap_or_default()
    )),
    _ => None,
  }
}

impl FrameSource for GStreamerCapture {
  type Error = GStreamerCaptureError;

  fn read(&mut self) -> Result<Option<Frame>, Self::Error> {
    if let Some(frame) = self.pending.take() {
      return Ok(Some(frame));
    }
    if self.released {
      return Ok(None);
    }

    match self.appsink.pull_sample() {
      Ok(sample) => convert_sample(&sample).map(|(frame, _)| Some(frame)),
      Err(_) => match bus_error(&self.pipeline) {
        Some(reason) => {
          error!("视频源错误: {}", reason);
          Err(GStreamerCaptureError::PipelineError(reason))
        }
        None => {
          debug!("视频源到达流末尾");
          Ok(None)
        }
      },
    }
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn resolution(&self) -> (u32, u32) {
    self.resolution
  }

  fn release(&mut self) {
    if self.released {
      return;
    }
    self.released = true;
    self.pending = None;
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
    debug!("视频源已释放");
  }
}

impl Drop for GStreamerCapture {
  fn drop(&mut self) {
    self.release();
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<(Frame, Option<f64>), GStreamerCaptureError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerCaptureError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerCaptureError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerCaptureError::VideoInfoError)?;

  let fps = {
    let fraction = video_info.fps();
    (fraction.numer() > 0 && fraction.denom() > 0)
      .then(|| fraction.numer() as f64 / fraction.denom() as f64)
  };

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;
  let row_bytes = width * 3;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerCaptureError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  // 行之间可能有对齐填充
  let expected_size = stride * (height.saturating_sub(1)) + row_bytes;
  if stride < row_bytes || data.len() < expected_size {
    return Err(GStreamerCaptureError::BufferSizeMismatch {
      expected: expected_size,
      actual: data.len(),
    });
  }

  let bgr = match video_info.format() {
    gst_video::VideoFormat::Rgb => false,
    gst_video::VideoFormat::Bgr => true,
    other => return Err(GStreamerCaptureError::UnsupportedFormat(other)),
  };

  let mut pixels = Vec::with_capacity(row_bytes * height);
  for row in data.chunks(stride).take(height) {
    let row = &row[..row_bytes];
    if bgr {
      pixels.extend(row.chunks_exact(3).flat_map(|px| [px[2], px[1], px[0]]));
    } else {
      pixels.extend_from_slice(row);
    }
  }

  let frame = Frame::from_raw(width as u32, height as u32, pixels)
    .map_err(|e| GStreamerCaptureError::PipelineError(e.to_string()))?;
  Ok((frame, fps))
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;

  #[test]
  fn camera_pipeline_drops_stale_frames() {
    let description = pipeline_description(&SourceSpec::Camera(1));
    assert_eq!(
      description,
      "v4l2src device=/dev/video1 ! videoconvert ! video/x-raw,format=RGB ! \
       appsink name=sink max-buffers=2 drop=true sync=false"
    );
  }

  #[test]
  fn default_camera_uses_autovideosrc() {
    let description = pipeline_description(&SourceSpec::DefaultCamera);
    assert!(description.starts_with("autovideosrc ! "));
    assert!(description.contains("drop=true"));
  }

  #[test]
  fn file_pipeline_keeps_every_frame() {
    let description = pipeline_description(&SourceSpec::File(PathBuf::from("in.mp4")));
    assert!(description.starts_with("filesrc location=\"in.mp4\" ! decodebin ! "));
    assert!(!description.contains("drop=true"));
  }

  #[test]
  fn uri_pipeline_uses_uridecodebin() {
    let spec = SourceSpec::parse("rtsp://cam.local/stream").unwrap();
    let description = pipeline_description(&spec);
    assert!(description.starts_with("uridecodebin uri=\"rtsp://cam.local/stream\""));
  }

  #[test]
  fn missing_file_reports_cause_and_stops_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let spec = SourceSpec::File(dir.path().join("missing.mp4"));
    match GStreamerCapture::open(&spec) {
      Ok(_) => panic!("a missing file must not open"),
      // 缺少插件时管道无法构建
      Err(GStreamerCaptureError::GStreamerError(_)) => {}
      Err(GStreamerCaptureError::SourceUnavailable(reason)) => {
        assert_ne!(reason, gst::StateChangeError.to_string());
      }
      Err(other) => panic!("unexpected error: {}", other),
    }
  }
}
