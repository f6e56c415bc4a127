// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 将标注后的固定尺寸 RGB 帧编码写入文件，编码方式见 [`Container`]。
//!
//! ```no_run
//! use guanlan::output::{FrameSink, GStreamerVideoSink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sink = GStreamerVideoSink::create("output.mp4", 500, 500, 25.0)?;
//! // sink.write(&frame)?;
//! sink.release()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::FALLBACK_FPS,
  frame::Frame,
  output::{Container, FrameSink},
};

const EOS_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum GStreamerVideoSinkError {
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("Buffer creation error")]
  BufferCreationError,
  #[error("帧尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("输出已关闭")]
  Released,
  #[error("无法启动输出管道: {0}")]
  OutputUnavailable(String),
}

/// 生成编码管道描述
pub(crate) fn pipeline_description(path: &Path) -> String {
  format!(
    "appsrc name=src ! {} ! filesink location=\"{}\"",
    Container::from_path(path).encoder_pipeline(),
    path.display()
  )
}

/// GStreamer 视频文件输出
pub struct GStreamerVideoSink {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  path: PathBuf,
  size: (u32, u32),
  fps: f64,
  frame_count: u64,
  released: bool,
}

impl GStreamerVideoSink {
  pub fn create(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    fps: f64,
  ) -> Result<Self, GStreamerVideoSinkError> {
    let path = path.as_ref();
    let fps = if fps.is_finite() && fps > 0.0 {
      fps
    } else {
      FALLBACK_FPS
    };
    gst::init()?;

    let pipeline_desc = pipeline_description(path);
    info!("Creating video output pipeline: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerVideoSinkError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoSinkError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoSinkError::AppSrcConversionFailed)?;

    let framerate = gst::Fraction::approximate_f64(fps)
      .unwrap_or_else(|| gst::Fraction::new(FALLBACK_FPS as i32, 1));
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", framerate)
      .build();

    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    if let Err(e) = pipeline.set_state(gst::State::Playing) {
      let reason = bus_error(&pipeline).unwrap_or_else(|| e.to_string());
      if let Err(e) = pipeline.set_state(gst::State::Null) {
        warn!("Failed to stop GStreamer video output pipeline: {}", e);
      }
      return Err(GStreamerVideoSinkError::OutputUnavailable(reason));
    }

    info!(
      "Video output initialized: {}x{} @ {:.2} fps -> {}",
      width,
      height,
      fps,
      path.display()
    );

    Ok(GStreamerVideoSink {
      pipeline,
      appsrc,
      path: path.to_path_buf(),
      size: (width, height),
      fps,
      frame_count: 0,
      released: false,
    })
  }

  fn push_frame(&mut self, data: &[u8]) -> Result<(), GStreamerVideoSinkError> {
    let mut buffer = gst::Buffer::from_slice(data.to_vec());

    let frame_ns = (1_000_000_000f64 / self.fps) as u64;
    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoSinkError::BufferCreationError)?;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(self.frame_count * frame_ns));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));
    }
    self.frame_count += 1;

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerVideoSinkError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;

    Ok(())
  }

  fn wait_for_eos(&self) -> Result<(), GStreamerVideoSinkError> {
    let Some(bus) = self.pipeline.bus() else {
      return Ok(());
    };
    let message = bus.timed_pop_filtered(
      gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
      &[gst::MessageType::Eos, gst::MessageType::Error],
    );
    match message.as_ref().map(|m| m.view()) {
      Some(gst::MessageView::Error(err)) => Err(GStreamerVideoSinkError::PipelineError(format!(
        "{}",
        err.error()
      ))),
      Some(_) => Ok(()),
      None => {
        warn!("等待输出结束超时: {}", self.path.display());
        Ok(())
      }
    }
  }
}

fn bus_error(pipeline: &gst::Pipeline) -> Option<String> {
  let bus = pipeline.bus()?;
  let message = bus.pop_filtered(&[gst::MessageType::Error])?;
  match message.view() {
    gst::MessageView::Error(err) => Some(err.error().to_string()),
    _ => None,
  }
}

impl FrameSink for GStreamerVideoSink {
  type Error = GStreamerVideoSinkError;

  fn write(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    if self.released {
      return Err(GStreamerVideoSinkError::Released);
    }
    if frame.resolution() != self.size {
      return Err(GStreamerVideoSinkError::FrameSizeMismatch {
        expected: self.size,
        actual: frame.resolution(),
      });
    }
    self.push_frame(frame.as_ref())
  }

  fn release(&mut self) -> Result<(), Self::Error> {
    if self.released {
      return Ok(());
    }
    self.released = true;

    // EOS 之后容器才会写完索引
    let eos = match self.appsrc.end_of_stream() {
      Ok(_) => self.wait_for_eos(),
      Err(e) => Err(GStreamerVideoSinkError::PipelineError(format!(
        "Failed to send EOS: {:?}",
        e
      ))),
    };
    self.pipeline.set_state(gst::State::Null)?;

    info!(
      "Video output closed. Total frames written: {}",
      self.frame_count
    );
    debug!("输出文件: {}", self.path.display());
    eos
  }
}

impl Drop for GStreamerVideoSink {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      warn!("Failed to stop GStreamer video output pipeline: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mp4_pipeline_encodes_h264() {
    let description = pipeline_description(Path::new("output.mp4"));
    assert_eq!(
      description,
      "appsrc name=src ! videoconvert ! video/x-raw,format=I420 ! \
       x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux ! \
       filesink location=\"output.mp4\""
    );
  }

  #[test]
  fn avi_pipeline_uses_avimux() {
    let description = pipeline_description(Path::new("records/output.avi"));
    assert!(description.contains("avimux ! filesink location=\"records/output.avi\""));
  }

  #[test]
  fn unwritable_output_reports_cause() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("out.mp4");
    match GStreamerVideoSink::create(&path, 500, 500, 25.0) {
      Ok(_) => panic!("output into a missing directory must fail"),
      // 缺少编码插件时管道无法构建
      Err(GStreamerVideoSinkError::GStreamerError(_)) => {}
      Err(GStreamerVideoSinkError::OutputUnavailable(reason)) => {
        assert_ne!(reason, gst::StateChangeError.to_string());
      }
      Err(other) => panic!("unexpected error: {}", other),
    }
  }
}
