// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output/draw.rs - 分类结果文本叠加
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

use std::{path::Path, time::Duration};

use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::drawing::draw_text_mut;
use thiserror::Error;

use crate::{
  config::{
    BACKEND_TAG_X, BUILD_TAG_X, INFO_BOTTOM_MARGIN, INFO_COLOR, INFO_FONT_SIZE, INFO_LEFT_X,
    LABEL_COLOR, LABEL_FONT_SIZE, LABEL_ORIGIN, RESOLUTION_RIGHT_OFFSET,
  },
  frame::Frame,
  model::Backend,
};

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

/// 一段定位好的叠加文本，`baseline` 为文本基线左端
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayText {
  pub text: String,
  pub baseline: (i32, i32),
  pub color: [u8; 3],
  pub size: f32,
}

/// 一帧需要叠加的信息
#[derive(Debug, Clone)]
pub struct OverlayInfo<'a> {
  pub label: &'a str,
  pub elapsed: Duration,
  pub build_tag: Option<&'a str>,
  pub backend: Backend,
  pub resolution: (u32, u32),
}

/// 构建类型标记
pub fn build_tag() -> &'static str {
  if cfg!(debug_assertions) {
    "in debug"
  } else {
    "in release"
  }
}

/// `run time: 秒`，保留三位小数（截断）
pub fn format_elapsed(elapsed: Duration) -> String {
  let secs = format!("{:.6}", elapsed.as_secs_f64());
  format!("run time: {}", &secs[..secs.len() - 3])
}

/// 固定位置的叠加文本，位置不随文本长度变化
pub fn compose_overlays(info: &OverlayInfo<'_>) -> Vec<OverlayText> {
  let (width, height) = (info.resolution.0 as i32, info.resolution.1 as i32);
  let bottom = height - INFO_BOTTOM_MARGIN;
  let info_text = |text: String, x: i32| OverlayText {
    text,
    baseline: (x, bottom),
    color: INFO_COLOR,
    size: INFO_FONT_SIZE,
  };

  let mut overlays = vec![
    OverlayText {
      text: info.label.to_string(),
      baseline: LABEL_ORIGIN,
      color: LABEL_COLOR,
      size: LABEL_FONT_SIZE,
    },
    info_text(format_elapsed(info.elapsed), INFO_LEFT_X),
  ];
  if let Some(tag) = info.build_tag {
    overlays.push(info_text(tag.to_string(), BUILD_TAG_X));
  }
  overlays.push(info_text(
    info.backend.overlay_tag().to_string(),
    BACKEND_TAG_X,
  ));
  overlays.push(info_text(
    format!("{}x{}", info.resolution.0, info.resolution.1),
    width - RESOLUTION_RIGHT_OFFSET,
  ));
  overlays
}

/// 将叠加文本绘制到帧上
pub trait Annotator {
  fn annotate(&self, frame: &mut Frame, overlays: &[OverlayText]);
}

/// 基于 TrueType 字体的文本绘制
pub struct Painter {
  font: FontArc,
}

impl Painter {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DrawError::Io {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_bytes(data)
  }

  pub fn from_bytes(data: Vec<u8>) -> Result<Self, DrawError> {
    let font = FontArc::try_from_vec(data).map_err(|e| DrawError::InvalidFont(e.to_string()))?;
    Ok(Self { font })
  }
}

impl Annotator for Painter {
  fn annotate(&self, frame: &mut Frame, overlays: &[OverlayText]) {
    let image = frame.as_image_mut();
    for overlay in overlays {
      // imageproc 以左上角定位
      let (x, baseline) = overlay.baseline;
      let top = (baseline - overlay.size.round() as i32).max(0);
      draw_text_mut(
        image,
        Rgb(overlay.color),
        x,
        top,
        PxScale::from(overlay.size),
        &self.font,
        &overlay.text,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn info(build_tag: Option<&str>) -> OverlayInfo<'_> {
    OverlayInfo {
      label: "tabby, tabby cat",
      elapsed: Duration::from_micros(12_345),
      build_tag,
      backend: Backend::Cpu,
      resolution: (500, 500),
    }
  }

  #[test]
  fn elapsed_keeps_three_decimals() {
    assert_eq!(
      format_elapsed(Duration::from_micros(12_345)),
      "run time: 0.012"
    );
    assert_eq!(format_elapsed(Duration::from_millis(1500)), "run time: 1.500");
    assert_eq!(format_elapsed(Duration::ZERO), "run time: 0.000");
  }

  #[test]
  fn overlays_sit_at_fixed_positions() {
    let overlays = compose_overlays(&info(Some("in release")));
    let texts: Vec<_> = overlays
      .iter()
      .map(|o| (o.text.as_str(), o.baseline))
      .collect();
    assert_eq!(
      texts,
      vec![
        ("tabby, tabby cat", (10, 20)),
        ("run time: 0.012", (10, 490)),
        ("in release", (180, 490)),
        ("using CPUs", (300, 490)),
        ("500x500", (420, 490)),
      ]
    );
    assert_eq!(overlays[0].color, LABEL_COLOR);
    assert!(overlays[1..].iter().all(|o| o.color == INFO_COLOR));
  }

  #[test]
  fn build_tag_is_optional() {
    let overlays = compose_overlays(&info(None));
    assert_eq!(overlays.len(), 4);
    assert!(overlays.iter().all(|o| !o.text.starts_with("in ")));
  }

  #[test]
  fn build_tag_matches_profile() {
    let tag = build_tag();
    assert!(tag == "in debug" || tag == "in release");
  }

  #[test]
  fn invalid_font_is_rejected() {
    assert!(matches!(
      Painter::from_bytes(vec![0, 1, 2, 3]),
      Err(DrawError::InvalidFont(_))
    ));
  }

  #[test]
  fn missing_font_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      Painter::from_file(dir.path().join("missing.ttf")),
      Err(DrawError::Io { .. })
    ));
  }
}
