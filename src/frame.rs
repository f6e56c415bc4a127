// 该文件是 Guanlan （观澜） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("帧尺寸为零: {0}x{1}")]
  EmptyShape(u32, u32),
}

/// 一帧解码后的 RGB 图像（HWC 排列，8 位）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  image: RgbImage,
}

impl Frame {
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::EmptyShape(width, height));
    }
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }
    let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::LengthMismatch {
      expected,
      actual: 0,
    })?;
    Ok(Self { image })
  }

  /// 纯色帧，主要用于测试与占位
  pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
    Self {
      image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn resolution(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  /// 双线性缩放到指定尺寸；尺寸相同时直接复制
  pub fn resized(&self, width: u32, height: u32) -> Frame {
    if self.resolution() == (width, height) {
      return self.clone();
    }
    Frame {
      image: image::imageops::resize(&self.image, width, height, FilterType::Triangle),
    }
  }

  /// 按 BGR 顺序输出 HWC 字节，供 OpenCV 使用
  pub fn to_bgr_bytes(&self) -> Vec<u8> {
    self
      .image
      .as_raw()
      .chunks_exact(RGB_CHANNELS)
      .flat_map(|px| [px[2], px[1], px[0]])
      .collect()
  }

  pub fn as_image(&self) -> &RgbImage {
    &self.image
  }

  pub fn as_image_mut(&mut self) -> &mut RgbImage {
    &mut self.image
  }
}

impl AsRef<[u8]> for Frame {
  fn as_ref(&self) -> &[u8] {
    self.image.as_raw()
  }
}
