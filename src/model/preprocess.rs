// 该文件是 Guanlan （观澜） 项目的一部分。
// src/model/preprocess.rs - 网络输入预处理
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

use crate::{
  config::{NET_INPUT_HEIGHT, NET_INPUT_WIDTH, NET_MEAN_BGR, NET_SCALE},
  frame::Frame,
};

/// NCHW 排列的 f32 输入张量
#[derive(Debug, Clone)]
pub struct Blob {
  pub shape: [usize; 4],
  pub data: Vec<f32>,
}

/// 缩放到网络输入尺寸，转为 BGR 平面并减均值
///
/// 计算方式为 `(像素 - 均值) * 缩放系数`。
pub fn blob_from_frame(frame: &Frame) -> Blob {
  let resized = frame.resized(NET_INPUT_WIDTH, NET_INPUT_HEIGHT);
  let (width, height) = (NET_INPUT_WIDTH as usize, NET_INPUT_HEIGHT as usize);
  let plane = width * height;
  let mut data = vec![0f32; 3 * plane];

  for (idx, pixel) in resized.as_image().pixels().enumerate() {
    let [r, g, b] = pixel.0;
    for (c, value) in [b, g, r].into_iter().enumerate() {
      data[c * plane + idx] = (value as f32 - NET_MEAN_BGR[c]) * NET_SCALE;
    }
  }

  Blob {
    shape: [1, 3, height, width],
    data,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blob_is_bgr_planes_minus_mean() {
    let frame = Frame::filled(320, 240, [200, 150, 100]);
    let blob = blob_from_frame(&frame);
    assert_eq!(blob.shape, [1, 3, 224, 224]);
    assert_eq!(blob.data.len(), 3 * 224 * 224);

    let plane = 224 * 224;
    // 平面顺序 B, G, R
    assert_eq!(blob.data[0], 100.0 - 104.0);
    assert_eq!(blob.data[plane], 150.0 - 117.0);
    assert_eq!(blob.data[2 * plane + plane - 1], 200.0 - 123.0);
  }
}
