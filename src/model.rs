// 该文件是 Guanlan （观澜） 项目的一部分。
// src/model.rs - 分类模型
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

use crate::frame::Frame;

/// 图像分类器
///
/// 模型在构造时加载一次，之后每帧只做前向推理。
pub trait Classifier {
  type Error;

  fn classify(&mut self, frame: &Frame) -> Result<Classification, Self::Error>;

  /// 实际使用的推理后端
  fn backend(&self) -> Backend;
}

/// 单帧分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
  pub index: usize,
  pub confidence: f32,
}

impl Classification {
  /// 取概率最大的类别；并列时取最靠前的一个
  pub fn from_scores(scores: &[f32]) -> Option<Self> {
    scores
      .iter()
      .copied()
      .enumerate()
      .filter(|(_, score)| !score.is_nan())
      .fold(None, |best: Option<(usize, f32)>, (index, score)| match best {
        Some((_, best_score)) if best_score >= score => best,
        _ => Some((index, score)),
      })
      .map(|(index, confidence)| Classification {
        index,
        confidence: confidence.clamp(0.0, 1.0),
      })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
  Cpu,
  Gpu,
}

impl Backend {
  pub fn overlay_tag(&self) -> &'static str {
    match self {
      Backend::Cpu => "using CPUs",
      Backend::Gpu => "using GPUs",
    }
  }
}

pub mod preprocess;

#[cfg(feature = "opencv_dnn")]
mod caffe;
#[cfg(feature = "opencv_dnn")]
pub use self::caffe::{CaffeClassifier, CaffeClassifierBuilder, CaffeClassifierError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn picks_highest_score() {
    let result = Classification::from_scores(&[0.1, 0.7, 0.2]).unwrap();
    assert_eq!(result.index, 1);
    assert!((result.confidence - 0.7).abs() < f32::EPSILON);
  }

  #[test]
  fn ties_resolve_to_first_index() {
    let result = Classification::from_scores(&[0.4, 0.4, 0.2]).unwrap();
    assert_eq!(result.index, 0);
  }

  #[test]
  fn nan_scores_are_ignored() {
    let result = Classification::from_scores(&[f32::NAN, 0.3, 0.6]).unwrap();
    assert_eq!(result.index, 2);
  }

  #[test]
  fn empty_output_has_no_class() {
    assert_eq!(Classification::from_scores(&[]), None);
    assert_eq!(Classification::from_scores(&[f32::NAN]), None);
  }

  #[test]
  fn backend_tags() {
    assert_eq!(Backend::Cpu.overlay_tag(), "using CPUs");
    assert_eq!(Backend::Gpu.overlay_tag(), "using GPUs");
  }
}
