// 该文件是 Guanlan （观澜） 项目的一部分。
// src/model/caffe.rs - OpenCV DNN 加载的 Caffe GoogLeNet 分类器
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

use std::path::{Path, PathBuf};

use opencv::{
  core::{self, CV_32F, Mat, Scalar},
  dnn,
  prelude::*,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::{NET_INPUT_BLOB, NET_OUTPUT_BLOB},
  frame::Frame,
  model::{Backend, Classification, Classifier, preprocess::blob_from_frame},
};

#[derive(Error, Debug)]
pub enum CaffeClassifierError {
  #[error("模型文件不存在: {0}")]
  MissingFile(PathBuf),
  #[error("模型路径不是合法的 UTF-8: {0}")]
  InvalidPath(PathBuf),
  #[error("模型加载错误: {0}")]
  ModelLoadError(opencv::Error),
  #[error("加载得到的网络为空")]
  EmptyNetwork,
  #[error("网络输出为空")]
  EmptyOutput,
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
}

pub struct CaffeClassifierBuilder {
  deploy: PathBuf,
  weights: PathBuf,
  accelerate: bool,
}

impl CaffeClassifierBuilder {
  pub fn new(deploy: impl Into<PathBuf>, weights: impl Into<PathBuf>) -> Self {
    Self {
      deploy: deploy.into(),
      weights: weights.into(),
      accelerate: true,
    }
  }

  pub fn accelerate(mut self, accelerate: bool) -> Self {
    self.accelerate = accelerate;
    self
  }

  pub fn build(self) -> Result<CaffeClassifier, CaffeClassifierError> {
    let deploy = checked_path(&self.deploy)?;
    let weights = checked_path(&self.weights)?;

    info!("加载 Caffe 模型: {} / {}", deploy, weights);
    let mut net =
      dnn::read_net_from_caffe(deploy, weights).map_err(CaffeClassifierError::ModelLoadError)?;
    if net.empty()? {
      return Err(CaffeClassifierError::EmptyNetwork);
    }

    let backend = if self.accelerate && cuda_available() {
      net.set_preferable_backend(dnn::DNN_BACKEND_CUDA)?;
      net.set_preferable_target(dnn::DNN_TARGET_CUDA)?;
      Backend::Gpu
    } else {
      if self.accelerate {
        warn!("未检测到可用的 CUDA 设备，使用 CPU 推理");
      }
      Backend::Cpu
    };
    info!("推理后端: {:?}", backend);

    Ok(CaffeClassifier { net, backend })
  }
}

fn checked_path(path: &Path) -> Result<&str, CaffeClassifierError> {
  if !path.is_file() {
    return Err(CaffeClassifierError::MissingFile(path.to_path_buf()));
  }
  path
    .to_str()
    .ok_or_else(|| CaffeClassifierError::InvalidPath(path.to_path_buf()))
}

fn cuda_available() -> bool {
  match core::get_cuda_enabled_device_count() {
    Ok(count) => cuda_usable(count, || {
      let info = core::DeviceInfo::new(core::get_device()?)?;
      info.is_compatible()
    }),
    Err(e) => {
      debug!("查询 CUDA 设备失败: {}", e);
      false
    }
  }
}

/// 有设备且当前设备与 OpenCV 的 CUDA 构建兼容
fn cuda_usable(count: i32, compatible: impl FnOnce() -> opencv::Result<bool>) -> bool {
  debug!("CUDA 设备数量: {}", count);
  if count <= 0 {
    return false;
  }
  match compatible() {
    Ok(true) => true,
    Ok(false) => {
      warn!("CUDA 设备与当前 OpenCV 构建不兼容");
      false
    }
    Err(e) => {
      debug!("查询 CUDA 设备信息失败: {}", e);
      false
    }
  }
}

pub struct CaffeClassifier {
  net: dnn::Net,
  backend: Backend,
}

impl Classifier for CaffeClassifier {
  type Error = CaffeClassifierError;

  fn classify(&mut self, frame: &Frame) -> Result<Classification, Self::Error> {
    let blob = blob_from_frame(frame);
    let sizes = blob.shape.map(|d| d as i32);
    let mut input = Mat::new_nd_with_default(&sizes, CV_32F, Scalar::all(0.0))?;
    input.data_typed_mut::<f32>()?.copy_from_slice(&blob.data);

    self
      .net
      .set_input(&input, NET_INPUT_BLOB, 1.0, Scalar::default())?;
    let prob = self.net.forward_single(NET_OUTPUT_BLOB)?;
    let scores = prob.data_typed::<f32>()?;

    Classification::from_scores(scores).ok_or(CaffeClassifierError::EmptyOutput)
  }

  fn backend(&self) -> Backend {
    self.backend
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cuda_needs_a_compatible_device() {
    assert!(!cuda_usable(0, || panic!("no device to query")));
    assert!(!cuda_usable(1, || Ok(false)));
    assert!(!cuda_usable(
      1,
      || Err(opencv::Error::new(core::StsError, "no cuda"))
    ));
    assert!(cuda_usable(2, || Ok(true)));
  }

  #[test]
  fn missing_model_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let result = CaffeClassifierBuilder::new(
      dir.path().join("deploy.prototxt"),
      dir.path().join("weights.caffemodel"),
    )
    .build();
    assert!(matches!(result, Err(CaffeClassifierError::MissingFile(_))));
  }
}
