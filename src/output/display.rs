// 该文件是 Guanlan （观澜） 项目的一部分。
// src/output/display.rs - 预览窗口
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

use std::time::Duration;

use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum DisplayError {
  #[error("显示不可用: {0}")]
  Unavailable(String),
  #[cfg(feature = "opencv_dnn")]
  #[error("OpenCV 错误: {0}")]
  OpenCvError(#[from] opencv::Error),
}

/// 预览窗口
///
/// 显示失败不影响处理流程，由调用方决定是否继续。
pub trait Display {
  fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

  /// 最多等待 `delay`，返回按下的键码
  fn wait_key(&mut self, delay: Duration) -> Option<i32>;

  /// 关闭所有窗口，可重复调用
  fn close(&mut self);
}

/// 无界面环境下使用，只按延时节流
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
  fn show(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
    Ok(())
  }

  fn wait_key(&mut self, delay: Duration) -> Option<i32> {
    std::thread::sleep(delay);
    None
  }

  fn close(&mut self) {}
}

#[cfg(feature = "opencv_dnn")]
pub use self::highgui::HighGuiDisplay;

#[cfg(feature = "opencv_dnn")]
mod highgui {
  use std::time::Duration;

  use opencv::{
    core::{CV_8UC3, Mat, Scalar},
    highgui,
    prelude::*,
  };
  use tracing::{debug, warn};

  use super::{Display, DisplayError};
  use crate::frame::Frame;

  /// OpenCV HighGUI 窗口
  pub struct HighGuiDisplay {
    window: String,
    opened: bool,
  }

  impl HighGuiDisplay {
    pub fn new(window: impl Into<String>) -> Self {
      Self {
        window: window.into(),
        opened: false,
      }
    }
  }

  impl Display for HighGuiDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
      let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
      )?;
      mat.data_bytes_mut()?.copy_from_slice(&frame.to_bgr_bytes());
      highgui::imshow(&self.window, &mat)?;
      self.opened = true;
      Ok(())
    }

    fn wait_key(&mut self, delay: Duration) -> Option<i32> {
      let millis = delay.as_millis().clamp(1, i32::MAX as u128) as i32;
      match highgui::wait_key(millis) {
        Ok(key) if key >= 0 => Some(key & 0xff),
        Ok(_) => None,
        Err(e) => {
          debug!("等待按键失败: {}", e);
          std::thread::sleep(delay);
          None
        }
      }
    }

    fn close(&mut self) {
      if !self.opened {
        return;
      }
      self.opened = false;
      if let Err(e) = highgui::destroy_all_windows() {
        warn!("关闭窗口失败: {}", e);
      }
    }
  }

  impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
      self.close();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn headless_display_never_reports_keys() {
    let mut display = HeadlessDisplay;
    display.show(&Frame::filled(4, 4, [0, 0, 0])).unwrap();
    assert_eq!(display.wait_key(Duration::from_millis(1)), None);
    display.close();
    display.close();
  }
}
