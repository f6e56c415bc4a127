// 该文件是 Guanlan （观澜） 项目的一部分。
// src/task.rs - 逐帧分类标注任务
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

use std::{
  num::NonZeroU16,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::{DISPLAY_HEIGHT, DISPLAY_WIDTH, ESCAPE_KEY, KEY_DELAY, RunConfig},
  frame::Frame,
  input::FrameSource,
  labels::{LabelError, LabelTable},
  model::Classifier,
  output::{
    FrameSink,
    display::{Display, HeadlessDisplay},
    draw::{Annotator, OverlayInfo, build_tag, compose_overlays},
  },
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub trait Task<S, C, K>: Sized {
  type Output;
  type Error;
  fn run_task(self, source: S, classifier: C, sink: K) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("视频源已断开")]
  SourceDisconnected,
  #[error("读取帧失败: {0}")]
  Source(#[source] BoxError),
  #[error("推理失败: {0}")]
  Classifier(#[source] BoxError),
  #[error("写入输出失败: {0}")]
  Sink(#[source] BoxError),
  #[error("标签查找失败: {0}")]
  Label(#[from] LabelError),
}

/// 中断标志，由 Ctrl-C 或调用方置位
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
  raised: Arc<AtomicBool>,
}

impl Interrupt {
  pub fn new() -> Self {
    Self::default()
  }

  /// 注册 Ctrl-C 处理；30 秒内未退出则强制结束进程
  pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
    let raised = self.raised.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      raised.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
  }

  pub fn raise(&self) {
    self.raised.store(true, Ordering::SeqCst);
  }

  pub fn is_raised(&self) -> bool {
    self.raised.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  EscapeKey,
  Interrupted,
  FrameLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
  pub frames_read: u64,
  pub frames_processed: u64,
  pub stop: StopReason,
}

/// 读帧、分类、叠加文本、显示并写出，直到中断或源失效
pub struct AnnotateTask {
  labels: LabelTable,
  frame_skip: NonZeroU16,
  key_delay: Duration,
  build_tag: Option<&'static str>,
  max_frames: Option<u64>,
  display: Box<dyn Display>,
  annotator: Box<dyn Annotator>,
  interrupt: Interrupt,
}

impl AnnotateTask {
  pub fn new(labels: LabelTable, annotator: impl Annotator + 'static) -> Self {
    Self {
      labels,
      frame_skip: NonZeroU16::MIN,
      key_delay: KEY_DELAY,
      build_tag: Some(build_tag()),
      max_frames: None,
      display: Box::new(HeadlessDisplay),
      annotator: Box::new(annotator),
      interrupt: Interrupt::new(),
    }
  }

  pub fn from_config(
    config: &RunConfig,
    labels: LabelTable,
    annotator: impl Annotator + 'static,
  ) -> Self {
    Self::new(labels, annotator)
      .with_frame_skip(config.frame_skip)
      .with_build_tag(config.build_tag)
      .with_max_frames(config.max_frames)
  }

  pub fn with_frame_skip(mut self, frame_skip: NonZeroU16) -> Self {
    self.frame_skip = frame_skip;
    self
  }

  pub fn with_display(mut self, display: impl Display + 'static) -> Self {
    self.display = Box::new(display);
    self
  }

  pub fn with_key_delay(mut self, key_delay: Duration) -> Self {
    self.key_delay = key_delay;
    self
  }

  pub fn with_build_tag(mut self, enabled: bool) -> Self {
    self.build_tag = enabled.then(build_tag);
    self
  }

  pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
    self.max_frames = max_frames;
    self
  }

  pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
    self.interrupt = interrupt;
    self
  }

  /// 读取 `frame_skip` 帧，丢弃前面的，返回最后一帧
  fn next_frame<S>(&self, source: &mut S, frames_read: &mut u64) -> Result<Frame, TaskError>
  where
    S: FrameSource,
    S::Error: std::error::Error + Send + Sync + 'static,
  {
    let mut taken = None;
    for _ in 0..self.frame_skip.get() {
      match source.read() {
        Ok(Some(frame)) => {
          *frames_read += 1;
          taken = Some(frame);
        }
        Ok(None) => {
          error!("视频源已断开（第 {} 帧之后）", frames_read);
          return Err(TaskError::SourceDisconnected);
        }
        Err(e) => {
          error!("读取帧失败: {}", e);
          return Err(TaskError::Source(Box::new(e)));
        }
      }
    }
    taken.ok_or(TaskError::SourceDisconnected)
  }

  fn run_loop<S, C, K>(
    &self,
    resources: &mut Resources<S, K>,
    classifier: &mut C,
  ) -> Result<TaskSummary, TaskError>
  where
    S: FrameSource,
    S::Error: std::error::Error + Send + Sync + 'static,
    C: Classifier,
    C::Error: std::error::Error + Send + Sync + 'static,
    K: FrameSink,
    K::Error: std::error::Error + Send + Sync + 'static,
  {
    let backend = classifier.backend();
    let mut frames_read = 0u64;
    let mut frames_processed = 0u64;
    let mut display_enabled = true;

    let stop = loop {
      let frame = self.next_frame(&mut resources.source, &mut frames_read)?;

      let now = Instant::now();
      let result = classifier
        .classify(&frame)
        .map_err(|e| TaskError::Classifier(Box::new(e)))?;
      let elapsed = now.elapsed();

      let mut shown = frame.resized(DISPLAY_WIDTH, DISPLAY_HEIGHT);
      let label = self.labels.get(result.index)?;
      debug!(
        "第 {} 帧: {} ({:.3}), 耗时 {:.2?}",
        frames_read, label, result.confidence, elapsed
      );

      let overlays = compose_overlays(&OverlayInfo {
        label,
        elapsed,
        build_tag: self.build_tag,
        backend,
        resolution: shown.resolution(),
      });
      self.annotator.annotate(&mut shown, &overlays);

      if display_enabled && let Err(e) = resources.display.show(&shown) {
        warn!("显示失败，后续帧不再显示: {}", e);
        display_enabled = false;
      }

      resources
        .sink
        .write(&shown)
        .map_err(|e| TaskError::Sink(Box::new(e)))?;
      frames_processed += 1;

      // 显示停用后窗口不再阻塞，改为直接休眠
      let key = if display_enabled {
        resources.display.wait_key(self.key_delay)
      } else {
        thread::sleep(self.key_delay);
        None
      };
      if key == Some(ESCAPE_KEY) {
        info!("收到 Esc，退出任务循环");
        break StopReason::EscapeKey;
      }
      if self.interrupt.is_raised() {
        warn!("中断信号接收，退出任务循环");
        break StopReason::Interrupted;
      }
      if self.max_frames.is_some_and(|n| frames_processed >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frames_processed);
        break StopReason::FrameLimit;
      }
    };

    Ok(TaskSummary {
      frames_read,
      frames_processed,
      stop,
    })
  }
}

impl<S, C, K> Task<S, C, K> for AnnotateTask
where
  S: FrameSource,
  S::Error: std::error::Error + Send + Sync + 'static,
  C: Classifier,
  C::Error: std::error::Error + Send + Sync + 'static,
  K: FrameSink,
  K::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = TaskSummary;
  type Error = TaskError;

  fn run_task(mut self, source: S, mut classifier: C, sink: K) -> Result<TaskSummary, TaskError> {
    info!("开始任务...");
    let display = std::mem::replace(&mut self.display, Box::new(HeadlessDisplay));
    let mut resources = Resources {
      source,
      sink,
      display,
      released: false,
    };

    let outcome = self.run_loop(&mut resources, &mut classifier);
    let released = resources.release();

    match (outcome, released) {
      (Ok(summary), Ok(())) => {
        info!(
          "任务完成，读取 {} 帧，处理 {} 帧",
          summary.frames_read, summary.frames_processed
        );
        Ok(summary)
      }
      (Ok(_), Err(e)) => Err(TaskError::Sink(Box::new(e))),
      (Err(e), Ok(())) => Err(e),
      (Err(e), Err(release_error)) => {
        warn!("释放输出失败: {}", release_error);
        Err(e)
      }
    }
  }
}

/// 任务持有的外部资源，任何退出路径上都恰好释放一次
struct Resources<S, K>
where
  S: FrameSource,
  K: FrameSink,
  K::Error: std::fmt::Display,
{
  source: S,
  sink: K,
  display: Box<dyn Display>,
  released: bool,
}

impl<S, K> Resources<S, K>
where
  S: FrameSource,
  K: FrameSink,
  K::Error: std::fmt::Display,
{
  fn release(&mut self) -> Result<(), K::Error> {
    if self.released {
      return Ok(());
    }
    self.released = true;
    self.display.close();
    self.source.release();
    self.sink.release()
  }
}

impl<S, K> Drop for Resources<S, K>
where
  S: FrameSource,
  K: FrameSink,
  K::Error: std::fmt::Display,
{
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      warn!("释放输出失败: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interrupt_is_shared_between_clones() {
    let interrupt = Interrupt::new();
    let handle = interrupt.clone();
    assert!(!interrupt.is_raised());
    handle.raise();
    assert!(interrupt.is_raised());
  }

  #[test]
  fn from_config_carries_loop_settings() {
    struct Noop;
    impl Annotator for Noop {
      fn annotate(&self, _frame: &mut Frame, _overlays: &[crate::output::draw::OverlayText]) {}
    }

    let config = RunConfig {
      frame_skip: NonZeroU16::new(4).unwrap(),
      max_frames: Some(7),
      build_tag: false,
      ..RunConfig::default()
    };
    let labels = LabelTable::parse("0 a").unwrap();
    let task = AnnotateTask::from_config(&config, labels, Noop);
    assert_eq!(task.frame_skip.get(), 4);
    assert_eq!(task.max_frames, Some(7));
    assert_eq!(task.build_tag, None);
    assert_eq!(task.key_delay, KEY_DELAY);
  }
}
