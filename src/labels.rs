// 该文件是 Guanlan （观澜） 项目的一部分。
// src/labels.rs - 类别标签表
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

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("标签文件为空")]
  Empty,
  #[error("类别索引越界: {index} (标签数 {len})")]
  OutOfRange { index: usize, len: usize },
}

/// 按类别编号排列的标签名称
///
/// 每行格式为 `<编号> <名称>`，只保留第一个空格之后的部分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  names: Box<[String]>,
}

impl LabelTable {
  pub fn parse(text: &str) -> Result<Self, LabelError> {
    let names: Box<[String]> = text
      .lines()
      .map(|line| line.trim_end_matches('\r'))
      .filter(|line| !line.is_empty())
      .map(|line| match line.split_once(' ') {
        Some((_, name)) => name.to_string(),
        None => line.to_string(),
      })
      .collect();

    if names.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self { names })
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let table = Self::parse(&text)?;
    info!("已加载 {} 个标签: {}", table.len(), path.display());
    Ok(table)
  }

  pub fn get(&self, index: usize) -> Result<&str, LabelError> {
    self
      .names
      .get(index)
      .map(String::as_str)
      .ok_or(LabelError::OutOfRange {
        index,
        len: self.names.len(),
      })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn keeps_text_after_first_space_in_file_order() {
    let table = LabelTable::parse(
      "n01440764 tench, Tinca tinca\nn01443537 goldfish, Carassius auratus\nn01484850 great white shark\n",
    )
    .unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(
      table.iter().collect::<Vec<_>>(),
      vec![
        "tench, Tinca tinca",
        "goldfish, Carassius auratus",
        "great white shark"
      ]
    );
  }

  #[test]
  fn skips_blank_lines_and_carriage_returns() {
    let table = LabelTable::parse("0 cat\r\n\r\n1 dog\r\n\n").unwrap();
    assert_eq!(table.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
  }

  #[test]
  fn line_without_space_is_kept_whole() {
    let table = LabelTable::parse("background\n1 person").unwrap();
    assert_eq!(table.get(0).unwrap(), "background");
    assert_eq!(table.get(1).unwrap(), "person");
  }

  #[test]
  fn empty_resource_is_rejected() {
    assert!(matches!(LabelTable::parse(""), Err(LabelError::Empty)));
    assert!(matches!(LabelTable::parse("\n\r\n"), Err(LabelError::Empty)));
  }

  #[test]
  fn out_of_range_lookup_fails() {
    let table = LabelTable::parse("0 a\n1 b").unwrap();
    assert!(matches!(
      table.get(2),
      Err(LabelError::OutOfRange { index: 2, len: 2 })
    ));
  }

  #[test]
  fn load_reads_file_and_reports_missing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "n0 alpha beta").unwrap();
    writeln!(file, "n1 gamma").unwrap();
    let table = LabelTable::load(file.path()).unwrap();
    assert_eq!(table.get(0).unwrap(), "alpha beta");
    assert_eq!(table.get(1).unwrap(), "gamma");

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("synset_words.txt");
    assert!(matches!(
      LabelTable::load(&missing),
      Err(LabelError::Io { .. })
    ));
  }

  #[test]
  fn load_of_empty_file_fails() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(matches!(
      LabelTable::load(file.path()),
      Err(LabelError::Empty)
    ));
  }
}
