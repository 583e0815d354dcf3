// 该文件是 Shanan （山南西风） 项目的一部分。
// src/label.rs - 类别名称表
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

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

/// 查不到类别时返回的名称
pub const UNKNOWN_LABEL: &str = "unknown";

/// 默认类别数量（与示例模型一致）
pub const DEFAULT_CLASS_NUM: usize = 4;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("类别数量参数无效: {0}")]
  InvalidClassNum(String),
  #[error("无法打开标签文件 {0}: {1}")]
  Open(PathBuf, std::io::Error),
}

/// 类别 id 到名称的映射，槽位数量固定为类别数
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
  slots: Vec<Option<String>>,
}

impl LabelRegistry {
  pub fn new(class_num: usize) -> Self {
    Self {
      slots: vec![None; class_num],
    }
  }

  pub fn class_num(&self) -> usize {
    self.slots.len()
  }

  /// 已加载的名称数量
  pub fn loaded(&self) -> usize {
    self.slots.iter().filter(|s| s.is_some()).count()
  }

  /// 按行加载标签文件，超过类别数的行被忽略。
  /// 失败时注册表保持为空，之后的查询都返回 [`UNKNOWN_LABEL`]。
  pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    self.release();

    let bytes = std::fs::read(path).map_err(|e| {
      error!("打开标签文件 {} 失败: {}", path.display(), e);
      LabelError::Open(path.to_path_buf(), e)
    })?;

    let count = self.load_bytes(&bytes);
    debug!("已加载 {} 个类别名称", count);
    Ok(count)
  }

  fn load_bytes(&mut self, bytes: &[u8]) -> usize {
    let mut lines = bytes.split(|&b| b == b'\n').peekable();
    let mut count = 0;

    while let Some(line) = lines.next() {
      if count >= self.slots.len() {
        break;
      }
      // 文件末尾换行之后的空串不算一行
      if line.is_empty() && lines.peek().is_none() {
        break;
      }
      let end = line
        .iter()
        .position(|&b| b == b'\r')
        .unwrap_or(line.len());
      self.slots[count] = Some(String::from_utf8_lossy(&line[..end]).into_owned());
      count += 1;
    }

    count
  }

  /// 清空全部名称，可重复调用
  pub fn release(&mut self) {
    for slot in self.slots.iter_mut() {
      *slot = None;
    }
  }

  pub fn name(&self, class_id: usize) -> &str {
    self
      .slots
      .get(class_id)
      .and_then(|s| s.as_deref())
      .unwrap_or(UNKNOWN_LABEL)
  }
}

impl FromUrlWithScheme for LabelRegistry {
  const SCHEME: &'static str = "label";
}

impl FromUrl for LabelRegistry {
  type Error = LabelError;

  /// `label:///path/to/labels.txt?classes=4`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LabelError::SchemeMismatch);
    }

    let mut class_num = DEFAULT_CLASS_NUM;
    for (k, v) in url.query_pairs() {
      if k == "classes" {
        class_num = v
          .parse()
          .map_err(|_| LabelError::InvalidClassNum(v.to_string()))?;
      }
    }

    let mut registry = LabelRegistry::new(class_num);
    registry.load(url.path())?;
    Ok(registry)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn test_load_and_lookup() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "cat").unwrap();
    writeln!(file, "dog").unwrap();
    writeln!(file, "bird").unwrap();

    let mut registry = LabelRegistry::new(80);
    assert_eq!(registry.load(file.path()).unwrap(), 3);
    assert_eq!(registry.name(0), "cat");
    assert_eq!(registry.name(1), "dog");
    assert_eq!(registry.name(2), "bird");
    assert_eq!(registry.name(3), UNKNOWN_LABEL);
    assert_eq!(registry.name(99), UNKNOWN_LABEL);
  }

  #[test]
  fn test_crlf_and_missing_trailing_newline() {
    let mut registry = LabelRegistry::new(4);
    assert_eq!(registry.load_bytes(b"plane\r\nship\r\n\r\nstorage-tank"), 4);
    assert_eq!(registry.name(0), "plane");
    assert_eq!(registry.name(1), "ship");
    assert_eq!(registry.name(2), "");
    assert_eq!(registry.name(3), "storage-tank");
  }

  #[test]
  fn test_lines_past_class_num_are_ignored() {
    let mut registry = LabelRegistry::new(2);
    assert_eq!(registry.load_bytes(b"a\nb\nc\n"), 2);
    assert_eq!(registry.name(2), UNKNOWN_LABEL);
  }

  #[test]
  fn test_open_failure_leaves_registry_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = LabelRegistry::new(3);
    registry.load_bytes(b"x\ny\nz\n");

    let err = registry.load(dir.path().join("missing.txt")).unwrap_err();
    assert!(matches!(err, LabelError::Open(..)));
    assert_eq!(registry.loaded(), 0);
    assert_eq!(registry.name(0), UNKNOWN_LABEL);
  }

  #[test]
  fn test_release_is_idempotent() {
    let mut registry = LabelRegistry::new(2);
    registry.load_bytes(b"a\nb\n");
    registry.release();
    registry.release();
    assert_eq!(registry.loaded(), 0);
    assert_eq!(registry.name(1), UNKNOWN_LABEL);
  }

  #[test]
  fn test_from_url() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "plane\nship\nvehicle\n").unwrap();

    let url = Url::parse(&format!("label://{}?classes=2", file.path().display())).unwrap();
    let registry = LabelRegistry::from_url(&url).unwrap();
    assert_eq!(registry.class_num(), 2);
    assert_eq!(registry.name(1), "ship");
    assert_eq!(registry.name(2), UNKNOWN_LABEL);

    let url = Url::parse("folder:///tmp/labels.txt").unwrap();
    assert!(matches!(
      LabelRegistry::from_url(&url),
      Err(LabelError::SchemeMismatch)
    ));
  }
}
