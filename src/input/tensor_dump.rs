// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/tensor_dump.rs - 张量转储文件输入
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ObbFrame, OwnedTensor, TensorBuffer},
  model::{Letterbox, ObbError},
  tensor::{TensorLayout, TensorType},
};

#[derive(Error, Debug)]
pub enum TensorDumpInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("第 {index} 个输出的数值 {value} 超出 {dtype:?} 范围")]
  ValueOutOfRange {
    index: usize,
    value: f64,
    dtype: TensorType,
  },
  #[error("模型输出无效: {0}")]
  InvalidOutputs(#[from] ObbError),
  #[error("目录中没有转储文件: {0}")]
  EmptyDirectory(PathBuf),
}

fn default_scale() -> f32 {
  1.0
}

#[derive(Deserialize, Debug)]
struct RawTensor {
  dtype: TensorType,
  #[serde(default)]
  layout: TensorLayout,
  dims: Vec<usize>,
  #[serde(default)]
  zp: i32,
  #[serde(default = "default_scale")]
  scale: f32,
  data: Vec<f64>,
}

#[derive(Deserialize, Debug)]
struct RawDump {
  model_width: usize,
  model_height: usize,
  #[serde(default)]
  letterbox: Letterbox,
  outputs: Vec<RawTensor>,
}

fn to_integers<T: TryFrom<i64>>(
  index: usize,
  dtype: TensorType,
  data: &[f64],
) -> Result<Box<[T]>, TensorDumpInputError> {
  data
    .iter()
    .map(|&v| {
      let out_of_range = TensorDumpInputError::ValueOutOfRange {
        index,
        value: v,
        dtype,
      };
      if v.fract() != 0.0 {
        return Err(out_of_range);
      }
      T::try_from(v as i64).map_err(|_| out_of_range)
    })
    .collect()
}

impl RawTensor {
  fn into_owned(self, index: usize) -> Result<OwnedTensor, TensorDumpInputError> {
    let buffer = match self.dtype {
      TensorType::Int8 => TensorBuffer::Int8(to_integers(index, self.dtype, &self.data)?),
      TensorType::UInt8 => TensorBuffer::UInt8(to_integers(index, self.dtype, &self.data)?),
      TensorType::Float32 => TensorBuffer::Float32(self.data.iter().map(|&v| v as f32).collect()),
    };

    Ok(OwnedTensor {
      buffer,
      dims: self.dims,
      layout: self.layout,
      zp: self.zp,
      scale: self.scale,
    })
  }
}

/// 解析一份转储内容，`name` 作为帧名。
/// 输出的形状在这里就做完整检查，后处理阶段不会再遇到非法张量。
pub fn read_dump(name: &str, content: &str) -> Result<ObbFrame, TensorDumpInputError> {
  let raw: RawDump = serde_json::from_str(content)?;
  let outputs = raw
    .outputs
    .into_iter()
    .enumerate()
    .map(|(i, t)| t.into_owned(i))
    .collect::<Result<Vec<_>, _>>()?;

  debug!("转储 {}: {} 个输出", name, outputs.len());
  let frame = ObbFrame::new(
    name,
    raw.model_width,
    raw.model_height,
    raw.letterbox,
    outputs,
  );
  frame.as_obb_input()?;
  Ok(frame)
}

fn read_dump_file(path: &Path) -> Result<ObbFrame, TensorDumpInputError> {
  let name = path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let content = std::fs::read_to_string(path)?;
  read_dump(&name, &content)
}

/// 从单个 JSON 文件或目录读取推理输出。
/// `dump:///path/to/frame.json` 或 `dump:///path/to/dir`
pub struct TensorDumpInput {
  files: Vec<PathBuf>,
}

impl FromUrlWithScheme for TensorDumpInput {
  const SCHEME: &'static str = "dump";
}

impl FromUrl for TensorDumpInput {
  type Error = TensorDumpInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorDumpInputError::SchemeMismatch);
    }

    let path = PathBuf::from(url.path());
    let files = if path.is_dir() {
      let mut files = std::fs::read_dir(&path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
      files.sort();
      if files.is_empty() {
        return Err(TensorDumpInputError::EmptyDirectory(path));
      }
      files
    } else if path.is_file() {
      vec![path]
    } else {
      return Err(TensorDumpInputError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("找不到转储路径: {}", path.display()),
      )));
    };

    info!("共 {} 个转储文件", files.len());
    Ok(TensorDumpInput { files })
  }
}

impl TensorDumpInput {
  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

impl IntoIterator for TensorDumpInput {
  type Item = ObbFrame;
  type IntoIter = TensorDumpIter;

  fn into_iter(self) -> Self::IntoIter {
    TensorDumpIter {
      files: self.files.into_iter(),
    }
  }
}

/// 逐个读取文件，读取失败的文件记录错误后跳过
pub struct TensorDumpIter {
  files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for TensorDumpIter {
  type Item = ObbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match read_dump_file(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("读取转储文件 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tensor::TensorError;

  const DUMP: &str = r#"{
    "model_width": 16,
    "model_height": 16,
    "letterbox": { "x_pad": 0, "y_pad": 4, "scale": 0.5 },
    "outputs": [
      { "dtype": "int8", "dims": [1, 1, 1, 4], "zp": -128, "scale": 0.1, "data": [-128, 0, 1, 127] },
      { "dtype": "uint8", "layout": "nchw", "dims": [1, 2, 1, 1], "data": [3, 250] },
      { "dtype": "float32", "dims": [1, 1, 1, 1], "data": [0.5] }
    ]
  }"#;

  #[test]
  fn test_read_dump() {
    let frame = read_dump("P0001", DUMP).unwrap();
    assert_eq!(frame.name(), "P0001");
    assert_eq!(frame.model_size(), (16, 16));
    assert_eq!(frame.letterbox(), Letterbox::new(0, 4, 0.5));

    let outputs = frame.outputs();
    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[0].buffer, TensorBuffer::Int8(vec![-128, 0, 1, 127].into()));
    assert_eq!(outputs[0].zp, -128);
    assert_eq!(outputs[1].layout, TensorLayout::Nchw);
    assert_eq!(outputs[1].scale, 1.0);
    assert_eq!(outputs[2].buffer, TensorBuffer::Float32(vec![0.5].into()));
  }

  #[test]
  fn test_out_of_range_values_are_rejected() {
    let dump = r#"{ "model_width": 8, "model_height": 8,
      "outputs": [ { "dtype": "int8", "dims": [1, 1, 1, 1], "data": [200] } ] }"#;
    assert!(matches!(
      read_dump("x", dump),
      Err(TensorDumpInputError::ValueOutOfRange { index: 0, .. })
    ));

    let dump = r#"{ "model_width": 8, "model_height": 8,
      "outputs": [ { "dtype": "uint8", "dims": [1, 1, 1, 1], "data": [1.5] } ] }"#;
    assert!(read_dump("x", dump).is_err());
  }

  const ZERO_BATCH: &str = r#"{ "model_width": 16, "model_height": 16,
    "outputs": [
      { "dtype": "int8", "dims": [0, 2, 2, 8], "zp": 0, "scale": 0.5, "data": [] },
      { "dtype": "int8", "dims": [0, 2, 2, 2], "zp": -128, "scale": 0.01, "data": [] },
      { "dtype": "float32", "dims": [0, 2, 2, 1], "data": [] }
    ] }"#;

  #[test]
  fn test_bad_shapes_are_rejected_on_read() {
    assert!(matches!(
      read_dump("x", ZERO_BATCH),
      Err(TensorDumpInputError::InvalidOutputs(ObbError::TensorError(
        TensorError::EmptyDimension([0, 2, 2, 8])
      )))
    ));

    let dump = r#"{ "model_width": 16, "model_height": 16,
      "outputs": [
        { "dtype": "int8", "dims": [4294967296, 4294967296, 2, 8], "scale": 0.5, "data": [0] },
        { "dtype": "int8", "dims": [1, 1, 1, 1], "scale": 0.5, "data": [0] },
        { "dtype": "float32", "dims": [1, 1, 1, 1], "data": [0.0] }
      ] }"#;
    assert!(matches!(
      read_dump("x", dump),
      Err(TensorDumpInputError::InvalidOutputs(ObbError::TensorError(
        TensorError::ShapeOverflow(_)
      )))
    ));
  }

  #[test]
  fn test_directory_input_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.json"), DUMP).unwrap();
    std::fs::write(dir.path().join("a.json"), "not json").unwrap();
    std::fs::write(dir.path().join("c.json"), ZERO_BATCH).unwrap();
    std::fs::write(dir.path().join("d.txt"), DUMP).unwrap();

    let url = Url::parse(&format!("dump://{}", dir.path().display())).unwrap();
    let input = TensorDumpInput::from_url(&url).unwrap();
    assert!(!input.is_empty());
    assert_eq!(input.len(), 3);

    let names: Vec<String> = input.into_iter().map(|f| f.name().to_string()).collect();
    assert_eq!(names, vec!["b".to_string()]);
  }

  #[test]
  fn test_scheme_mismatch() {
    let url = Url::parse("image:///tmp/a.json").unwrap();
    assert!(matches!(
      TensorDumpInput::from_url(&url),
      Err(TensorDumpInputError::SchemeMismatch)
    ));
  }
}
