// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ObbFrame,
  label::LabelRegistry,
  model::DetectResult,
  output::{Render, format_detection},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未知的记录格式: {0}")]
  UnknownRecordKind(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordKind {
  /// `<名称> <置信度> x0 y0 x1 y1 x2 y2 x3 y3`
  #[default]
  Text,
  /// 同上，名称换成类别 id
  Id,
  Json,
}

impl RecordKind {
  fn extension(&self) -> &'static str {
    match self {
      RecordKind::Text | RecordKind::Id => "txt",
      RecordKind::Json => "json",
    }
  }
}

#[derive(Serialize)]
struct JsonDetection<'a> {
  class_id: usize,
  name: &'a str,
  score: f32,
  points: [[f32; 2]; 4],
}

#[derive(Serialize)]
struct JsonRecord<'a> {
  source: &'a str,
  created_at: String,
  count: usize,
  detections: Vec<JsonDetection<'a>>,
}

/// 每帧写一个记录文件：`folder:///out?record=txt|id|json[&always]`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  kind: RecordKind,
  always: bool,
  labels: Arc<LabelRegistry>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut kind = RecordKind::default();
    for (k, v) in uri.query_pairs() {
      if k == "record" {
        kind = match v.as_ref() {
          "txt" | "name" => RecordKind::Text,
          "id" => RecordKind::Id,
          "json" => RecordKind::Json,
          other => return Err(DirectoryRecordOutputError::UnknownRecordKind(other.to_string())),
        };
      }
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      kind,
      always,
      labels: Arc::default(),
    })
  }
}

impl DirectoryRecordOutput {
  pub fn with_labels(mut self, labels: Arc<LabelRegistry>) -> Self {
    self.labels = labels;
    self
  }

  pub fn kind(&self) -> RecordKind {
    self.kind
  }

  fn record_path(&self, frame: &ObbFrame) -> Result<PathBuf, DirectoryRecordOutputError> {
    if !self.directory.exists() {
      std::fs::create_dir_all(&self.directory)?;
    }
    let name = if frame.name().is_empty() {
      Utc::now().format("%H-%M-%S%.3f").to_string()
    } else {
      frame.name().to_string()
    };
    Ok(self.directory.join(format!("{}.{}", name, self.kind.extension())))
  }

  fn text_record(&self, result: &DetectResult) -> String {
    let mut records = Vec::with_capacity(result.count());
    for item in result.items() {
      let name = match self.kind {
        RecordKind::Id => item.class_id.to_string(),
        _ => self.labels.name(item.class_id).to_string(),
      };
      records.push(format_detection(&name, item));
    }
    let mut content = records.join("\n");
    if !content.is_empty() {
      content.push('\n');
    }
    content
  }

  fn json_record(&self, frame: &ObbFrame, result: &DetectResult) -> Result<String, serde_json::Error> {
    let record = JsonRecord {
      source: frame.name(),
      created_at: Utc::now().to_rfc3339(),
      count: result.count(),
      detections: result
        .items()
        .iter()
        .map(|item| JsonDetection {
          class_id: item.class_id,
          name: self.labels.name(item.class_id),
          score: item.score,
          points: item.ptsl.map(|p| [p.x, p.y]),
        })
        .collect(),
    };
    serde_json::to_string_pretty(&record)
  }
}

impl Render<ObbFrame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &ObbFrame, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let path = self.record_path(frame)?;
    let content = match self.kind {
      RecordKind::Text | RecordKind::Id => self.text_record(result),
      RecordKind::Json => self.json_record(frame, result)?,
    };
    std::fs::write(&path, content)?;
    debug!("记录已写入 {}", path.display());
    Ok(())
  }
}
