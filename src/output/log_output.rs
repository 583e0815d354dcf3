// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ObbFrame,
  label::LabelRegistry,
  model::DetectResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 只把检测结果打印到日志：`log:///`
#[derive(Default)]
pub struct LogOutput {
  labels: Arc<LabelRegistry>,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }
    Ok(LogOutput::default())
  }
}

impl LogOutput {
  pub fn with_labels(mut self, labels: Arc<LabelRegistry>) -> Self {
    self.labels = labels;
    self
  }
}

impl Render<ObbFrame, DetectResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, frame: &ObbFrame, result: &DetectResult) -> Result<(), Self::Error> {
    info!("{}: 检测到 {} 个目标", frame.name(), result.count());
    for item in result.items() {
      let points = item
        .ptsl
        .iter()
        .map(|p| format!("{} {}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
      info!(
        "{} @ {:.4} ({})",
        self.labels.name(item.class_id),
        item.score,
        points
      );
    }
    Ok(())
  }
}
