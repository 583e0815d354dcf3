// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 后处理流水线公共参数
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

use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl,
  label::{LabelError, LabelRegistry},
  model::{
    DEFAULT_MAX_DETECTIONS, DEFAULT_NMS_THRESH, DEFAULT_OBJECT_THRESH, ObbError, YoloV8Obb,
    YoloV8ObbBuilder,
  },
};

/// 各个可执行程序共用的参数，用 `#[command(flatten)]` 嵌入
#[derive(clap::Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 输入来源，例如 dump:///data/frames
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 标签文件，例如 label:///data/labels.txt?classes=4
  #[arg(long, value_name = "LABELS")]
  pub labels: Option<Url>,

  /// 输出路径，例如 log:/// 或 folder:///data/records?record=txt
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_OBJECT_THRESH, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_NMS_THRESH, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 每帧最多保留的目标数
  #[arg(long, default_value_t = DEFAULT_MAX_DETECTIONS, value_name = "COUNT")]
  pub max_detections: usize,
}

impl PipelineArgs {
  pub fn log(&self) {
    info!("输入来源: {}", self.input);
    if let Some(labels) = &self.labels {
      info!("标签文件: {}", labels);
    }
    info!("输出路径: {}", self.output);
    info!(
      "置信度阈值: {}, NMS 阈值: {}, 最大目标数: {}",
      self.confidence, self.nms_threshold, self.max_detections
    );
  }

  pub fn build_model(&self) -> Result<YoloV8Obb, ObbError> {
    YoloV8ObbBuilder::default()
      .conf_threshold(self.confidence)
      .nms_threshold(self.nms_threshold)
      .max_detections(self.max_detections)
      .build()
  }

  /// 标签文件打不开时退回空注册表，名称一律显示为 unknown。
  /// URL 本身写错仍然报错。
  pub fn open_labels(&self) -> Result<Arc<LabelRegistry>, LabelError> {
    let Some(url) = &self.labels else {
      return Ok(Arc::default());
    };

    match LabelRegistry::from_url(url) {
      Ok(registry) => Ok(Arc::new(registry)),
      Err(LabelError::Open(path, e)) => {
        error!("标签文件 {} 不可用，继续运行: {}", path.display(), e);
        Ok(Arc::default())
      }
      Err(e) => Err(e),
    }
  }
}
