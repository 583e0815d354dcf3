// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolov8_obb.rs - YOLOv8 旋转框模型后处理
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

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  frame::ObbFrame,
  geometry::rotated_vertices,
  model::{
    DetectItem, DetectResult, HeadTensors, Letterbox, ObbObject, PostProcess,
    decode::decode_head,
    nms::{nms_sorted, sort_descending},
  },
  tensor::{TensorError, TensorView},
};

pub const DEFAULT_OBJECT_THRESH: f32 = 0.25;
pub const DEFAULT_NMS_THRESH: f32 = 0.10;
pub const DEFAULT_MAX_DETECTIONS: usize = 128;

/// 每个层级的输出数量：框分布、类别分数、角度
const OUTPUTS_PER_HEAD: usize = 3;

#[derive(Error, Debug)]
pub enum ObbError {
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
  #[error("输出数量 {0} 不是 3 的整数倍")]
  OutputCount(usize),
  #[error("检测头网格不一致: 框 {boxes:?}, 分数 {scores:?}, 角度 {angles:?}")]
  GridMismatch {
    boxes: (usize, usize),
    scores: (usize, usize),
    angles: (usize, usize),
  },
  #[error("框分布通道数无效: {0}")]
  InvalidBoxChannels(usize),
  #[error("类别分数通道数无效: {0}")]
  InvalidScoreChannels(usize),
  #[error("角度通道数无效: {0}")]
  InvalidAngleChannels(usize),
  #[error("模型输入尺寸 {width}x{height} 与网格 {grid_h}x{grid_w} 不匹配")]
  InvalidGrid {
    width: usize,
    height: usize,
    grid_h: usize,
    grid_w: usize,
  },
  #[error("缩放系数无效: {0}")]
  InvalidLetterbox(f32),
  #[error("{0} 阈值必须位于 [0, 1]，实际为 {1}")]
  InvalidThreshold(&'static str, f32),
  #[error("结果容量必须大于 0")]
  InvalidCapacity,
}

/// 一次后处理的输入：各层级输出与预处理参数
#[derive(Debug, Clone)]
pub struct ObbInput<'a> {
  heads: Vec<HeadTensors<'a>>,
  model_width: usize,
  model_height: usize,
  letterbox: Letterbox,
}

impl<'a> ObbInput<'a> {
  /// `outputs` 按 (框, 分数, 角度) 三个一组依次排列，每组对应一个层级
  pub fn from_outputs(
    outputs: &[TensorView<'a>],
    model_width: usize,
    model_height: usize,
    letterbox: Letterbox,
  ) -> Result<Self, ObbError> {
    if outputs.is_empty() || outputs.len() % OUTPUTS_PER_HEAD != 0 {
      error!("模型输出数量无效: {}", outputs.len());
      return Err(ObbError::OutputCount(outputs.len()));
    }
    if !(letterbox.scale.is_finite() && letterbox.scale > 0.0) {
      return Err(ObbError::InvalidLetterbox(letterbox.scale));
    }

    let heads = outputs
      .chunks_exact(OUTPUTS_PER_HEAD)
      .map(|chunk| {
        let head = HeadTensors::new(chunk[0], chunk[1], chunk[2])?;
        let (grid_h, grid_w) = head.grid();
        if grid_h == 0 || grid_w == 0 || grid_h > model_height {
          return Err(ObbError::InvalidGrid {
            width: model_width,
            height: model_height,
            grid_h,
            grid_w,
          });
        }
        Ok(head)
      })
      .collect::<Result<Vec<_>, _>>()?;

    debug!("共 {} 个检测头", heads.len());
    Ok(Self {
      heads,
      model_width,
      model_height,
      letterbox,
    })
  }

  pub fn heads(&self) -> &[HeadTensors<'a>] {
    &self.heads
  }

  pub fn model_size(&self) -> (usize, usize) {
    (self.model_width, self.model_height)
  }

  pub fn letterbox(&self) -> Letterbox {
    self.letterbox
  }

  /// 层级步长：模型输入高度整除网格高度
  pub fn stride(&self, head: &HeadTensors) -> f32 {
    (self.model_height / head.grid().0) as f32
  }
}

#[derive(Debug, Clone)]
pub struct YoloV8ObbBuilder {
  conf_threshold: f32,
  nms_threshold: f32,
  max_detections: usize,
}

impl Default for YoloV8ObbBuilder {
  fn default() -> Self {
    Self {
      conf_threshold: DEFAULT_OBJECT_THRESH,
      nms_threshold: DEFAULT_NMS_THRESH,
      max_detections: DEFAULT_MAX_DETECTIONS,
    }
  }
}

impl YoloV8ObbBuilder {
  pub fn conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn max_detections(mut self, max_detections: usize) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn build(self) -> Result<YoloV8Obb, ObbError> {
    if !(0.0..=1.0).contains(&self.conf_threshold) {
      return Err(ObbError::InvalidThreshold("置信度", self.conf_threshold));
    }
    if !(0.0..=1.0).contains(&self.nms_threshold) {
      return Err(ObbError::InvalidThreshold("NMS", self.nms_threshold));
    }
    if self.max_detections == 0 {
      return Err(ObbError::InvalidCapacity);
    }

    info!(
      "后处理参数: 置信度阈值 {}, NMS 阈值 {}, 最大结果数 {}",
      self.conf_threshold, self.nms_threshold, self.max_detections
    );
    Ok(YoloV8Obb {
      conf_threshold: self.conf_threshold,
      nms_threshold: self.nms_threshold,
      max_detections: self.max_detections,
    })
  }
}

/// YOLOv8 OBB 后处理：解码 → 排序 → NMS → 映射回原图
#[derive(Debug, Clone)]
pub struct YoloV8Obb {
  conf_threshold: f32,
  nms_threshold: f32,
  max_detections: usize,
}

impl YoloV8Obb {
  pub fn conf_threshold(&self) -> f32 {
    self.conf_threshold
  }

  pub fn nms_threshold(&self) -> f32 {
    self.nms_threshold
  }

  pub fn max_detections(&self) -> usize {
    self.max_detections
  }

  /// 解码全部层级，返回模型输入空间中的候选框
  pub fn decode(&self, input: &ObbInput) -> Vec<ObbObject> {
    let mut objects = Vec::new();
    for head in input.heads() {
      decode_head(head, input.stride(head), self.conf_threshold, &mut objects);
    }
    objects
  }

  pub fn run(&self, input: &ObbInput) -> DetectResult {
    let mut result = DetectResult::with_capacity(self.max_detections);

    let mut objects = self.decode(input);
    if objects.is_empty() {
      debug!("没有超过阈值的候选框");
      return result;
    }

    sort_descending(&mut objects);
    let picked = nms_sorted(&objects, self.nms_threshold);
    debug!("候选框 {} 个, NMS 后保留 {} 个", objects.len(), picked.len());

    let letterbox = input.letterbox();
    for &i in &picked {
      let obj = letterbox.restore(&objects[i]);
      let item = DetectItem {
        class_id: obj.label,
        score: obj.prob,
        ptsl: rotated_vertices(obj.xmin, obj.ymin, obj.xmax, obj.ymax, obj.angle),
      };
      if !result.push(item) {
        debug!(
          "结果数量达到上限 {}, 丢弃其余 {} 个",
          self.max_detections,
          picked.len() - result.count()
        );
        break;
      }
    }

    result
  }
}

impl PostProcess for YoloV8Obb {
  type Input = ObbFrame;
  type Output = DetectResult;
  type Error = ObbError;

  fn postprocess(&self, frame: &Self::Input) -> Result<Self::Output, Self::Error> {
    let input = frame.as_obb_input()?;
    Ok(self.run(&input))
  }
}
