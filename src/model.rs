// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型后处理
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

use crate::geometry::{Point, Quad, rotated_vertices};

/// 推理之后的后处理阶段：输入为推理层给出的原始输出
pub trait PostProcess {
  type Input;
  type Output;
  type Error;

  fn postprocess(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 解码得到的候选框，坐标位于模型输入空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObbObject {
  pub xmin: f32,
  pub xmax: f32,
  pub ymin: f32,
  pub ymax: f32,
  pub prob: f32,
  /// 模型原始角度值，尚未换算
  pub angle: f32,
  pub label: usize,
}

impl ObbObject {
  pub fn area(&self) -> f32 {
    (self.xmax - self.xmin) * (self.ymax - self.ymin)
  }

  pub fn vertices(&self) -> Quad {
    rotated_vertices(self.xmin, self.ymin, self.xmax, self.ymax, self.angle)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: usize,
  pub score: f32,
  pub ptsl: Quad,
}

/// 有容量上限的检测结果列表，超出上限的结果被直接丢弃
#[derive(Debug, Clone)]
pub struct DetectResult {
  items: Vec<DetectItem>,
  capacity: usize,
}

impl DetectResult {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      items: Vec::with_capacity(capacity),
      capacity,
    }
  }

  /// 已满时返回 false
  pub fn push(&mut self, item: DetectItem) -> bool {
    if self.items.len() >= self.capacity {
      return false;
    }
    self.items.push(item);
    true
  }

  pub fn items(&self) -> &[DetectItem] {
    &self.items
  }

  pub fn count(&self) -> usize {
    self.items.len()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.items.len() >= self.capacity
  }
}

/// 预处理时的等比缩放与填充参数
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Letterbox {
  pub x_pad: i32,
  pub y_pad: i32,
  pub scale: f32,
}

impl Default for Letterbox {
  fn default() -> Self {
    Self {
      x_pad: 0,
      y_pad: 0,
      scale: 1.0,
    }
  }
}

impl Letterbox {
  pub fn new(x_pad: i32, y_pad: i32, scale: f32) -> Self {
    Self {
      x_pad,
      y_pad,
      scale,
    }
  }

  /// 把 `src_w x src_h` 的图像等比放入 `dst_w x dst_h`，两侧平均填充
  pub fn fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Self {
    let scale = (dst_w as f32 / src_w as f32).min(dst_h as f32 / src_h as f32);
    let resize_w = (src_w as f32 * scale) as i32;
    let resize_h = (src_h as f32 * scale) as i32;

    Self {
      x_pad: (dst_w as i32 - resize_w) / 2,
      y_pad: (dst_h as i32 - resize_h) / 2,
      scale,
    }
  }

  /// 原图坐标到模型输入坐标
  pub fn apply_point(&self, p: Point) -> Point {
    Point::new(
      p.x * self.scale + self.x_pad as f32,
      p.y * self.scale + self.y_pad as f32,
    )
  }

  /// 模型输入坐标回到原图坐标
  pub fn restore_point(&self, p: Point) -> Point {
    Point::new(
      (p.x - self.x_pad as f32) / self.scale,
      (p.y - self.y_pad as f32) / self.scale,
    )
  }

  /// 把候选框的轴对齐范围映射回原图，角度不变
  pub fn restore(&self, obj: &ObbObject) -> ObbObject {
    let min = self.restore_point(Point::new(obj.xmin, obj.ymin));
    let max = self.restore_point(Point::new(obj.xmax, obj.ymax));
    ObbObject {
      xmin: min.x,
      ymin: min.y,
      xmax: max.x,
      ymax: max.y,
      ..*obj
    }
  }
}

pub mod decode;
pub mod nms;
pub use self::decode::HeadTensors;

mod yolov8_obb;
pub use self::yolov8_obb::{
  DEFAULT_MAX_DETECTIONS, DEFAULT_NMS_THRESH, DEFAULT_OBJECT_THRESH, ObbError, ObbInput,
  YoloV8Obb, YoloV8ObbBuilder,
};
