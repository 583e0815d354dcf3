// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor.rs - 推理输出张量视图
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

#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
  #[error("张量维度必须为 4，实际为 {0}")]
  RankMismatch(usize),
  #[error("张量数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("量化缩放系数无效: {0}")]
  InvalidScale(f32),
  #[error("张量维度不能为 0: {0:?}")]
  EmptyDimension([usize; 4]),
  #[error("张量维度乘积溢出: {0:?}")]
  ShapeOverflow([usize; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TensorType {
  Int8,
  UInt8,
  Float32,
}

/// 4 维张量的内存排布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TensorLayout {
  #[default]
  Nhwc,
  Nchw,
}

/// 仿射量化的整数元素
pub trait QuantElement: Copy + PartialOrd {
  const MIN: f32;
  const MAX: f32;

  fn to_f32(self) -> f32;
  fn from_clamped(v: f32) -> Self;

  fn dequantize(self, zp: i32, scale: f32) -> f32 {
    (self.to_f32() - zp as f32) * scale
  }

  /// 浮点值映射到量化域，先截断到可表示范围再向零取整
  fn quantize(v: f32, zp: i32, scale: f32) -> Self {
    let dst = v / scale + zp as f32;
    Self::from_clamped(dst.clamp(Self::MIN, Self::MAX))
  }
}

impl QuantElement for i8 {
  const MIN: f32 = i8::MIN as f32;
  const MAX: f32 = i8::MAX as f32;

  fn to_f32(self) -> f32 {
    self as f32
  }

  fn from_clamped(v: f32) -> Self {
    v as i8
  }
}

impl QuantElement for u8 {
  const MIN: f32 = u8::MIN as f32;
  const MAX: f32 = u8::MAX as f32;

  fn to_f32(self) -> f32 {
    self as f32
  }

  fn from_clamped(v: f32) -> Self {
    v as u8
  }
}

#[derive(Debug, Clone, Copy)]
pub enum TensorData<'a> {
  Int8(&'a [i8]),
  UInt8(&'a [u8]),
  Float32(&'a [f32]),
}

impl TensorData<'_> {
  pub fn len(&self) -> usize {
    match self {
      TensorData::Int8(d) => d.len(),
      TensorData::UInt8(d) => d.len(),
      TensorData::Float32(d) => d.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn tensor_type(&self) -> TensorType {
    match self {
      TensorData::Int8(_) => TensorType::Int8,
      TensorData::UInt8(_) => TensorType::UInt8,
      TensorData::Float32(_) => TensorType::Float32,
    }
  }
}

/// 只读张量视图：借用推理层的缓冲区，携带形状与量化参数
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
  data: TensorData<'a>,
  dims: [usize; 4],
  layout: TensorLayout,
  zp: i32,
  scale: f32,
}

impl<'a> TensorView<'a> {
  pub fn new(
    data: TensorData<'a>,
    dims: &[usize],
    layout: TensorLayout,
    zp: i32,
    scale: f32,
  ) -> Result<Self, TensorError> {
    let dims: [usize; 4] = dims
      .try_into()
      .map_err(|_| TensorError::RankMismatch(dims.len()))?;

    if dims.contains(&0) {
      return Err(TensorError::EmptyDimension(dims));
    }
    let expected = dims
      .iter()
      .try_fold(1usize, |acc, &d| acc.checked_mul(d))
      .ok_or(TensorError::ShapeOverflow(dims))?;
    if data.len() != expected {
      return Err(TensorError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    // 浮点张量不使用量化参数
    if !matches!(data, TensorData::Float32(_)) && !(scale.is_finite() && scale > 0.0) {
      return Err(TensorError::InvalidScale(scale));
    }

    Ok(Self {
      data,
      dims,
      layout,
      zp,
      scale,
    })
  }

  pub fn data(&self) -> TensorData<'a> {
    self.data
  }

  pub fn tensor_type(&self) -> TensorType {
    self.data.tensor_type()
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn dims(&self) -> [usize; 4] {
    self.dims
  }

  pub fn zp(&self) -> i32 {
    self.zp
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  /// (h, w, c)，与排布无关
  pub fn hwc(&self) -> (usize, usize, usize) {
    let [_, d1, d2, d3] = self.dims;
    match self.layout {
      TensorLayout::Nhwc => (d1, d2, d3),
      TensorLayout::Nchw => (d2, d3, d1),
    }
  }

  /// 第 0 个 batch 中 (row, col, channel) 的线性下标
  pub fn index(&self, row: usize, col: usize, channel: usize) -> usize {
    let (h, w, c) = self.hwc();
    match self.layout {
      TensorLayout::Nhwc => (row * w + col) * c + channel,
      TensorLayout::Nchw => (channel * h + row) * w + col,
    }
  }

  /// 反量化后的浮点值
  pub fn value(&self, idx: usize) -> f32 {
    match self.data {
      TensorData::Int8(d) => d[idx].dequantize(self.zp, self.scale),
      TensorData::UInt8(d) => d[idx].dequantize(self.zp, self.scale),
      TensorData::Float32(d) => d[idx],
    }
  }

  pub fn value_at(&self, row: usize, col: usize, channel: usize) -> f32 {
    self.value(self.index(row, col, channel))
  }
}
