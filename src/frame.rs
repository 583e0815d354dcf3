// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 推理输出帧定义
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

use crate::{
  model::{Letterbox, ObbError, ObbInput},
  tensor::{TensorData, TensorError, TensorLayout, TensorType, TensorView},
};

#[derive(Debug, Clone, PartialEq)]
pub enum TensorBuffer {
  Int8(Box<[i8]>),
  UInt8(Box<[u8]>),
  Float32(Box<[f32]>),
}

impl TensorBuffer {
  pub fn tensor_type(&self) -> TensorType {
    match self {
      TensorBuffer::Int8(_) => TensorType::Int8,
      TensorBuffer::UInt8(_) => TensorType::UInt8,
      TensorBuffer::Float32(_) => TensorType::Float32,
    }
  }

  pub fn as_data(&self) -> TensorData<'_> {
    match self {
      TensorBuffer::Int8(d) => TensorData::Int8(d),
      TensorBuffer::UInt8(d) => TensorData::UInt8(d),
      TensorBuffer::Float32(d) => TensorData::Float32(d),
    }
  }
}

/// 持有数据的输出张量，推理层之外（如离线转储）使用
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedTensor {
  pub buffer: TensorBuffer,
  pub dims: Vec<usize>,
  pub layout: TensorLayout,
  pub zp: i32,
  pub scale: f32,
}

impl OwnedTensor {
  pub fn view(&self) -> Result<TensorView<'_>, TensorError> {
    TensorView::new(
      self.buffer.as_data(),
      &self.dims,
      self.layout,
      self.zp,
      self.scale,
    )
  }
}

/// 一帧图像的全部模型输出及其预处理参数
#[derive(Debug, Clone)]
pub struct ObbFrame {
  name: String,
  model_width: usize,
  model_height: usize,
  letterbox: Letterbox,
  outputs: Vec<OwnedTensor>,
}

impl ObbFrame {
  pub fn new(
    name: impl Into<String>,
    model_width: usize,
    model_height: usize,
    letterbox: Letterbox,
    outputs: Vec<OwnedTensor>,
  ) -> Self {
    Self {
      name: name.into(),
      model_width,
      model_height,
      letterbox,
      outputs,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn model_size(&self) -> (usize, usize) {
    (self.model_width, self.model_height)
  }

  pub fn letterbox(&self) -> Letterbox {
    self.letterbox
  }

  pub fn outputs(&self) -> &[OwnedTensor] {
    &self.outputs
  }

  /// 借出张量视图，组装成后处理输入
  pub fn as_obb_input(&self) -> Result<ObbInput<'_>, ObbError> {
    let views = self
      .outputs
      .iter()
      .map(OwnedTensor::view)
      .collect::<Result<Vec<_>, _>>()?;

    ObbInput::from_outputs(
      &views,
      self.model_width,
      self.model_height,
      self.letterbox,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tensor(buffer: TensorBuffer, dims: &[usize]) -> OwnedTensor {
    OwnedTensor {
      buffer,
      dims: dims.to_vec(),
      layout: TensorLayout::Nhwc,
      zp: 0,
      scale: 1.0,
    }
  }

  #[test]
  fn test_frame_lends_views() {
    let frame = ObbFrame::new(
      "P0001",
      16,
      16,
      Letterbox::default(),
      vec![
        tensor(TensorBuffer::Int8(vec![0; 16].into()), &[1, 2, 2, 4]),
        tensor(TensorBuffer::UInt8(vec![0; 8].into()), &[1, 2, 2, 2]),
        tensor(TensorBuffer::Float32(vec![0.0; 4].into()), &[1, 2, 2, 1]),
      ],
    );
    let input = frame.as_obb_input().unwrap();
    assert_eq!(input.heads().len(), 1);
    assert_eq!(input.heads()[0].class_num(), 2);
    assert_eq!(input.stride(&input.heads()[0]), 8.0);
    assert_eq!(frame.outputs()[1].buffer.tensor_type(), TensorType::UInt8);
  }

  #[test]
  fn test_frame_reports_bad_tensor() {
    let frame = ObbFrame::new(
      "broken",
      16,
      16,
      Letterbox::default(),
      vec![tensor(TensorBuffer::Int8(vec![0; 3].into()), &[1, 2, 2, 4])],
    );
    assert!(matches!(
      frame.as_obb_input(),
      Err(ObbError::TensorError(TensorError::LengthMismatch { .. }))
    ));

    // 空 batch 的张量长度为 0，同样在后处理前报错
    let frame = ObbFrame::new(
      "empty",
      16,
      16,
      Letterbox::default(),
      vec![
        tensor(TensorBuffer::Int8(Box::default()), &[0, 2, 2, 4]),
        tensor(TensorBuffer::UInt8(Box::default()), &[0, 2, 2, 2]),
        tensor(TensorBuffer::Float32(Box::default()), &[0, 2, 2, 1]),
      ],
    );
    assert!(matches!(
      frame.as_obb_input(),
      Err(ObbError::TensorError(TensorError::EmptyDimension(_)))
    ));
  }
}
