// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/decode.rs - 检测头解码
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

use tracing::{debug, error};

use crate::{
  model::{ObbError, ObbObject},
  tensor::{QuantElement, TensorData, TensorView},
};

/// 一个特征金字塔层级的三个输出：框分布、类别分数、角度
#[derive(Debug, Clone, Copy)]
pub struct HeadTensors<'a> {
  pub boxes: TensorView<'a>,
  pub scores: TensorView<'a>,
  pub angles: TensorView<'a>,
}

impl<'a> HeadTensors<'a> {
  pub fn new(
    boxes: TensorView<'a>,
    scores: TensorView<'a>,
    angles: TensorView<'a>,
  ) -> Result<Self, ObbError> {
    let (bh, bw, bc) = boxes.hwc();
    let (sh, sw, sc) = scores.hwc();
    let (ah, aw, ac) = angles.hwc();

    if (bh, bw) != (sh, sw) || (bh, bw) != (ah, aw) {
      error!(
        "检测头网格不一致: 框 {}x{}, 分数 {}x{}, 角度 {}x{}",
        bh, bw, sh, sw, ah, aw
      );
      return Err(ObbError::GridMismatch {
        boxes: (bh, bw),
        scores: (sh, sw),
        angles: (ah, aw),
      });
    }
    if bc == 0 || bc % 4 != 0 {
      return Err(ObbError::InvalidBoxChannels(bc));
    }
    if sc == 0 {
      return Err(ObbError::InvalidScoreChannels(sc));
    }
    if ac != 1 {
      return Err(ObbError::InvalidAngleChannels(ac));
    }

    Ok(Self {
      boxes,
      scores,
      angles,
    })
  }

  /// (grid_h, grid_w)
  pub fn grid(&self) -> (usize, usize) {
    let (h, w, _) = self.boxes.hwc();
    (h, w)
  }

  pub fn dfl_len(&self) -> usize {
    self.boxes.hwc().2 / 4
  }

  pub fn class_num(&self) -> usize {
    self.scores.hwc().2
  }
}

/// 按单元格挑选最高分类别。只有严格大于阈值的类别才参与比较。
pub trait ScoreGate {
  fn best(&self, row: usize, col: usize) -> Option<(usize, f32)>;
}

/// 量化分数：阈值每层只换算一次，逐元素直接比较量化值
pub struct QuantizedGate<'a, T> {
  data: &'a [T],
  view: TensorView<'a>,
  threshold: T,
}

impl<'a, T: QuantElement> QuantizedGate<'a, T> {
  pub fn new(data: &'a [T], view: TensorView<'a>, threshold: f32) -> Self {
    Self {
      data,
      view,
      threshold: T::quantize(threshold, view.zp(), view.scale()),
    }
  }
}

impl<T: QuantElement> ScoreGate for QuantizedGate<'_, T> {
  fn best(&self, row: usize, col: usize) -> Option<(usize, f32)> {
    let class_num = self.view.hwc().2;
    let mut best: Option<(usize, T)> = None;

    for c in 0..class_num {
      let q = self.data[self.view.index(row, col, c)];
      if q > self.threshold && best.is_none_or(|(_, b)| q > b) {
        best = Some((c, q));
      }
    }

    best.map(|(c, q)| (c, q.dequantize(self.view.zp(), self.view.scale())))
  }
}

pub struct FloatGate<'a> {
  data: &'a [f32],
  view: TensorView<'a>,
  threshold: f32,
}

impl<'a> FloatGate<'a> {
  pub fn new(data: &'a [f32], view: TensorView<'a>, threshold: f32) -> Self {
    Self {
      data,
      view,
      threshold,
    }
  }
}

impl ScoreGate for FloatGate<'_> {
  fn best(&self, row: usize, col: usize) -> Option<(usize, f32)> {
    let class_num = self.view.hwc().2;
    let mut best: Option<(usize, f32)> = None;

    for c in 0..class_num {
      let s = self.data[self.view.index(row, col, c)];
      if s > self.threshold && best.is_none_or(|(_, b)| s > b) {
        best = Some((c, s));
      }
    }

    best
  }
}

/// 把 logits 视作未归一化的离散分布，求偏移量 0..n 的期望
pub fn dfl_expectation(logits: &[f32]) -> f32 {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let mut exp_sum = 0.0;
  let mut acc_sum = 0.0;
  for (i, &l) in logits.iter().enumerate() {
    let e = (l - max).exp();
    exp_sum += e;
    acc_sum += e * i as f32;
  }

  if exp_sum > 0.0 { acc_sum / exp_sum } else { 0.0 }
}

/// 单元格的 (left, top, right, bottom) 偏移，单位为 stride
fn compute_dfl(boxes: &TensorView, row: usize, col: usize, dfl_len: usize, scratch: &mut Vec<f32>) -> [f32; 4] {
  std::array::from_fn(|b| {
    scratch.clear();
    scratch.extend((0..dfl_len).map(|k| boxes.value_at(row, col, b * dfl_len + k)));
    dfl_expectation(scratch)
  })
}

fn decode_with<G: ScoreGate>(
  head: &HeadTensors,
  gate: &G,
  stride: f32,
  out: &mut Vec<ObbObject>,
) -> usize {
  let (grid_h, grid_w) = head.grid();
  let dfl_len = head.dfl_len();
  let mut scratch = Vec::with_capacity(dfl_len);
  let mut valid = 0;

  for i in 0..grid_h {
    for j in 0..grid_w {
      let Some((label, prob)) = gate.best(i, j) else {
        continue;
      };

      let [l, t, r, b] = compute_dfl(&head.boxes, i, j, dfl_len, &mut scratch);
      let angle = head.angles.value_at(i, j, 0);

      let gx = j as f32 + 0.5;
      let gy = i as f32 + 0.5;
      out.push(ObbObject {
        xmin: (gx - l) * stride,
        ymin: (gy - t) * stride,
        xmax: (gx + r) * stride,
        ymax: (gy + b) * stride,
        prob,
        angle,
        label,
      });
      valid += 1;
    }
  }

  valid
}

/// 解码一个层级，返回追加到 `out` 的候选框数量。
/// 解码策略由分数张量的数据类型决定。
pub fn decode_head(head: &HeadTensors, stride: f32, threshold: f32, out: &mut Vec<ObbObject>) -> usize {
  let scores = head.scores;
  let valid = match scores.data() {
    TensorData::Int8(d) => decode_with(head, &QuantizedGate::new(d, scores, threshold), stride, out),
    TensorData::UInt8(d) => decode_with(head, &QuantizedGate::new(d, scores, threshold), stride, out),
    TensorData::Float32(d) => decode_with(head, &FloatGate::new(d, scores, threshold), stride, out),
  };

  let (grid_h, grid_w) = head.grid();
  debug!(
    "检测头 {}x{} (stride {}): {} 个候选框",
    grid_h, grid_w, stride, valid
  );
  valid
}
