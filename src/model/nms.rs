// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/nms.rs - 旋转框非极大值抑制
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

use crate::{geometry::quad_intersection_area, model::ObbObject};

/// 按置信度降序排序
pub fn sort_descending(objects: &mut [ObbObject]) {
  objects.sort_by(|a, b| b.prob.total_cmp(&a.prob));
}

fn iou_from_areas(inter: f32, area_a: f32, area_b: f32) -> f32 {
  let union = area_a + area_b - inter;
  if union <= 0.0 {
    return 0.0;
  }
  let iou = inter / union;
  if iou.is_finite() { iou } else { 0.0 }
}

/// 旋转框交并比，并集面积为 0 时返回 0
pub fn rotated_iou(a: &ObbObject, b: &ObbObject) -> f32 {
  let inter = quad_intersection_area(&a.vertices(), &b.vertices());
  iou_from_areas(inter, a.area(), b.area())
}

/// 对已按置信度降序排列的候选框做贪心 NMS，返回保留的下标（保持原顺序）。
/// 不区分类别。
pub fn nms_sorted(objects: &[ObbObject], nms_threshold: f32) -> Vec<usize> {
  let quads: Vec<_> = objects.iter().map(ObbObject::vertices).collect();
  let areas: Vec<f32> = objects.iter().map(ObbObject::area).collect();
  let mut picked: Vec<usize> = Vec::new();

  for i in 0..objects.len() {
    let keep = picked.iter().all(|&j| {
      let inter = quad_intersection_area(&quads[i], &quads[j]);
      iou_from_areas(inter, areas[i], areas[j]) <= nms_threshold
    });

    if keep {
      picked.push(i);
    }
  }

  picked
}

#[cfg(test)]
mod tests {
  use super::*;

  /// 该角度值换算后恰好不旋转
  const AXIS_ALIGNED: f32 = 0.25 + 0.25 / 180.0;

  fn obj(xmin: f32, ymin: f32, xmax: f32, ymax: f32, prob: f32, angle: f32) -> ObbObject {
    ObbObject {
      xmin,
      xmax,
      ymin,
      ymax,
      prob,
      angle,
      label: 0,
    }
  }

  #[test]
  fn test_sort_descending() {
    let mut objects = vec![
      obj(0.0, 0.0, 1.0, 1.0, 0.3, 0.0),
      obj(0.0, 0.0, 1.0, 1.0, 0.9, 0.0),
      obj(0.0, 0.0, 1.0, 1.0, 0.5, 0.0),
    ];
    sort_descending(&mut objects);
    let probs: Vec<f32> = objects.iter().map(|o| o.prob).collect();
    assert_eq!(probs, vec![0.9, 0.5, 0.3]);
  }

  #[test]
  fn test_identical_boxes_iou_is_one() {
    for angle in [0.0, 0.1, 0.37, AXIS_ALIGNED, 0.9] {
      let a = obj(100.0, 50.0, 180.0, 90.0, 0.9, angle);
      let iou = rotated_iou(&a, &a);
      assert!((iou - 1.0).abs() < 1e-3, "angle {} iou {}", angle, iou);
    }
  }

  #[test]
  fn test_zero_area_boxes_do_not_divide_by_zero() {
    let a = obj(10.0, 10.0, 10.0, 10.0, 0.9, 0.0);
    assert_eq!(rotated_iou(&a, &a), 0.0);
    assert_eq!(iou_from_areas(0.0, 0.0, 0.0), 0.0);
  }

  #[test]
  fn test_threshold_decides_suppression() {
    // 交 200，并 400，IoU = 0.5
    let objects = [
      obj(0.0, 0.0, 30.0, 10.0, 0.9, AXIS_ALIGNED),
      obj(10.0, 0.0, 40.0, 10.0, 0.8, AXIS_ALIGNED),
    ];
    let iou = rotated_iou(&objects[0], &objects[1]);
    assert!((iou - 0.5).abs() < 1e-3, "iou {}", iou);

    assert_eq!(nms_sorted(&objects, 0.3), vec![0]);
    assert_eq!(nms_sorted(&objects, 0.6), vec![0, 1]);
  }

  #[test]
  fn test_nms_output_has_no_overlapping_pairs() {
    let mut seed = 0x2545_f491u32;
    let mut next = || {
      seed ^= seed << 13;
      seed ^= seed >> 17;
      seed ^= seed << 5;
      (seed % 10_000) as f32 / 10_000.0
    };

    let mut objects: Vec<ObbObject> = (0..60)
      .map(|_| {
        let x = next() * 200.0;
        let y = next() * 200.0;
        let w = 10.0 + next() * 40.0;
        let h = 10.0 + next() * 40.0;
        obj(x, y, x + w, y + h, next(), next())
      })
      .collect();
    sort_descending(&mut objects);

    let threshold = 0.2;
    let picked = nms_sorted(&objects, threshold);
    assert!(!picked.is_empty());
    for w in picked.windows(2) {
      assert!(w[0] < w[1]);
      assert!(objects[w[0]].prob >= objects[w[1]].prob);
    }
    for (n, &i) in picked.iter().enumerate() {
      for &j in &picked[n + 1..] {
        assert!(rotated_iou(&objects[j], &objects[i]) <= threshold);
      }
    }
  }
}
