// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry.rs - 旋转框几何计算
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

use std::ops::{Add, AddAssign, Mul, Sub};

/// 两个凸四边形求交时最多产生的点数：16 个边交点 + 4 + 4 个包含点
pub const MAX_INTERSECTION_POINTS: usize = 24;

const PARALLEL_EPS: f32 = 1e-14;
const COLINEAR_EPS: f32 = 1e-6;
const COINCIDENT_EPS: f32 = 1e-8;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

impl Add for Point {
  type Output = Point;

  fn add(self, rhs: Point) -> Point {
    Point::new(self.x + rhs.x, self.y + rhs.y)
  }
}

impl AddAssign for Point {
  fn add_assign(&mut self, rhs: Point) {
    self.x += rhs.x;
    self.y += rhs.y;
  }
}

impl Sub for Point {
  type Output = Point;

  fn sub(self, rhs: Point) -> Point {
    Point::new(self.x - rhs.x, self.y - rhs.y)
  }
}

impl Mul<f32> for Point {
  type Output = Point;

  fn mul(self, coeff: f32) -> Point {
    Point::new(self.x * coeff, self.y * coeff)
  }
}

/// 旋转矩形的四个顶点
pub type Quad = [Point; 4];

pub fn dot_2d(a: Point, b: Point) -> f32 {
  a.x * b.x + a.y * b.y
}

/// 二维叉积，符号表示 a 到 b 的转向
pub fn cross_2d(a: Point, b: Point) -> f32 {
  a.x * b.y - b.x * a.y
}

/// 将 `angle`（模型输出单位）换算成弧度。
///
/// 先按“弧度转角度”再按“角度转弧度”各做一次线性修正，
/// 与导出模型时使用的角度约定保持数值一致，不要随意改成标准换算。
pub fn angle_to_radians(angle: f32) -> f32 {
  let degrees = ((angle as f64 - 0.25) * 180.0) as f32;
  ((degrees as f64 - 0.25) * std::f64::consts::PI / 180.0) as f32
}

/// 绕 `pivot` 旋转点 `p`
pub fn rotate_point(p: Point, pivot: Point, angle: f32) -> Point {
  let radians = angle_to_radians(angle);
  let (sin_a, cos_a) = radians.sin_cos();
  let d = p - pivot;
  Point::new(
    cos_a * d.x - sin_a * d.y + pivot.x,
    sin_a * d.x + cos_a * d.y + pivot.y,
  )
}

/// 由轴对齐范围和角度生成旋转矩形顶点。
/// 顶点顺序：(xmin, ymin)、(xmax, ymin)、(xmax, ymax)、(xmin, ymax) 各自旋转后的位置。
pub fn rotated_vertices(xmin: f32, ymin: f32, xmax: f32, ymax: f32, angle: f32) -> Quad {
  let center = Point::new((xmin + xmax) / 2.0, (ymin + ymax) / 2.0);
  let half_w = (xmax - xmin) / 2.0;
  let half_h = (ymax - ymin) / 2.0;

  [
    rotate_point(Point::new(center.x - half_w, center.y - half_h), center, angle),
    rotate_point(Point::new(center.x + half_w, center.y - half_h), center, angle),
    rotate_point(Point::new(center.x + half_w, center.y + half_h), center, angle),
    rotate_point(Point::new(center.x - half_w, center.y + half_h), center, angle),
  ]
}

fn edges(quad: &Quad) -> [Point; 4] {
  std::array::from_fn(|i| quad[(i + 1) % 4] - quad[i])
}

/// 把 `inner` 中落在 `outer` 内部（含边界）的顶点追加到 `out`
fn push_contained(inner: &Quad, outer: &Quad, outer_edges: &[Point; 4], out: &mut Vec<Point>) {
  let ab = outer_edges[0];
  let da = outer_edges[3];
  let ab_dot_ab = dot_2d(ab, ab);
  let ad_dot_ad = dot_2d(da, da);

  for &p in inner {
    let ap = p - outer[0];
    let ap_dot_ab = dot_2d(ap, ab);
    let ap_dot_ad = -dot_2d(ap, da);

    if ap_dot_ab >= 0.0 && ap_dot_ad >= 0.0 && ap_dot_ab <= ab_dot_ab && ap_dot_ad <= ad_dot_ad {
      out.push(p);
    }
  }
}

/// 收集两个凸四边形的全部交点：边与边的交点，以及互相包含的顶点
pub fn intersection_points(pts1: &Quad, pts2: &Quad) -> Vec<Point> {
  let vec1 = edges(pts1);
  let vec2 = edges(pts2);
  let mut out = Vec::with_capacity(MAX_INTERSECTION_POINTS);

  for i in 0..4 {
    for j in 0..4 {
      let det = cross_2d(vec2[j], vec1[i]);
      if det.abs() <= PARALLEL_EPS {
        continue;
      }

      let vec12 = pts2[j] - pts1[i];
      let t1 = cross_2d(vec2[j], vec12) / det;
      let t2 = cross_2d(vec1[i], vec12) / det;

      if (0.0..=1.0).contains(&t1) && (0.0..=1.0).contains(&t2) {
        out.push(pts1[i] + vec1[i] * t1);
      }
    }
  }

  push_contained(pts1, pts2, &vec2, &mut out);
  push_contained(pts2, pts1, &vec1, &mut out);

  debug_assert!(out.len() <= MAX_INTERSECTION_POINTS);
  out
}

/// 以枢轴为原点的极角比较：叉积接近 0 时近者优先
fn precedes(a: Point, b: Point) -> bool {
  let temp = cross_2d(a, b);
  if temp.abs() < COLINEAR_EPS {
    dot_2d(a, a) < dot_2d(b, b)
  } else {
    temp > 0.0
  }
}

/// Graham 扫描求凸包，返回按逆时针排列的顶点（绝对坐标）。
///
/// 所有点与枢轴重合时退化为只含枢轴的单点凸包；输入为空时返回空。
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
  if points.is_empty() {
    return Vec::new();
  }

  let mut t = 0;
  for (i, p) in points.iter().enumerate().skip(1) {
    let s = points[t];
    if p.y < s.y || (p.y == s.y && p.x < s.x) {
      t = i;
    }
  }
  let start = points[t];

  let mut q: Vec<Point> = points.iter().map(|&p| p - start).collect();
  q.swap(0, t);

  // 比较函数在容差下并非严格全序，这里用插入排序避免标准库排序的全序检查
  for i in 2..q.len() {
    let mut k = i;
    while k > 1 && precedes(q[k], q[k - 1]) {
      q.swap(k, k - 1);
      k -= 1;
    }
  }

  let Some(k) = (1..q.len()).find(|&k| dot_2d(q[k], q[k]) > COINCIDENT_EPS) else {
    return vec![start];
  };

  let mut hull = Vec::with_capacity(q.len());
  hull.push(q[0]);
  hull.push(q[k]);
  for &p in &q[k + 1..] {
    while hull.len() > 1 {
      let m = hull.len();
      if cross_2d(p - hull[m - 2], hull[m - 1] - hull[m - 2]) >= 0.0 {
        hull.pop();
      } else {
        break;
      }
    }
    hull.push(p);
  }

  hull.into_iter().map(|p| p + start).collect()
}

/// 扇形三角剖分求凸多边形面积
pub fn polygon_area(polygon: &[Point]) -> f32 {
  if polygon.len() <= 2 {
    return 0.0;
  }

  let origin = polygon[0];
  let area: f32 = polygon
    .windows(2)
    .skip(1)
    .map(|w| cross_2d(w[0] - origin, w[1] - origin).abs())
    .sum();

  area / 2.0
}

/// 两个旋转四边形的相交面积，交点不足三个时为 0
pub fn quad_intersection_area(pts1: &Quad, pts2: &Quad) -> f32 {
  let points = intersection_points(pts1, pts2);
  if points.len() <= 2 {
    return 0.0;
  }

  polygon_area(&convex_hull(&points))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn axis_quad(x0: f32, y0: f32, x1: f32, y1: f32) -> Quad {
    [
      Point::new(x0, y0),
      Point::new(x1, y0),
      Point::new(x1, y1),
      Point::new(x0, y1),
    ]
  }

  #[test]
  fn test_point_ops() {
    let mut a = Point::new(1.0, 2.0);
    let b = Point::new(3.0, -1.0);
    assert_eq!(a + b, Point::new(4.0, 1.0));
    assert_eq!(a - b, Point::new(-2.0, 3.0));
    assert_eq!(b * 2.0, Point::new(6.0, -2.0));
    a += b;
    assert_eq!(a, Point::new(4.0, 1.0));
    assert_eq!(dot_2d(Point::new(1.0, 2.0), b), 1.0);
    assert!(cross_2d(Point::new(1.0, 0.0), Point::new(0.0, 1.0)) > 0.0);
  }

  #[test]
  fn test_angle_transform_is_preserved() {
    // 0.25 + 0.25/180 处应当恰好不旋转
    let angle = 0.25 + 0.25 / 180.0;
    assert!(angle_to_radians(angle).abs() < 1e-6);
    let expected = ((0.5f64 - 0.25) * 180.0 - 0.25) * std::f64::consts::PI / 180.0;
    assert!((angle_to_radians(0.5) as f64 - expected).abs() < 1e-6);
  }

  #[test]
  fn test_rotated_vertices_preserve_center_and_size() {
    let quad = rotated_vertices(10.0, 20.0, 50.0, 40.0, 0.7);
    let center = quad.iter().fold(Point::default(), |acc, &p| acc + p) * 0.25;
    assert!((center.x - 30.0).abs() < 1e-3);
    assert!((center.y - 30.0).abs() < 1e-3);

    let side = |a: Point, b: Point| dot_2d(b - a, b - a).sqrt();
    assert!((side(quad[0], quad[1]) - 40.0).abs() < 1e-3);
    assert!((side(quad[1], quad[2]) - 20.0).abs() < 1e-3);
    assert!((polygon_area(&quad) - 800.0).abs() < 1e-2);
  }

  #[test]
  fn test_identical_quads_overlap_fully() {
    let quad = rotated_vertices(0.0, 0.0, 30.0, 10.0, 0.4);
    let area = quad_intersection_area(&quad, &quad);
    assert!((area - 300.0).abs() < 1e-2, "area = {}", area);
  }

  #[test]
  fn test_disjoint_quads_have_zero_area() {
    let a = axis_quad(0.0, 0.0, 10.0, 10.0);
    let b = axis_quad(20.0, 20.0, 30.0, 30.0);
    assert!(intersection_points(&a, &b).is_empty());
    assert_eq!(quad_intersection_area(&a, &b), 0.0);
  }

  #[test]
  fn test_partial_overlap() {
    let a = axis_quad(0.0, 0.0, 10.0, 10.0);
    let b = axis_quad(5.0, 5.0, 15.0, 15.0);
    assert!((quad_intersection_area(&a, &b) - 25.0).abs() < 1e-4);
  }

  #[test]
  fn test_contained_quad() {
    let outer = axis_quad(0.0, 0.0, 10.0, 10.0);
    let inner = axis_quad(2.0, 3.0, 6.0, 5.0);
    assert!((quad_intersection_area(&outer, &inner) - 8.0).abs() < 1e-4);
    assert!((quad_intersection_area(&inner, &outer) - 8.0).abs() < 1e-4);
  }

  #[test]
  fn test_convex_hull_drops_interior_points() {
    let points = [
      Point::new(0.0, 0.0),
      Point::new(4.0, 0.0),
      Point::new(2.0, 1.0),
      Point::new(4.0, 4.0),
      Point::new(0.0, 4.0),
      Point::new(1.0, 2.0),
    ];
    let hull = convex_hull(&points);
    assert_eq!(hull.len(), 4);
    assert_eq!(hull[0], Point::new(0.0, 0.0));
    assert!((polygon_area(&hull) - 16.0).abs() < 1e-4);
  }

  #[test]
  fn test_convex_hull_colinear_points() {
    let points = [
      Point::new(3.0, 3.0),
      Point::new(1.0, 1.0),
      Point::new(0.0, 0.0),
      Point::new(2.0, 2.0),
    ];
    let hull = convex_hull(&points);
    assert!(!hull.is_empty());
    assert_eq!(polygon_area(&hull), 0.0);
  }

  #[test]
  fn test_convex_hull_coincident_points() {
    let points = [Point::new(1.0, 1.0); 5];
    assert_eq!(convex_hull(&points), vec![Point::new(1.0, 1.0)]);
    assert!(convex_hull(&[]).is_empty());
  }

  #[test]
  fn test_polygon_area_degenerate() {
    assert_eq!(polygon_area(&[]), 0.0);
    assert_eq!(polygon_area(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]), 0.0);
  }
}
