// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry.rs - Letterbox 几何变换
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

/// 模型输入边长
pub const TARGET_SIZE: u32 = 640;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
  #[error("帧尺寸无效: {width}x{height} (目标尺寸 {target})")]
  InvalidFrame { width: u32, height: u32, target: u32 },
}

/// 二维点，单位为像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 原始帧与正方形输入之间的 letterbox 映射
///
/// 每帧创建一次，预处理与后处理必须共用同一个实例。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
  pub orig_width: u32,
  pub orig_height: u32,
  pub target_size: u32,
  pub scale: f32,
  pub scaled_width: u32,
  pub scaled_height: u32,
  pub pad_x: f32,
  pub pad_y: f32,
}

/// 计算等比缩放加对称填充的 letterbox 参数
pub fn compute_letterbox(
  orig_width: u32,
  orig_height: u32,
  target_size: u32,
) -> Result<FrameGeometry, GeometryError> {
  if orig_width == 0 || orig_height == 0 || target_size == 0 {
    return Err(GeometryError::InvalidFrame {
      width: orig_width,
      height: orig_height,
      target: target_size,
    });
  }

  let target = target_size as f32;
  let scale = (target / orig_width as f32).min(target / orig_height as f32);
  // 舍入误差不能让缩放后的尺寸越过目标边长
  let scaled_width = ((orig_width as f32 * scale).round() as u32).clamp(1, target_size);
  let scaled_height = ((orig_height as f32 * scale).round() as u32).clamp(1, target_size);

  Ok(FrameGeometry {
    orig_width,
    orig_height,
    target_size,
    scale,
    scaled_width,
    scaled_height,
    pad_x: (target_size - scaled_width) as f32 / 2.0,
    pad_y: (target_size - scaled_height) as f32 / 2.0,
  })
}

impl FrameGeometry {
  /// 水平方向的逆缩放系数，使用取整后的实际尺寸
  pub fn inverse_scale_x(&self) -> f32 {
    self.orig_width as f32 / self.scaled_width as f32
  }

  pub fn inverse_scale_y(&self) -> f32 {
    self.orig_height as f32 / self.scaled_height as f32
  }

  /// 缩放图像在正方形输入中实际所在的像素偏移
  ///
  /// 填充为半像素时向下取整，输入张量与坐标映射都以它为准。
  pub fn offset_x(&self) -> f32 {
    self.pad_x.floor()
  }

  pub fn offset_y(&self) -> f32 {
    self.pad_y.floor()
  }

  /// 把点限制在原始帧范围内
  pub fn clip(&self, point: Point) -> Point {
    Point {
      x: point.x.clamp(0.0, self.orig_width as f32),
      y: point.y.clamp(0.0, self.orig_height as f32),
    }
  }
}

/// 原始帧坐标 → 正方形输入坐标
///
/// 乘以取整后的实际缩放比 `scaled / orig`，而不是 `scale`，
/// 这样才与 `to_original` 严格互逆。
pub fn to_padded_square(point: Point, geom: &FrameGeometry) -> Point {
  Point {
    x: point.x / geom.inverse_scale_x() + geom.offset_x(),
    y: point.y / geom.inverse_scale_y() + geom.offset_y(),
  }
}

/// 正方形输入坐标 → 原始帧坐标
pub fn to_original(point: Point, geom: &FrameGeometry) -> Point {
  Point {
    x: (point.x - geom.offset_x()) * geom.inverse_scale_x(),
    y: (point.y - geom.offset_y()) * geom.inverse_scale_y(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn landscape_frame_pads_vertically() {
    let geom = compute_letterbox(1280, 720, TARGET_SIZE).unwrap();
    assert_eq!(geom.scale, 0.5);
    assert_eq!(geom.scaled_width, 640);
    assert_eq!(geom.scaled_height, 360);
    assert_eq!(geom.pad_x, 0.0);
    assert_eq!(geom.pad_y, 140.0);
  }

  #[test]
  fn portrait_frame_pads_horizontally() {
    let geom = compute_letterbox(480, 640, TARGET_SIZE).unwrap();
    assert_eq!(geom.scaled_height, 640);
    assert_eq!(geom.scaled_width, 480);
    assert_eq!(geom.pad_x, 80.0);
    assert_eq!(geom.pad_y, 0.0);
  }

  #[test]
  fn one_side_always_fills_target() {
    for &(w, h) in &[(1, 1), (3, 7), (1920, 1080), (641, 17), (333, 999), (10000, 3)] {
      let geom = compute_letterbox(w, h, TARGET_SIZE).unwrap();
      assert!(geom.scaled_width <= TARGET_SIZE && geom.scaled_height <= TARGET_SIZE);
      assert!(
        geom.scaled_width == TARGET_SIZE || geom.scaled_height == TARGET_SIZE,
        "{}x{} -> {:?}",
        w,
        h,
        geom
      );
    }
  }

  #[test]
  fn zero_dimension_is_invalid() {
    assert!(matches!(
      compute_letterbox(0, 720, TARGET_SIZE),
      Err(GeometryError::InvalidFrame { .. })
    ));
    assert!(compute_letterbox(1280, 0, TARGET_SIZE).is_err());
    assert!(compute_letterbox(1280, 720, 0).is_err());
  }

  #[test]
  fn round_trip_is_identity() {
    for &(w, h) in &[(1280, 720), (720, 1280), (333, 517), (1, 1), (4000, 3000)] {
      let geom = compute_letterbox(w, h, TARGET_SIZE).unwrap();
      for i in 0..=10 {
        for j in 0..=10 {
          let p = Point::new(w as f32 * i as f32 / 10.0, h as f32 * j as f32 / 10.0);
          let back = to_original(to_padded_square(p, &geom), &geom);
          let tol = 1e-3 * (w.max(h) as f32).max(1.0);
          assert!((back.x - p.x).abs() <= tol, "{:?} -> {:?}", p, back);
          assert!((back.y - p.y).abs() <= tol, "{:?} -> {:?}", p, back);
        }
      }
    }
  }

  #[test]
  fn inverse_uses_rounded_scaled_size() {
    // 1000 * 0.64 = 640, 333 * 0.64 = 213.12 -> 213
    let geom = compute_letterbox(1000, 333, TARGET_SIZE).unwrap();
    assert_eq!(geom.scaled_height, 213);
    let bottom = to_original(Point::new(0.0, geom.offset_y() + 213.0), &geom);
    assert!((bottom.y - 333.0).abs() < 1e-3);
  }

  #[test]
  fn half_pixel_pad_is_floored() {
    let geom = compute_letterbox(1000, 333, TARGET_SIZE).unwrap();
    assert_eq!(geom.pad_y, 213.5);
    assert_eq!(geom.offset_y(), 213.0);
    assert_eq!(geom.offset_x(), 0.0);
    let top = to_original(Point::new(0.0, 213.0), &geom);
    assert_eq!(top.y, 0.0);
  }

  #[test]
  fn clip_limits_to_frame() {
    let geom = compute_letterbox(1280, 720, TARGET_SIZE).unwrap();
    let p = geom.clip(Point::new(-5.0, 900.0));
    assert_eq!(p, Point::new(0.0, 720.0));
  }
}
