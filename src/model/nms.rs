// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use tracing::debug;

use crate::model::Candidate;

/// NMS 默认 IoU 阈值
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// 计算两个候选框的 IoU，无重叠或面积为零时返回 0
pub fn iou(a: &Candidate, b: &Candidate) -> f32 {
  let x1 = a.bbox[0].max(b.bbox[0]);
  let y1 = a.bbox[1].max(b.bbox[1]);
  let x2 = a.bbox[2].min(b.bbox[2]);
  let y2 = a.bbox[3].min(b.bbox[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别进行贪心 NMS
///
/// 结果按置信度降序排列，不同类别的框互不抑制。
pub fn suppress(candidates: &[Candidate], iou_threshold: f32) -> Vec<Candidate> {
  // 按置信度降序排序
  let mut remaining = candidates.to_vec();
  remaining.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut kept = Vec::new();

  while !remaining.is_empty() {
    let best = remaining.remove(0);

    remaining.retain(|c| {
      if c.class_index != best.class_index {
        return true;
      }
      iou(&best, c) <= iou_threshold
    });

    kept.push(best);
  }

  debug!("NMS: {} -> {} 个候选框", candidates.len(), kept.len());
  kept
}

#[cfg(test)]
mod tests {
  use super::*;

  fn candidate(bbox: [f32; 4], class_index: usize, score: f32) -> Candidate {
    Candidate {
      bbox,
      class_index,
      score,
    }
  }

  #[test]
  fn empty_input_gives_empty_output() {
    assert!(suppress(&[], DEFAULT_IOU_THRESHOLD).is_empty());
  }

  #[test]
  fn identical_boxes_collapse_to_highest_score() {
    let boxes = [
      candidate([0.0, 0.0, 10.0, 10.0], 1, 0.6),
      candidate([0.0, 0.0, 10.0, 10.0], 1, 0.9),
    ];
    for &t in &[0.0f32, 0.45, 0.99] {
      let kept = suppress(&boxes, t);
      assert_eq!(kept.len(), 1);
      assert_eq!(kept[0].score, 0.9);
    }
  }

  #[test]
  fn different_classes_never_suppress() {
    let boxes = [
      candidate([0.0, 0.0, 10.0, 10.0], 1, 0.6),
      candidate([0.0, 0.0, 10.0, 10.0], 2, 0.9),
    ];
    let kept = suppress(&boxes, DEFAULT_IOU_THRESHOLD);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].class_index, 2);
    assert_eq!(kept[1].class_index, 1);
  }

  #[test]
  fn distinct_boxes_survive() {
    let boxes = [
      candidate([0.0, 0.0, 10.0, 10.0], 0, 0.8),
      // IoU = 25 / 175
      candidate([5.0, 5.0, 15.0, 15.0], 0, 0.7),
      candidate([100.0, 100.0, 110.0, 110.0], 0, 0.5),
    ];
    assert_eq!(suppress(&boxes, DEFAULT_IOU_THRESHOLD).len(), 3);
    assert_eq!(suppress(&boxes, 0.1).len(), 2);
  }

  #[test]
  fn suppression_is_idempotent() {
    let mut boxes = Vec::new();
    for i in 0..40 {
      let offset = (i % 7) as f32 * 3.0;
      let x = (i / 7) as f32 * 20.0 + offset;
      boxes.push(candidate(
        [x, offset, x + 25.0, offset + 25.0],
        i % 3,
        1.0 - i as f32 / 50.0,
      ));
    }
    for &t in &[0.1f32, 0.3, 0.45, 0.7] {
      let once = suppress(&boxes, t);
      let twice = suppress(&once, t);
      assert_eq!(once, twice);
    }
  }

  #[test]
  fn zero_area_boxes_have_zero_iou() {
    let a = candidate([5.0, 5.0, 5.0, 5.0], 0, 0.9);
    let b = candidate([5.0, 5.0, 5.0, 5.0], 0, 0.8);
    assert_eq!(iou(&a, &b), 0.0);
    assert_eq!(suppress(&[a, b], DEFAULT_IOU_THRESHOLD).len(), 2);
  }

  #[test]
  fn iou_of_overlapping_boxes() {
    let a = candidate([0.0, 0.0, 10.0, 10.0], 0, 0.9);
    let b = candidate([5.0, 0.0, 15.0, 10.0], 0, 0.8);
    assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    let c = candidate([20.0, 20.0, 30.0, 30.0], 0, 0.8);
    assert_eq!(iou(&a, &c), 0.0);
  }
}
