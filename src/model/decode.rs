// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/decode.rs - YOLOv8 输出解码
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
use tracing::{debug, error};

use crate::{
  geometry::{FrameGeometry, Point, to_original},
  model::{BOX_CHANNELS, Candidate, RawOutput},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("输出形状无效: {dims:?}, 数据长度 {len}, 原因: {reason}")]
  InvalidOutputShape {
    dims: Vec<usize>,
    len: usize,
    reason: &'static str,
  },
}

impl DecodeError {
  fn shape(raw: &RawOutput, reason: &'static str) -> Self {
    DecodeError::InvalidOutputShape {
      dims: raw.dims.clone(),
      len: raw.data.len(),
      reason,
    }
  }
}

/// 输出张量的内存布局，每次解码只判断一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
  /// (1, channels, predictions)，通道维变化最慢
  ChannelMajor { channels: usize, predictions: usize },
  /// (1, predictions, channels)，预测维变化最慢
  PredictionMajor { channels: usize, predictions: usize },
}

impl OutputLayout {
  /// 根据输出形状判断布局，较小的维度是通道维
  pub fn from_raw(raw: &RawOutput) -> Result<Self, DecodeError> {
    let (d1, d2) = match raw.dims.as_slice() {
      [1, d1, d2] => (*d1, *d2),
      [_, _, _] => return Err(DecodeError::shape(raw, "batch 维必须为 1")),
      _ => return Err(DecodeError::shape(raw, "输出必须是三维张量")),
    };

    if d1 == d2 {
      return Err(DecodeError::shape(raw, "无法区分通道维与预测维"));
    }

    let channels = d1.min(d2);
    let predictions = d1.max(d2);
    if channels <= BOX_CHANNELS {
      return Err(DecodeError::shape(raw, "通道数不足以包含边界框和类别"));
    }
    if raw.data.len() != channels * predictions {
      return Err(DecodeError::shape(raw, "数据长度与形状不符"));
    }

    Ok(if d1 == channels {
      OutputLayout::ChannelMajor {
        channels,
        predictions,
      }
    } else {
      OutputLayout::PredictionMajor {
        channels,
        predictions,
      }
    })
  }

  pub fn channels(&self) -> usize {
    match *self {
      OutputLayout::ChannelMajor { channels, .. } | OutputLayout::PredictionMajor { channels, .. } => {
        channels
      }
    }
  }

  pub fn predictions(&self) -> usize {
    match *self {
      OutputLayout::ChannelMajor { predictions, .. }
      | OutputLayout::PredictionMajor { predictions, .. } => predictions,
    }
  }

  pub fn num_classes(&self) -> usize {
    self.channels() - BOX_CHANNELS
  }

  /// 第 `prediction` 个预测的第 `channel` 个通道在缓冲区中的下标
  #[inline]
  pub fn index(&self, prediction: usize, channel: usize) -> usize {
    match *self {
      OutputLayout::ChannelMajor { predictions, .. } => channel * predictions + prediction,
      OutputLayout::PredictionMajor { channels, .. } => prediction * channels + channel,
    }
  }
}

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 解码原始输出，返回原始帧坐标下、置信度不低于阈值的候选框
pub fn decode(
  raw: &RawOutput,
  geom: &FrameGeometry,
  confidence_threshold: f32,
) -> Result<Vec<Candidate>, DecodeError> {
  let layout = OutputLayout::from_raw(raw).inspect_err(|e| error!("{}", e))?;
  debug!("输出布局: {:?}", layout);

  let data = raw.data.as_slice();
  let mut candidates = Vec::new();

  for i in 0..layout.predictions() {
    let (score, class_index) = {
      let mut max_score = 0.0f32;
      let mut max_index = 0usize;
      for c in 0..layout.num_classes() {
        let s = sigmoid(data[layout.index(i, BOX_CHANNELS + c)]);
        if s > max_score {
          max_score = s;
          max_index = c;
        }
      }
      (max_score, max_index)
    };

    if score < confidence_threshold {
      continue;
    }

    let cx = data[layout.index(i, 0)];
    let cy = data[layout.index(i, 1)];
    let w = data[layout.index(i, 2)];
    let h = data[layout.index(i, 3)];

    let top_left = geom.clip(to_original(
      Point::new(cx - w / 2.0, cy - h / 2.0),
      geom,
    ));
    let bottom_right = geom.clip(to_original(
      Point::new(cx + w / 2.0, cy + h / 2.0),
      geom,
    ));

    candidates.push(Candidate {
      bbox: [top_left.x, top_left.y, bottom_right.x, bottom_right.y],
      class_index,
      score,
    });
  }

  debug!(
    "置信度阈值 {} 过滤后剩余 {} / {} 个候选框",
    confidence_threshold,
    candidates.len(),
    layout.predictions()
  );

  Ok(candidates)
}
