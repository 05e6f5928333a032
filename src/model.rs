// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use serde::{Deserialize, Serialize};

use crate::frame::FeedTensor;

/// COCO 数据集类别名称，下标即类别编号
pub static COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 类别表中不存在的编号使用的名称
pub const UNKNOWN_LABEL: &str = "unknown";

/// 边界框坐标通道数 (cx, cy, w, h)
pub const BOX_CHANNELS: usize = 4;

pub fn label_of(class_index: usize) -> &'static str {
  COCO_CLASSES.get(class_index).copied().unwrap_or(UNKNOWN_LABEL)
}

/// 推理后端
///
/// 后端实例是独占资源，`infer` 通过 `&mut self` 调用，同一时刻只能有一次推理。
pub trait InferenceBackend {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&mut self, input: &FeedTensor) -> Result<RawOutput, Self::Error>;
}

/// 模型原始输出张量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
  pub dims: Vec<usize>,
  pub data: Vec<f32>,
}

impl RawOutput {
  pub fn new(dims: Vec<usize>, data: Vec<f32>) -> Self {
    Self { dims, data }
  }
}

/// 解码后的候选框，尚未经过 NMS
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  /// [x_min, y_min, x_max, y_max]，原始帧像素坐标
  pub bbox: [f32; 4],
  pub class_index: usize,
  pub score: f32,
}

impl Candidate {
  pub fn area(&self) -> f32 {
    (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
  }
}

/// 原始帧坐标下的边界框
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub label: String,
  pub confidence: f32,
  pub bbox: BoundingBox,
}

impl From<&Candidate> for Detection {
  fn from(candidate: &Candidate) -> Self {
    let [x_min, y_min, x_max, y_max] = candidate.bbox;
    Detection {
      label: label_of(candidate.class_index).to_string(),
      confidence: candidate.score,
      bbox: BoundingBox {
        x: x_min,
        y: y_min,
        width: x_max - x_min,
        height: y_max - y_min,
      },
    }
  }
}

mod decode;
pub mod nms;
pub mod replay;
pub mod retrieval;

pub use self::decode::{DecodeError, OutputLayout, decode, sigmoid};
pub use self::nms::{DEFAULT_IOU_THRESHOLD, iou, suppress};
pub use self::replay::{ReplayBackend, ReplayError};
pub use self::retrieval::{ModelId, ModelRequest, ModelSize, ModelStore, RetrievalError};
