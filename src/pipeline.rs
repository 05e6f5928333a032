// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 单帧检测流水线
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

use std::time::{Duration, Instant};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::FeedTensor,
  geometry::{FrameGeometry, GeometryError, TARGET_SIZE, compute_letterbox},
  model::{
    DEFAULT_IOU_THRESHOLD, DecodeError, Detection, InferenceBackend, RawOutput, decode, suppress,
  },
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("帧无效: {0}")]
  InvalidFrame(#[from] GeometryError),
  #[error("输出无效: {0}")]
  InvalidOutputShape(#[from] DecodeError),
  #[error("推理后端错误: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 检测参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
  /// 模型输入边长
  pub target_size: u32,
  /// 默认置信度阈值
  pub confidence_threshold: f32,
  /// NMS IoU 阈值
  pub iou_threshold: f32,
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self {
      target_size: TARGET_SIZE,
      confidence_threshold: 0.5,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
    }
  }
}

/// 一帧的检测结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
  pub detections: Vec<Detection>,
  pub elapsed: Duration,
}

impl DetectionReport {
  pub fn elapsed_ms(&self) -> f64 {
    self.elapsed.as_secs_f64() * 1000.0
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

/// 持有推理后端的检测流水线
///
/// 后端由调用方通过 `load` / `release` 显式管理，流水线之间不共享任何状态。
pub struct Pipeline<B> {
  config: DetectionConfig,
  backend: Option<B>,
}

impl<B> Default for Pipeline<B> {
  fn default() -> Self {
    Self::new(DetectionConfig::default())
  }
}

impl<B> Pipeline<B> {
  pub fn new(config: DetectionConfig) -> Self {
    Self {
      config,
      backend: None,
    }
  }

  pub fn with_backend(mut self, backend: B) -> Self {
    self.backend = Some(backend);
    self
  }

  pub fn config(&self) -> &DetectionConfig {
    &self.config
  }

  /// 装入新的后端，返回被替换的旧后端
  pub fn load(&mut self, backend: B) -> Option<B> {
    info!("装入推理后端");
    self.backend.replace(backend)
  }

  /// 释放当前后端
  pub fn release(&mut self) -> Option<B> {
    info!("释放推理后端");
    self.backend.take()
  }

  pub fn is_ready(&self) -> bool {
    self.backend.is_some()
  }

  /// 解码、NMS 并映射为带标签的检测结果
  pub fn postprocess(
    &self,
    raw: &RawOutput,
    geom: &FrameGeometry,
    confidence_threshold: f32,
  ) -> Result<Vec<Detection>, PipelineError> {
    let candidates = decode(raw, geom, confidence_threshold)?;
    let kept = suppress(&candidates, self.config.iou_threshold);
    Ok(kept.iter().map(Detection::from).collect())
  }
}

impl<B: InferenceBackend> Pipeline<B> {
  /// 对一帧执行完整检测
  ///
  /// 后端未就绪或帧尺寸为零时返回空结果，耗时为零。
  pub fn run_detection(
    &mut self,
    frame: &RgbImage,
    confidence_threshold: f32,
  ) -> Result<DetectionReport, PipelineError> {
    let (width, height) = frame.dimensions();
    let backend = match self.backend.as_mut() {
      Some(backend) if width > 0 && height > 0 => backend,
      Some(_) => {
        warn!("帧尺寸为零 ({}x{})，跳过检测", width, height);
        return Ok(DetectionReport::default());
      }
      None => {
        debug!("推理后端未就绪，跳过检测");
        return Ok(DetectionReport::default());
      }
    };

    let now = Instant::now();
    let geom = compute_letterbox(width, height, self.config.target_size)?;
    let feed = FeedTensor::from_rgb(frame, &geom);

    let raw = backend
      .infer(&feed)
      .map_err(|e| PipelineError::Backend(Box::new(e)))?;
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    let candidates = decode(&raw, &geom, confidence_threshold)?;
    let kept = suppress(&candidates, self.config.iou_threshold);
    let detections = kept.iter().map(Detection::from).collect::<Vec<_>>();

    let elapsed = now.elapsed();
    debug!("检测到 {} 个物体，总耗时: {:.2?}", detections.len(), elapsed);

    Ok(DetectionReport {
      detections,
      elapsed,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BOX_CHANNELS;
  use std::convert::Infallible;

  struct FixedBackend {
    output: RawOutput,
    calls: usize,
  }

  impl InferenceBackend for FixedBackend {
    type Error = Infallible;

    fn infer(&mut self, input: &FeedTensor) -> Result<RawOutput, Self::Error> {
      assert_eq!(input.shape(), [1, 3, 640, 640]);
      self.calls += 1;
      Ok(self.output.clone())
    }
  }

  fn one_box_output() -> RawOutput {
    let (channels, predictions) = (84, 100);
    let mut data = vec![-10.0f32; channels * predictions];
    for (c, v) in [320.0, 180.0, 100.0, 50.0].iter().enumerate() {
      data[c * predictions + 42] = *v;
    }
    data[(BOX_CHANNELS + 7) * predictions + 42] = 2.0;
    RawOutput::new(vec![1, channels, predictions], data)
  }

  #[test]
  fn zero_width_frame_is_skipped() {
    let mut pipeline = Pipeline::default().with_backend(FixedBackend {
      output: one_box_output(),
      calls: 0,
    });
    let frame = RgbImage::new(0, 720);
    let report = pipeline.run_detection(&frame, 0.5).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.elapsed, Duration::ZERO);
    assert_eq!(pipeline.release().unwrap().calls, 0);
  }

  #[test]
  fn unready_pipeline_returns_empty() {
    let mut pipeline: Pipeline<FixedBackend> = Pipeline::default();
    assert!(!pipeline.is_ready());
    let report = pipeline.run_detection(&RgbImage::new(64, 64), 0.5).unwrap();
    assert_eq!(report, DetectionReport::default());
  }

  #[test]
  fn detects_single_box() {
    let mut pipeline = Pipeline::default().with_backend(FixedBackend {
      output: one_box_output(),
      calls: 0,
    });
    let report = pipeline
      .run_detection(&RgbImage::new(1280, 720), 0.5)
      .unwrap();
    assert_eq!(report.detections.len(), 1);
    let detection = &report.detections[0];
    assert_eq!(detection.label, "truck");
    assert!((detection.bbox.x - 540.0).abs() < 1e-3);
    assert!((detection.bbox.y - 30.0).abs() < 1e-3);
    assert!((detection.bbox.width - 200.0).abs() < 1e-3);
    assert!((detection.bbox.height - 100.0).abs() < 1e-3);
  }

  #[test]
  fn load_replaces_and_release_clears() {
    let mut pipeline = Pipeline::default();
    assert!(
      pipeline
        .load(FixedBackend {
          output: one_box_output(),
          calls: 0,
        })
        .is_none()
    );
    let previous = pipeline.load(FixedBackend {
      output: one_box_output(),
      calls: 3,
    });
    assert_eq!(previous.map(|b| b.calls), Some(0));
    assert!(pipeline.is_ready());
    assert_eq!(pipeline.release().map(|b| b.calls), Some(3));
    assert!(!pipeline.is_ready());
  }

  #[test]
  fn bad_output_shape_propagates() {
    let mut pipeline = Pipeline::default().with_backend(FixedBackend {
      output: RawOutput::new(vec![1, 84, 84], vec![0.0; 84 * 84]),
      calls: 0,
    });
    assert!(matches!(
      pipeline.run_detection(&RgbImage::new(64, 64), 0.5),
      Err(PipelineError::InvalidOutputShape(_))
    ));
  }
}
