// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/jsonl_record.rs - JSON Lines 检测记录输出
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

use std::{
  fs::File,
  io::{BufWriter, Write},
};

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::url_path,
  model::Detection,
  output::Render,
  pipeline::DetectionReport,
};

const STDOUT_SCHEME: &str = "stdout";

#[derive(Error, Debug)]
pub enum JsonlRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每帧一行的检测记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
  pub frame: u64,
  pub timestamp: DateTime<Utc>,
  pub width: u32,
  pub height: u32,
  pub elapsed_ms: f64,
  pub detections: Vec<Detection>,
}

/// 把检测结果写成 JSON Lines，`jsonl:///path` 写入文件，`stdout:` 写到标准输出
pub struct JsonlRecordOutput {
  writer: Box<dyn Write>,
  frame_counter: u64,
  always: bool,
}

impl FromUrlWithScheme for JsonlRecordOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlRecordOutput {
  type Error = JsonlRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let always = url.query_pairs().any(|(k, _)| k == "always");

    let writer: Box<dyn Write> = match url.scheme() {
      Self::SCHEME => {
        let path = url_path(url);
        info!("检测记录写入: {}", path);
        Box::new(BufWriter::new(File::create(path)?))
      }
      STDOUT_SCHEME => Box::new(std::io::stdout()),
      _ => return Err(JsonlRecordOutputError::SchemeMismatch),
    };

    Ok(Self::new(writer, always))
  }
}

impl JsonlRecordOutput {
  pub fn new(writer: Box<dyn Write>, always: bool) -> Self {
    Self {
      writer,
      frame_counter: 0,
      always,
    }
  }

  pub fn accepts(url: &Url) -> bool {
    url.scheme() == Self::SCHEME || url.scheme() == STDOUT_SCHEME
  }
}

impl Render<RgbImage, DetectionReport> for JsonlRecordOutput {
  type Error = JsonlRecordOutputError;

  fn render_result(
    &mut self,
    frame: &RgbImage,
    result: &DetectionReport,
  ) -> Result<(), Self::Error> {
    self.frame_counter += 1;
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let record = FrameRecord {
      frame: self.frame_counter,
      timestamp: Utc::now(),
      width: frame.width(),
      height: frame.height(),
      elapsed_ms: result.elapsed_ms(),
      detections: result.detections.clone(),
    };
    serde_json::to_writer(&mut self.writer, &record)?;
    self.writer.write_all(b"\n")?;
    self.writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;
  use std::time::Duration;

  fn report(n: usize) -> DetectionReport {
    DetectionReport {
      detections: (0..n)
        .map(|i| Detection {
          label: "person".to_string(),
          confidence: 0.9,
          bbox: BoundingBox {
            x: i as f32,
            y: 0.0,
            width: 10.0,
            height: 20.0,
          },
        })
        .collect(),
      elapsed: Duration::from_millis(12),
    }
  }

  #[test]
  fn writes_one_line_per_nonempty_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();
    {
      let mut output = JsonlRecordOutput::from_url(&url).unwrap();
      let frame = RgbImage::new(64, 48);
      output.render_result(&frame, &report(2)).unwrap();
      output.render_result(&frame, &report(0)).unwrap();
      output.render_result(&frame, &report(1)).unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let records = content
      .lines()
      .map(|l| serde_json::from_str::<FrameRecord>(l).unwrap())
      .collect::<Vec<_>>();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].frame, 1);
    assert_eq!(records[0].detections.len(), 2);
    assert_eq!(records[1].frame, 3);
    assert_eq!((records[1].width, records[1].height), (64, 48));
    assert!((records[1].elapsed_ms - 12.0).abs() < 1e-9);
  }

  #[test]
  fn always_keeps_empty_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    let url = Url::parse(&format!("jsonl://{}?always", path.display())).unwrap();
    {
      let mut output = JsonlRecordOutput::from_url(&url).unwrap();
      output
        .render_result(&RgbImage::new(4, 4), &report(0))
        .unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
  }
}
