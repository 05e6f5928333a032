// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, pipeline::DetectionReport};

pub trait Render<Frame, Output> {
  type Error;
  fn render_result(&mut self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "jsonl_record")]
mod jsonl_record;
#[cfg(feature = "jsonl_record")]
pub use self::jsonl_record::{FrameRecord, JsonlRecordOutput, JsonlRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "jsonl_record")]
  #[error("记录输出错误: {0}")]
  JsonlRecordOutputError(#[from] JsonlRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "jsonl_record")]
  JsonlRecordOutput(JsonlRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "jsonl_record")]
    {
      if JsonlRecordOutput::accepts(url) {
        let output = JsonlRecordOutput::from_url(url)?;
        return Ok(OutputWrapper::JsonlRecordOutput(output));
      }
    }
    Err(OutputError::SchemeMismatch)
  }
}

impl Render<RgbImage, DetectionReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(
    &mut self,
    frame: &RgbImage,
    result: &DetectionReport,
  ) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "jsonl_record")]
      OutputWrapper::JsonlRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
