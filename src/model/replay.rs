// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/replay.rs - 回放推理后端
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

//! 把事先录制的原始输出张量（JSON）当作推理结果返回。
//!
//! 文件格式为 `{"dims": [1, 84, 8400], "data": [...]}`。
//! 路径是单个文件时每帧都返回同一个输出；
//! 路径是目录时按文件名顺序每帧消耗一个 `.json` 文件。

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::FeedTensor,
  input::url_path,
  model::{InferenceBackend, RawOutput},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("目录中没有可回放的输出: {}", .0.display())]
  Empty(PathBuf),
  #[error("回放输出已耗尽")]
  Exhausted,
}

enum ReplaySource {
  Repeat(RawOutput),
  Sequence(VecDeque<PathBuf>),
}

pub struct ReplayBackend {
  source: ReplaySource,
}

impl FromUrlWithScheme for ReplayBackend {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayBackend {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::open(url_path(url))
  }
}

impl ReplayBackend {
  /// 每次推理都返回同一个输出
  pub fn repeat(output: RawOutput) -> Self {
    Self {
      source: ReplaySource::Repeat(output),
    }
  }

  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    if path.is_dir() {
      let mut files = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")))
        .collect::<Vec<_>>();
      files.sort();
      if files.is_empty() {
        return Err(ReplayError::Empty(path.to_path_buf()));
      }
      info!("回放目录 {}，共 {} 个输出", path.display(), files.len());
      Ok(Self {
        source: ReplaySource::Sequence(files.into()),
      })
    } else {
      info!("回放文件 {}", path.display());
      Ok(Self::repeat(read_raw_output(path)?))
    }
  }
}

pub fn read_raw_output<P: AsRef<Path>>(path: P) -> Result<RawOutput, ReplayError> {
  let content = std::fs::read_to_string(path.as_ref())?;
  let output: RawOutput = serde_json::from_str(&content)?;
  debug!(
    "读取原始输出 {}: 形状 {:?}",
    path.as_ref().display(),
    output.dims
  );
  Ok(output)
}

pub fn write_raw_output<P: AsRef<Path>>(path: P, output: &RawOutput) -> Result<(), ReplayError> {
  std::fs::write(path, serde_json::to_vec(output)?)?;
  Ok(())
}

impl InferenceBackend for ReplayBackend {
  type Error = ReplayError;

  fn infer(&mut self, input: &FeedTensor) -> Result<RawOutput, Self::Error> {
    debug!("回放推理，输入形状 {:?}", input.shape());
    match &mut self.source {
      ReplaySource::Repeat(output) => Ok(output.clone()),
      ReplaySource::Sequence(files) => {
        let path = files.pop_front().ok_or(ReplayError::Exhausted)?;
        read_raw_output(path)
      }
    }
  }
}
