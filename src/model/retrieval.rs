// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/retrieval.rs - 模型文件获取
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

use std::{fmt, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

const MODEL_PREFIX: &str = "yolov8";
const MODEL_EXTENSION: &str = "onnx";

#[derive(Error, Debug)]
pub enum RetrievalError {
  #[error("模型标识无效: {0}")]
  InvalidModelId(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未找到模型 {id}，已尝试: {tried:?}")]
  NotFound { id: ModelId, tried: Vec<PathBuf> },
  #[error("读取模型 {} 失败: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSize {
  Nano,
  Small,
  Medium,
  Large,
}

impl ModelSize {
  pub fn suffix(&self) -> char {
    match self {
      ModelSize::Nano => 'n',
      ModelSize::Small => 's',
      ModelSize::Medium => 'm',
      ModelSize::Large => 'l',
    }
  }
}

/// 模型标识，形如 `yolov8n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId {
  pub size: ModelSize,
}

impl Default for ModelId {
  fn default() -> Self {
    Self {
      size: ModelSize::Nano,
    }
  }
}

impl fmt::Display for ModelId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", MODEL_PREFIX, self.size.suffix())
  }
}

impl FromStr for ModelId {
  type Err = RetrievalError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || RetrievalError::InvalidModelId(s.to_string());
    let size = s.strip_prefix(MODEL_PREFIX).ok_or_else(invalid)?;
    let size = match size.to_ascii_lowercase().as_str() {
      "n" => ModelSize::Nano,
      "s" => ModelSize::Small,
      "m" => ModelSize::Medium,
      "l" => ModelSize::Large,
      _ => return Err(invalid()),
    };
    Ok(ModelId { size })
  }
}

impl ModelId {
  pub fn file_name(&self) -> String {
    format!("{}.{}", self, MODEL_EXTENSION)
  }
}

/// 按顺序在多个目录中查找模型文件
///
/// 第一个目录是首选位置，其余目录依次作为后备。
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
  roots: Vec<PathBuf>,
}

/// `yolov8:yolov8s?dir=/opt/models&dir=/srv/models`
#[derive(Debug, Clone)]
pub struct ModelRequest {
  pub id: ModelId,
  pub store: ModelStore,
}

impl FromUrlWithScheme for ModelRequest {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for ModelRequest {
  type Error = RetrievalError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RetrievalError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let id = url.path().trim_matches('/');
    let id = if id.is_empty() {
      ModelId::default()
    } else {
      id.parse()?
    };

    let store = url
      .query_pairs()
      .filter(|(k, _)| k == "dir")
      .fold(ModelStore::default(), |store, (_, v)| {
        store.with_root(v.into_owned())
      });

    Ok(ModelRequest { id, store })
  }
}

impl ModelStore {
  pub fn new<I, P>(roots: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    Self {
      roots: roots.into_iter().map(Into::into).collect(),
    }
  }

  pub fn with_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
    self.roots.push(root.into());
    self
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// 读取模型文件内容
  pub fn fetch(&self, id: &ModelId) -> Result<Vec<u8>, RetrievalError> {
    let mut tried = Vec::with_capacity(self.roots.len());

    for root in &self.roots {
      let path = root.join(id.file_name());
      debug!("尝试读取模型: {}", path.display());
      match std::fs::read(&path) {
        Ok(data) => {
          info!(
            "加载模型文件: {} ({:.2} MB)",
            path.display(),
            data.len() as f64 / (1024.0 * 1024.0)
          );
          return Ok(data);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
          warn!("模型文件不存在: {}", path.display());
          tried.push(path);
        }
        Err(source) => return Err(RetrievalError::Io { path, source }),
      }
    }

    Err(RetrievalError::NotFound { id: *id, tried })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_valid_ids() {
    assert_eq!(
      "yolov8n".parse::<ModelId>().unwrap().size,
      ModelSize::Nano
    );
    assert_eq!(
      "yolov8L".parse::<ModelId>().unwrap().size,
      ModelSize::Large
    );
    assert_eq!("yolov8m".parse::<ModelId>().unwrap().to_string(), "yolov8m");
    assert_eq!(
      "yolov8s".parse::<ModelId>().unwrap().file_name(),
      "yolov8s.onnx"
    );
  }

  #[test]
  fn rejects_invalid_ids() {
    for s in ["yolov8", "yolov8x", "yolov5n", "", "yolov8nn", "../yolov8n"] {
      assert!(
        matches!(s.parse::<ModelId>(), Err(RetrievalError::InvalidModelId(_))),
        "{}",
        s
      );
    }
  }

  #[test]
  fn falls_back_to_later_roots() {
    let primary = tempfile::tempdir().unwrap();
    let fallback = tempfile::tempdir().unwrap();
    std::fs::write(fallback.path().join("yolov8s.onnx"), b"model-bytes").unwrap();

    let store = ModelStore::new([primary.path(), fallback.path()]);
    let id: ModelId = "yolov8s".parse().unwrap();
    assert_eq!(store.fetch(&id).unwrap(), b"model-bytes");
  }

  #[test]
  fn reports_every_location_tried() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let store = ModelStore::new([a.path(), b.path()]);
    match store.fetch(&ModelId::default()) {
      Err(RetrievalError::NotFound { id, tried }) => {
        assert_eq!(id, ModelId::default());
        assert_eq!(tried.len(), 2);
        assert_eq!(tried[0], a.path().join("yolov8n.onnx"));
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn request_from_url() {
    let url = Url::parse("yolov8:yolov8m?dir=/opt/models&dir=/srv/models").unwrap();
    let request = ModelRequest::from_url(&url).unwrap();
    assert_eq!(request.id.size, ModelSize::Medium);
    assert_eq!(
      request.store.roots(),
      &[PathBuf::from("/opt/models"), PathBuf::from("/srv/models")]
    );

    let url = Url::parse("yolov8:?dir=/opt/models").unwrap();
    assert_eq!(ModelRequest::from_url(&url).unwrap().id, ModelId::default());
  }
}
