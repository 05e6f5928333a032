// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/folder_input.rs - 目录帧序列输入
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

use std::{collections::VecDeque, path::PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::url_path};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐帧读取目录中的图片
///
/// 无法解码的文件会被跳过。
pub struct FolderInput {
  files: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FolderInputError::SchemeMismatch);
    }

    let directory = PathBuf::from(url_path(url));
    let mut files = std::fs::read_dir(&directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|p| {
        p.extension()
          .and_then(|ext| ext.to_str())
          .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
      })
      .collect::<Vec<_>>();
    files.sort();

    info!("目录 {} 中共 {} 帧", directory.display(), files.len());

    Ok(FolderInput {
      files: files.into(),
    })
  }
}

impl FolderInput {
  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for FolderInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      match ImageReader::open(&path).and_then(|r| r.with_guessed_format()) {
        Ok(reader) => match reader.decode() {
          Ok(image) => return Some(image.to_rgb8()),
          Err(e) => warn!("无法解码图片 {}: {}", path.display(), e),
        },
        Err(e) => warn!("无法打开图片 {}: {}", path.display(), e),
      }
    }
    None
  }
}
