// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/fetch_model.rs - 获取模型文件
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use shanan_live::{FromUrl, model::ModelRequest};
use tracing::info;

/// 在模型目录中查找 YOLOv8 模型并复制到指定位置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型（yolov8:yolov8n?dir=static/models&dir=/srv/models）
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 保存路径，默认为当前目录下的 <模型标识>.onnx
  #[arg(long, value_name = "FILE")]
  pub output: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("模型: {}", args.model);

  let request = ModelRequest::from_url(&args.model)?;
  if request.store.roots().is_empty() {
    anyhow::bail!("未指定模型目录（?dir=...）");
  }
  info!("模型目录: {:?}", request.store.roots());
  let data = request.store.fetch(&request.id)?;

  let output = args
    .output
    .unwrap_or_else(|| PathBuf::from(request.id.file_name()));
  std::fs::write(&output, &data)
    .with_context(|| format!("无法写入模型文件: {}", output.display()))?;
  info!("模型 {} 已保存到 {}", request.id, output.display());

  Ok(())
}
