// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续帧检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_live::{
  FromUrl,
  input::InputWrapper,
  model::ReplayBackend,
  output::OutputWrapper,
  pipeline::{DetectionConfig, Pipeline},
  task::{ContinuousTask, Task},
};
use tracing::info;

/// Shanan 连续帧检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理后端（replay:///path/to/outputs/）
  #[arg(long, value_name = "BACKEND")]
  pub backend: Url,
  /// 输入来源（folder:///path）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径（jsonl:///path 或 stdout:）
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,
  /// 最大处理帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("推理后端: {}", args.backend);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let backend = ReplayBackend::from_url(&args.backend)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let config = DetectionConfig {
    confidence_threshold: args.confidence,
    iou_threshold: args.nms_threshold,
    ..DetectionConfig::default()
  };
  let mut pipeline = Pipeline::new(config).with_backend(backend);

  ContinuousTask::new()
    .with_frame_number(args.frame_number)
    .run_task(input, &mut pipeline, output)?;

  Ok(())
}
