// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{thread, time::Duration};

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  model::InferenceBackend,
  output::Render,
  pipeline::{DetectionReport, Pipeline},
};

pub trait Task<I, B, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: &mut Pipeline<B>, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
///
/// 置信度阈值取自流水线的 `DetectionConfig`。
#[derive(Debug, Clone, Copy, Default)]
pub struct OneShotTask;

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  B: InferenceBackend,
  O: Render<RgbImage, DetectionReport, Error = RE>,
> Task<I, B, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: &mut Pipeline<B>,
    mut output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let confidence_threshold = pipeline.config().confidence_threshold;
    info!("输入帧获取成功，开始检测，置信度阈值 {}", confidence_threshold);
    let report = pipeline.run_detection(&frame, confidence_threshold)?;
    info!(
      "检测完成，{} 个物体，耗时: {:.2?}",
      report.detections.len(),
      report.elapsed
    );
    output.render_result(&frame, &report)?;

    Ok(())
  }
}

/// 逐帧处理直到输入耗尽、达到帧数上限或收到中断信号
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  B: InferenceBackend,
  O: Render<RgbImage, DetectionReport, Error = RE>,
> Task<I, B, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &mut Pipeline<B>, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    // 同一进程只能注册一次处理函数
    if let Err(e) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("无法注册中断处理函数: {}", e);
    }

    let confidence_threshold = pipeline.config().confidence_threshold;
    let mut frame_index = 0;
    let mut total_detections = 0usize;
    let mut times = Vec::new();
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let report = pipeline.run_detection(&frame, confidence_threshold)?;
      total_detections += report.detections.len();
      times.push(report.elapsed);
      output.render_result(&frame, &report)?;
      info!(
        "检测完成，{} 个物体，耗时: {:.2?}",
        report.detections.len(),
        report.elapsed
      );
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    if !times.is_empty() {
      warn!(
        "平均检测时间: {:.2?}，总检测数: {}",
        times.iter().sum::<Duration>() / times.len() as u32,
        total_detections
      );
    }

    info!("任务完成，退出");
    Ok(())
  }
}
