// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 模型输入张量
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

use crate::geometry::FrameGeometry;

const RGB_CHANNELS: usize = 3;

/// 1x3xSxS 的 NCHW 浮点输入，RGB 平面排列，数值范围 [0, 1]
#[derive(Debug, Clone)]
pub struct FeedTensor {
  size: usize,
  data: Box<[f32]>,
}

impl FeedTensor {
  /// 全黑的正方形输入
  pub fn with_size(size: usize) -> Self {
    let data = vec![0f32; RGB_CHANNELS * size * size].into_boxed_slice();
    Self { size, data }
  }

  /// 按 letterbox 几何把图像缩放后放入正方形输入，其余区域为黑色
  pub fn from_rgb(image: &RgbImage, geom: &FrameGeometry) -> Self {
    let mut tensor = Self::with_size(geom.target_size as usize);

    let resized = image::imageops::resize(
      image,
      geom.scaled_width,
      geom.scaled_height,
      image::imageops::FilterType::Triangle,
    );

    let offset_x = geom.offset_x() as usize;
    let offset_y = geom.offset_y() as usize;
    let size = tensor.size;
    let plane = size * size;
    let slice = tensor.as_mut();

    for (w, h, pixel) in resized.enumerate_pixels() {
      let index = (h as usize + offset_y) * size + (w as usize + offset_x);
      for c in 0..RGB_CHANNELS {
        slice[c * plane + index] = pixel[c] as f32 / 255.0;
      }
    }

    tensor
  }

  /// [N, C, H, W]
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  /// 读取 (c, h, w) 位置的值
  pub fn get(&self, c: usize, h: usize, w: usize) -> f32 {
    self.data[c * self.size * self.size + h * self.size + w]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}

impl AsMut<[f32]> for FeedTensor {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}
