// 该文件是 Xifeng （西风） 项目的一部分。
// src/preprocess.rs - 图像预处理（Letterbox）
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

use image::{
  Rgb, RgbImage,
  buffer::ConvertBuffer,
  imageops::{self, FilterType},
};
use tracing::debug;

use crate::{
  config::{ChannelOrder, DetectorConfig, TensorShape},
  error::DetectError,
  frame::PixelBuffer,
};

/// 预处理几何信息，用于将模型坐标映射回原图
///
/// `pad_x`/`pad_y` 为缩放前在右侧/下方填充的像素数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
  pub scale: f32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub original_width: u32,
  pub original_height: u32,
}

impl Geometry {
  /// 计算 Letterbox 几何信息，原图尺寸必须非零
  pub fn letterbox(original_width: u32, original_height: u32, target_width: u32) -> Self {
    let max_side = original_width.max(original_height);
    Self {
      scale: target_width as f32 / max_side as f32,
      pad_x: max_side - original_width,
      pad_y: max_side - original_height,
      original_width,
      original_height,
    }
  }
}

/// 单帧预处理结果
#[derive(Debug, Clone)]
pub struct PreprocessResult {
  /// CHW 排列、归一化到 [0, 1] 的张量
  pub tensor: Vec<f32>,
  pub shape: TensorShape,
  pub geometry: Geometry,
}

/// Letterbox 预处理器
///
/// 先在右侧/下方以固定颜色填充成正方形，再缩放到模型输入尺寸，
/// 这样映射回原图时只需除以缩放比例。
#[derive(Debug, Clone)]
pub struct Preprocessor {
  target: TensorShape,
  pad_color: [u8; 3],
  channel_order: ChannelOrder,
  filter: FilterType,
}

impl Preprocessor {
  pub fn new(target: TensorShape) -> Self {
    Self {
      target,
      pad_color: crate::config::DEFAULT_PAD_COLOR,
      channel_order: ChannelOrder::Rgb,
      filter: FilterType::Triangle,
    }
  }

  pub fn from_config(config: &DetectorConfig) -> Self {
    Self::new(config.input)
      .pad_color(config.pad_color)
      .channel_order(config.channel_order)
  }

  pub fn pad_color(mut self, color: [u8; 3]) -> Self {
    self.pad_color = color;
    self
  }

  pub fn channel_order(mut self, order: ChannelOrder) -> Self {
    self.channel_order = order;
    self
  }

  pub fn filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }

  pub fn target(&self) -> TensorShape {
    self.target
  }

  pub fn process(&self, frame: &PixelBuffer<'_>) -> Result<PreprocessResult, DetectError> {
    if self.target.channels != 3
      || self.target.width == 0
      || self.target.width != self.target.height
    {
      return Err(DetectError::PreprocessUnavailable(format!(
        "目标张量形状无效: {:?}",
        self.target
      )));
    }

    let (width, height) = (frame.width(), frame.height());
    if width == 0 || height == 0 {
      return Err(DetectError::PreprocessUnavailable(format!(
        "帧尺寸无效: {}x{}",
        width, height
      )));
    }
    let geometry = Geometry::letterbox(width, height, self.target.width);
    let max_side = width.max(height);

    let mut square = RgbImage::from_pixel(max_side, max_side, Rgb(self.pad_color));
    // 原图贴在左上角，填充落在右侧/下方
    if let Some(rgb) = frame.as_rgb() {
      imageops::replace(&mut square, &rgb, 0, 0);
    } else if let Some(rgba) = frame.as_rgba() {
      let rgb: RgbImage = rgba.convert();
      imageops::replace(&mut square, &rgb, 0, 0);
    } else {
      return Err(DetectError::PreprocessUnavailable(format!(
        "不支持的通道数: {}",
        frame.channels()
      )));
    }

    let resized = if max_side == self.target.width {
      square
    } else {
      imageops::resize(&square, self.target.width, self.target.height, self.filter)
    };

    let plane = self.target.width as usize * self.target.height as usize;
    let order = match self.channel_order {
      ChannelOrder::Rgb => [0, 1, 2],
      ChannelOrder::Bgr => [2, 1, 0],
    };
    let mut tensor = vec![0.0f32; self.target.len()];
    for (i, px) in resized.pixels().enumerate() {
      for (c, &src) in order.iter().enumerate() {
        tensor[c * plane + i] = px[src] as f32 / 255.0;
      }
    }

    debug!(
      "预处理完成: {}x{} -> {}x{}, 缩放 {:.4}, 填充 ({}, {})",
      width,
      height,
      self.target.width,
      self.target.height,
      geometry.scale,
      geometry.pad_x,
      geometry.pad_y
    );

    Ok(PreprocessResult {
      tensor,
      shape: self.target,
      geometry,
    })
  }
}
