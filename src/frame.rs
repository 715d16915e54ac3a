// 该文件是 Xifeng （西风） 项目的一部分。
// src/frame.rs - 原始帧定义
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

use image::{ImageBuffer, Pixel, Rgb, RgbImage, Rgba};

use crate::error::DetectError;

const RGB_CHANNELS: u8 = 3;
const RGBA_CHANNELS: u8 = 4;

/// 交错排列（HWC）的像素缓冲区视图，支持 RGB 与 RGBA
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
  data: &'a [u8],
  width: u32,
  height: u32,
  channels: u8,
}

impl<'a> PixelBuffer<'a> {
  pub fn new(data: &'a [u8], width: u32, height: u32, channels: u8) -> Result<Self, DetectError> {
    if channels != RGB_CHANNELS && channels != RGBA_CHANNELS {
      return Err(DetectError::PreprocessUnavailable(format!(
        "不支持的通道数: {}",
        channels
      )));
    }
    if width == 0 || height == 0 {
      return Err(DetectError::PreprocessUnavailable(format!(
        "帧尺寸无效: {}x{}",
        width, height
      )));
    }

    let expected = width as usize * height as usize * channels as usize;
    if data.len() != expected {
      return Err(DetectError::PreprocessUnavailable(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }

    Ok(Self {
      data,
      width,
      height,
      channels,
    })
  }

  pub fn rgb(data: &'a [u8], width: u32, height: u32) -> Result<Self, DetectError> {
    Self::new(data, width, height, RGB_CHANNELS)
  }

  pub fn rgba(data: &'a [u8], width: u32, height: u32) -> Result<Self, DetectError> {
    Self::new(data, width, height, RGBA_CHANNELS)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> u8 {
    self.channels
  }

  fn view<P: Pixel<Subpixel = u8>>(&self) -> Option<ImageBuffer<P, &'a [u8]>> {
    if P::CHANNEL_COUNT != self.channels {
      return None;
    }
    ImageBuffer::from_raw(self.width, self.height, self.data)
  }

  /// 以 RGB 图像视图借用数据，通道数不符时返回 `None`
  pub fn as_rgb(&self) -> Option<ImageBuffer<Rgb<u8>, &'a [u8]>> {
    self.view()
  }

  pub fn as_rgba(&self) -> Option<ImageBuffer<Rgba<u8>, &'a [u8]>> {
    self.view()
  }
}

impl<'a> From<&'a RgbImage> for PixelBuffer<'a> {
  fn from(image: &'a RgbImage) -> Self {
    // RgbImage 保证 data.len() == w * h * 3
    Self {
      data: image.as_raw(),
      width: image.width(),
      height: image.height(),
      channels: RGB_CHANNELS,
    }
  }
}

/// 输入源产生的帧
#[derive(Debug, Clone)]
pub struct Frame {
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 帧来源（文件路径等）
  pub source: String,
}

impl Frame {
  pub fn pixels(&self) -> PixelBuffer<'_> {
    PixelBuffer::from(&self.image)
  }
}
