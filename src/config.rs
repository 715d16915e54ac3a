// 该文件是 Xifeng （西风） 项目的一部分。
// src/config.rs - 检测参数配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_NUM_CLASSES: usize = 80;
pub const DEFAULT_PAD_COLOR: [u8; 3] = [114, 114, 114];
pub const DEFAULT_MAX_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("{name} 必须位于 [0, 1] 区间内, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("输入张量尺寸无效: {0}")]
  InvalidShape(String),
  #[error("类别数量必须大于 0")]
  NoClasses,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 模型输入张量形状（NCHW 中的 C、H、W）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape {
  pub channels: usize,
  pub height: u32,
  pub width: u32,
}

impl Default for TensorShape {
  fn default() -> Self {
    Self {
      channels: 3,
      height: DEFAULT_INPUT_SIZE,
      width: DEFAULT_INPUT_SIZE,
    }
  }
}

impl TensorShape {
  pub fn len(&self) -> usize {
    self.channels * self.height as usize * self.width as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 带批次维度的 NCHW 形状
  pub fn nchw(&self) -> [usize; 4] {
    [1, self.channels, self.height as usize, self.width as usize]
  }
}

/// 模型期望的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

/// 检测流水线参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  /// `None` 表示不限制
  pub max_detections: Option<usize>,
  /// 为空表示不过滤
  pub allowed_class_ids: Vec<u32>,
  pub input: TensorShape,
  pub num_classes: usize,
  pub pad_color: [u8; 3],
  pub channel_order: ChannelOrder,
  /// 软件后端最多使用的线程数
  pub max_threads: usize,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_detections: None,
      allowed_class_ids: Vec::new(),
      input: TensorShape::default(),
      num_classes: DEFAULT_NUM_CLASSES,
      pad_color: DEFAULT_PAD_COLOR,
      channel_order: ChannelOrder::default(),
      max_threads: DEFAULT_MAX_THREADS,
    }
  }
}

impl DetectorConfig {
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    let config: DetectorConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn max_detections(mut self, max: Option<usize>) -> Self {
    self.max_detections = max;
    self
  }

  pub fn allowed_class_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
    self.allowed_class_ids = ids.into_iter().collect();
    self
  }

  pub fn input(mut self, input: TensorShape) -> Self {
    self.input = input;
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, value) in [
      ("confidence_threshold", self.confidence_threshold),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange { name, value });
      }
    }

    if self.input.channels != 3 {
      return Err(ConfigError::InvalidShape(format!(
        "仅支持 3 通道输入, 实际为 {}",
        self.input.channels
      )));
    }
    if self.input.width == 0 || self.input.height == 0 {
      return Err(ConfigError::InvalidShape(format!(
        "{}x{}",
        self.input.width, self.input.height
      )));
    }
    // Letterbox 只计算一个缩放比例，输入必须为正方形
    if self.input.width != self.input.height {
      return Err(ConfigError::InvalidShape(format!(
        "输入必须为正方形, 实际为 {}x{}",
        self.input.width, self.input.height
      )));
    }
    if self.num_classes == 0 {
      return Err(ConfigError::NoClasses);
    }

    Ok(())
  }
}
