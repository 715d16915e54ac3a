// 该文件是 Xifeng （西风） 项目的一部分。
// src/postprocess/decode.rs - 模型原始输出解码
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

use serde::Serialize;
use tracing::trace;

use crate::{
  config::DetectorConfig,
  error::DetectError,
  model::{OutputTensor, check_tensor_len},
};

/// 框坐标占用的特征行数 (cx, cy, w, h)
const BOX_FEATURES: usize = 4;

/// 模型像素空间中的候选检测（中心点形式）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawDetection {
  pub class_id: u32,
  pub confidence: f32,
  pub cx: f32,
  pub cy: f32,
  pub width: f32,
  pub height: f32,
}

/// YOLO 输出解码器
///
/// 支持 `[batch, features, predictions]` 与 `[batch, extra, features, predictions]`
/// 两种输出，`features` 必须等于 `4 + num_classes`。
#[derive(Debug, Clone)]
pub struct Decoder {
  num_classes: usize,
  confidence_threshold: f32,
  image_width: f32,
  image_height: f32,
}

impl Decoder {
  pub fn new(num_classes: usize, confidence_threshold: f32, image_width: u32, image_height: u32) -> Self {
    Self {
      num_classes,
      confidence_threshold,
      image_width: image_width as f32,
      image_height: image_height as f32,
    }
  }

  pub fn from_config(config: &DetectorConfig) -> Self {
    Self::new(
      config.num_classes,
      config.confidence_threshold,
      config.input.width,
      config.input.height,
    )
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  /// 模型输入尺寸变化时更新中心点校验范围
  pub fn set_image_size(&mut self, width: u32, height: u32) {
    self.image_width = width as f32;
    self.image_height = height as f32;
  }

  pub fn decode_tensor(&self, output: &OutputTensor) -> Result<Vec<RawDetection>, DetectError> {
    self.decode(&output.data, &output.shape)
  }

  pub fn decode(&self, data: &[f32], shape: &[usize]) -> Result<Vec<RawDetection>, DetectError> {
    let (features, predictions) = match shape {
      [_, features, predictions] | [_, _, features, predictions] => (*features, *predictions),
      _ => {
        return Err(DetectError::UnsupportedOutputShape(format!(
          "输出维度必须为 3 或 4, 实际形状 {:?}",
          shape
        )));
      }
    };
    check_tensor_len(data.len(), shape)?;

    let expected = BOX_FEATURES + self.num_classes;
    if features != expected {
      return Err(DetectError::UnsupportedOutputShape(format!(
        "特征数应为 {} (4 + {} 类), 实际为 {}",
        expected, self.num_classes, features
      )));
    }

    // 只读取第一个批次（以及 extra 轴的第一个切片）
    let at = |row: usize, col: usize| data[row * predictions + col];

    let mut detections = Vec::new();
    for col in 0..predictions {
      let (cx, cy, w, h) = (at(0, col), at(1, col), at(2, col), at(3, col));

      // NaN 同样被拒绝
      if !(w > 0.0) || !(h > 0.0) {
        continue;
      }
      if !(0.0..=self.image_width).contains(&cx) || !(0.0..=self.image_height).contains(&cy) {
        continue;
      }

      let mut confidence = f32::NEG_INFINITY;
      let mut class_id = 0usize;
      for class in 0..self.num_classes {
        let score = at(BOX_FEATURES + class, col);
        if score > confidence {
          confidence = score;
          class_id = class;
        }
      }

      if confidence >= self.confidence_threshold {
        detections.push(RawDetection {
          class_id: class_id as u32,
          confidence,
          cx,
          cy,
          width: w,
          height: h,
        });
      }
    }

    trace!("解码得到 {} 个候选框 (共 {} 个预测)", detections.len(), predictions);
    Ok(detections)
  }
}
