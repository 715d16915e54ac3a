// 该文件是 Xifeng （西风） 项目的一部分。
// src/postprocess/mapping.rs - 坐标映射与类别名称补全
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

use std::collections::HashSet;

use serde::Serialize;

use crate::{labels::ClassMap, postprocess::Detection, preprocess::Geometry};

/// 原图像素空间中的最终检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalDetection {
  pub class_id: u32,
  pub class_name: String,
  pub confidence: f32,
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub width: f32,
  pub height: f32,
}

/// 将模型空间的检测框映射回原图，并补全类别名称
#[derive(Debug, Clone)]
pub struct Mapper {
  classes: ClassMap,
  allowed: HashSet<u32>,
}

impl Mapper {
  pub fn new(classes: ClassMap) -> Self {
    Self {
      classes,
      allowed: HashSet::new(),
    }
  }

  /// 类别白名单，为空表示不过滤
  pub fn allow(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
    self.allowed = ids.into_iter().collect();
    self
  }

  pub fn set_allowed(&mut self, ids: impl IntoIterator<Item = u32>) {
    self.allowed = ids.into_iter().collect();
  }

  pub fn classes(&self) -> &ClassMap {
    &self.classes
  }

  pub fn is_allowed(&self, class_id: u32) -> bool {
    self.allowed.is_empty() || self.allowed.contains(&class_id)
  }

  /// 输出保持输入的置信度顺序
  pub fn map(&self, detections: &[Detection], geometry: &Geometry) -> Vec<FinalDetection> {
    let max_x = geometry.original_width as f32;
    let max_y = geometry.original_height as f32;

    detections
      .iter()
      .filter(|d| self.is_allowed(d.class_id()))
      .map(|d| {
        // 填充位于右侧/下方，除以缩放比例即可还原
        let x1 = (d.bbox.x1 / geometry.scale).clamp(0.0, max_x);
        let y1 = (d.bbox.y1 / geometry.scale).clamp(0.0, max_y);
        let x2 = (d.bbox.x2 / geometry.scale).clamp(0.0, max_x);
        let y2 = (d.bbox.y2 / geometry.scale).clamp(0.0, max_y);

        FinalDetection {
          class_id: d.class_id(),
          class_name: self.classes.name(d.class_id()).into_owned(),
          confidence: d.confidence(),
          x1,
          y1,
          x2,
          y2,
          width: x2 - x1,
          height: y2 - y1,
        }
      })
      .collect()
  }
}
