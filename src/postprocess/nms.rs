// 该文件是 Xifeng （西风） 项目的一部分。
// src/postprocess/nms.rs - 按类别的非极大值抑制
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

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::postprocess::RawDetection;

/// 轴对齐的角点形式边界框
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BBox {
  pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
    Self {
      x1: cx - width / 2.0,
      y1: cy - height / 2.0,
      x2: cx + width / 2.0,
      y2: cy + height / 2.0,
    }
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  /// 交并比，并集面积为零时返回 0
  pub fn iou(&self, other: &BBox) -> f32 {
    let x1 = self.x1.max(other.x1);
    let y1 = self.y1.max(other.y1);
    let x2 = self.x2.min(other.x2);
    let y2 = self.y2.min(other.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 带角点形式的检测结果，仍处于模型像素空间
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  #[serde(flatten)]
  pub raw: RawDetection,
  pub bbox: BBox,
}

impl Detection {
  pub fn class_id(&self) -> u32 {
    self.raw.class_id
  }

  pub fn confidence(&self) -> f32 {
    self.raw.confidence
  }
}

impl From<RawDetection> for Detection {
  fn from(raw: RawDetection) -> Self {
    Self {
      bbox: BBox::from_center(raw.cx, raw.cy, raw.width, raw.height),
      raw,
    }
  }
}

fn by_confidence_desc(a: &Detection, b: &Detection) -> std::cmp::Ordering {
  b.confidence().total_cmp(&a.confidence())
}

/// 按类别独立执行的贪心 NMS
#[derive(Debug, Clone, Copy)]
pub struct Suppressor {
  iou_threshold: f32,
}

impl Suppressor {
  pub fn new(iou_threshold: f32) -> Self {
    Self { iou_threshold }
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  /// 返回去重后按置信度降序排列的检测结果
  ///
  /// 只移除与已保留框 IoU 严格大于阈值的框，不同类别互不抑制。
  /// 置信度相同时按类别编号升序，同一类别内保持输入顺序。
  pub fn suppress(&self, candidates: Vec<RawDetection>) -> Vec<Detection> {
    if candidates.len() <= 1 {
      return candidates.into_iter().map(Detection::from).collect();
    }

    let total = candidates.len();
    let mut groups: BTreeMap<u32, Vec<Detection>> = BTreeMap::new();
    for raw in candidates {
      groups.entry(raw.class_id).or_default().push(raw.into());
    }

    let mut kept = Vec::with_capacity(total);
    for (_, mut group) in groups {
      // sort_by 为稳定排序，同置信度保持输入顺序
      group.sort_by(by_confidence_desc);

      while !group.is_empty() {
        let best = group.remove(0);
        kept.push(best);
        group.retain(|d| d.bbox.iou(&best.bbox) <= self.iou_threshold);
      }
    }

    kept.sort_by(by_confidence_desc);
    trace!("NMS: {} -> {}", total, kept.len());
    kept
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(class_id: u32, confidence: f32, cx: f32, cy: f32, size: f32) -> RawDetection {
    RawDetection {
      class_id,
      confidence,
      cx,
      cy,
      width: size,
      height: size,
    }
  }

  #[test]
  fn iou_basics() {
    let a = BBox::from_center(10.0, 10.0, 10.0, 10.0);
    let b = BBox::from_center(15.0, 10.0, 10.0, 10.0);
    let far = BBox::from_center(100.0, 100.0, 10.0, 10.0);

    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    assert_eq!(a.iou(&b), b.iou(&a));
    assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    assert_eq!(a.iou(&far), 0.0);
  }

  #[test]
  fn degenerate_boxes_have_zero_iou() {
    let point = BBox {
      x1: 5.0,
      y1: 5.0,
      x2: 5.0,
      y2: 5.0,
    };
    assert_eq!(point.iou(&point), 0.0);
  }

  #[test]
  fn fast_paths() {
    let suppressor = Suppressor::new(0.45);
    assert!(suppressor.suppress(Vec::new()).is_empty());

    let single = suppressor.suppress(vec![raw(3, 0.6, 50.0, 50.0, 20.0)]);
    assert_eq!(single.len(), 1);
    assert_eq!(
      single[0].bbox,
      BBox {
        x1: 40.0,
        y1: 40.0,
        x2: 60.0,
        y2: 60.0
      }
    );
  }

  #[test]
  fn overlapping_boxes_of_one_class_collapse() {
    let out = Suppressor::new(0.45).suppress(vec![
      raw(0, 0.7, 50.0, 50.0, 20.0),
      raw(0, 0.9, 51.0, 50.0, 20.0),
      raw(0, 0.5, 200.0, 200.0, 20.0),
    ]);
    let confidences: Vec<_> = out.iter().map(Detection::confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.5]);
  }

  #[test]
  fn classes_do_not_suppress_each_other() {
    let out = Suppressor::new(0.1).suppress(vec![
      raw(0, 0.9, 50.0, 50.0, 20.0),
      raw(1, 0.8, 50.0, 50.0, 20.0),
    ]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].class_id(), 0);
    assert_eq!(out[1].class_id(), 1);
  }

  #[test]
  fn boxes_exactly_at_threshold_survive() {
    // IoU = 50 / 150 = 1/3
    let a = raw(0, 0.9, 10.0, 10.0, 10.0);
    let b = raw(0, 0.8, 15.0, 10.0, 10.0);
    let iou = Detection::from(a).bbox.iou(&Detection::from(b).bbox);

    assert_eq!(Suppressor::new(iou).suppress(vec![a, b]).len(), 2);
    assert_eq!(Suppressor::new(iou - 1e-4).suppress(vec![a, b]).len(), 1);
  }

  #[test]
  fn equal_confidences_within_a_class_keep_input_order() {
    let out = Suppressor::new(0.5).suppress(vec![
      raw(3, 0.8, 200.0, 200.0, 4.0),
      raw(3, 0.8, 10.0, 10.0, 4.0),
      raw(3, 0.8, 100.0, 100.0, 4.0),
    ]);
    let xs: Vec<_> = out.iter().map(|d| d.raw.cx).collect();
    assert_eq!(xs, vec![200.0, 10.0, 100.0]);
  }

  #[test]
  fn equal_confidences_across_classes_follow_class_id() {
    let out = Suppressor::new(0.5).suppress(vec![
      raw(1, 0.8, 100.0, 100.0, 4.0),
      raw(0, 0.8, 10.0, 10.0, 4.0),
      raw(0, 0.8, 200.0, 200.0, 4.0),
    ]);
    let ids: Vec<_> = out.iter().map(|d| (d.class_id(), d.raw.cx)).collect();
    assert_eq!(ids, vec![(0, 10.0), (0, 200.0), (1, 100.0)]);
  }

  #[test]
  fn suppression_is_idempotent() {
    let suppressor = Suppressor::new(0.45);
    let first = suppressor.suppress(vec![
      raw(0, 0.9, 50.0, 50.0, 20.0),
      raw(0, 0.85, 55.0, 52.0, 20.0),
      raw(0, 0.6, 62.0, 50.0, 20.0),
      raw(2, 0.7, 50.0, 50.0, 20.0),
      raw(2, 0.3, 300.0, 50.0, 20.0),
    ]);
    let again = suppressor.suppress(first.iter().map(|d| d.raw).collect());
    assert_eq!(first, again);
  }

  #[test]
  fn output_is_sorted_by_confidence() {
    let out = Suppressor::new(0.45).suppress(vec![
      raw(4, 0.3, 10.0, 10.0, 5.0),
      raw(1, 0.95, 100.0, 10.0, 5.0),
      raw(7, 0.6, 200.0, 10.0, 5.0),
    ]);
    assert!(out.windows(2).all(|w| w[0].confidence() >= w[1].confidence()));
  }
}
