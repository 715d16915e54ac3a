// 该文件是 Xifeng （西风） 项目的一部分。
// src/labels.rs - 类别名称映射
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

use std::{borrow::Cow, collections::HashMap, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum ClassMapError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别列表解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("类别编号重复: {0}")]
  DuplicateId(u32),
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
  id: u32,
  name: String,
}

/// 类别列表资源: `{version, num_classes, classes: [{id, name}]}`
#[derive(Debug, Deserialize)]
struct ClassList {
  #[serde(default)]
  version: Option<String>,
  #[serde(default)]
  num_classes: Option<usize>,
  classes: Vec<ClassEntry>,
}

/// 类别编号到名称的映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
  names: HashMap<u32, String>,
}

impl ClassMap {
  pub fn empty() -> Self {
    Self::default()
  }

  /// 内置的 COCO 80 类映射
  pub fn coco() -> Self {
    COCO_CLASSES
      .iter()
      .enumerate()
      .map(|(id, name)| (id as u32, name.to_string()))
      .collect()
  }

  pub fn from_json_str(text: &str) -> Result<Self, ClassMapError> {
    let list: ClassList = serde_json::from_str(text)?;
    debug!(
      "类别列表版本: {:?}, 声明类别数: {:?}, 实际条目数: {}",
      list.version,
      list.num_classes,
      list.classes.len()
    );

    if let Some(declared) = list.num_classes
      && declared != list.classes.len()
    {
      warn!(
        "类别列表声明 {} 个类别, 实际包含 {} 个",
        declared,
        list.classes.len()
      );
    }

    let mut names = HashMap::with_capacity(list.classes.len());
    for entry in list.classes {
      if names.insert(entry.id, entry.name).is_some() {
        return Err(ClassMapError::DuplicateId(entry.id));
      }
    }
    Ok(Self { names })
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ClassMapError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  /// 加载失败时退化为空映射，所有名称使用占位符
  pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref();
    match Self::from_json_file(path) {
      Ok(map) => map,
      Err(e) => {
        warn!("无法加载类别列表 {}: {}, 使用空映射", path.display(), e);
        Self::empty()
      }
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: u32) -> Option<&str> {
    self.names.get(&class_id).map(String::as_str)
  }

  /// 获取类别名称，缺失时返回占位名称，不会失败
  pub fn name(&self, class_id: u32) -> Cow<'_, str> {
    match self.get(class_id) {
      Some(name) => Cow::Borrowed(name),
      None => Cow::Owned(placeholder_name(class_id)),
    }
  }
}

impl FromIterator<(u32, String)> for ClassMap {
  fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().collect(),
    }
  }
}

pub fn placeholder_name(class_id: u32) -> String {
  format!("unknown class {}", class_id)
}
