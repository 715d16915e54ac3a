// 该文件是 Xifeng （西风） 项目的一部分。
// src/model/catalog.rs - 模型元数据目录
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

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

const CANONICAL_INPUT_SHAPE: [usize; 4] = [1, 3, 640, 640];
const CANONICAL_OUTPUT_SHAPE: [usize; 3] = [1, 84, 8400];

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("模型目录解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("模型目录中不存在模型: {0}")]
  UnknownModel(String),
  #[error("模型 {0} 的输出形状无效: {1:?}")]
  InvalidOutputShape(String, Vec<usize>),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

/// 导出时使用的 ONNX 配置
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxExportConfig {
  pub opset: u32,
  pub dynamic: bool,
  pub simplify: bool,
  /// 模型是否内置 NMS
  pub nms: bool,
  pub half: bool,
}

/// 单个模型的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
  pub id: String,
  #[serde(default)]
  pub name: String,
  /// 模型文件引用，以 `/` 开头时相对于目录根
  #[serde(rename = "file")]
  pub binary: PathBuf,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub size_mb: f64,
  pub input_shape: [usize; 4],
  pub output_shape: Vec<usize>,
  #[serde(default)]
  pub parameters: String,
  #[serde(default)]
  pub recommended_use: String,
}

impl ModelMetadata {
  /// 直接由模型文件构造，形状取标准 YOLO 640 配置
  pub fn from_path(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref();
    let id = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "model".to_string());

    Self {
      name: id.clone(),
      id,
      binary: path.to_path_buf(),
      description: String::new(),
      size_mb: 0.0,
      input_shape: CANONICAL_INPUT_SHAPE,
      output_shape: CANONICAL_OUTPUT_SHAPE.to_vec(),
      parameters: String::new(),
      recommended_use: String::new(),
    }
  }

  pub fn with_shapes(mut self, input_shape: [usize; 4], output_shape: Vec<usize>) -> Self {
    self.input_shape = input_shape;
    self.output_shape = output_shape;
    self
  }

  /// 输出声明的特征数（4 + 类别数）
  pub fn declared_features(&self) -> Option<usize> {
    match self.output_shape.len() {
      3 => Some(self.output_shape[1]),
      4 => Some(self.output_shape[2]),
      _ => None,
    }
  }

  fn validate(&self) -> Result<(), CatalogError> {
    if self.declared_features().is_none() {
      return Err(CatalogError::InvalidOutputShape(
        self.id.clone(),
        self.output_shape.clone(),
      ));
    }
    Ok(())
  }

  fn rebase(&mut self, root: &Path) {
    if let Ok(stripped) = self.binary.strip_prefix("/") {
      self.binary = root.join(stripped);
    } else if self.binary.is_relative() {
      self.binary = root.join(&self.binary);
    }
  }
}

/// `models.json` 模型目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub exported_at: Option<String>,
  #[serde(default)]
  pub onnx_config: OnnxExportConfig,
  pub models: Vec<ModelMetadata>,
}

impl ModelCatalog {
  pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
    let catalog: ModelCatalog = serde_json::from_str(text)?;
    for model in &catalog.models {
      model.validate()?;
    }
    if catalog.onnx_config.nms {
      warn!("模型目录声明模型内置 NMS, 流水线仍会执行自身的 NMS");
    }
    debug!(
      "模型目录版本 {}, 共 {} 个模型",
      catalog.version,
      catalog.models.len()
    );
    Ok(catalog)
  }

  /// 读取目录文件，模型文件引用相对于 `root` 解析
  pub fn from_json_file(path: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载模型目录: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let mut catalog = Self::from_json_str(&text)?;
    catalog.rebase(root.as_ref());
    Ok(catalog)
  }

  pub fn rebase(&mut self, root: &Path) {
    for model in &mut self.models {
      model.rebase(root);
    }
  }

  pub fn get(&self, id: &str) -> Result<&ModelMetadata, CatalogError> {
    self
      .models
      .iter()
      .find(|m| m.id == id)
      .ok_or_else(|| CatalogError::UnknownModel(id.to_string()))
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.models.iter().map(|m| m.id.as_str())
  }
}

const CATALOG_SCHEME: &str = "catalog";
const ONNX_SCHEME: &str = "onnx";

impl FromUrlWithScheme for ModelMetadata {
  const SCHEME: &'static str = ONNX_SCHEME;
}

/// 支持两种模型地址:
/// - `onnx:///path/model.onnx`
/// - `catalog:///path/models.json?id=yolo11n&root=/path/public`
///   （`root` 缺省为目录文件所在目录）
impl FromUrl for ModelMetadata {
  type Error = CatalogError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ONNX_SCHEME => Ok(ModelMetadata::from_path(url.path())),
      CATALOG_SCHEME => {
        let path = Path::new(url.path());
        let mut id = None;
        let mut root = None;
        for (k, v) in url.query_pairs() {
          match k.as_ref() {
            "id" => id = Some(v.into_owned()),
            "root" => root = Some(PathBuf::from(v.as_ref())),
            _ => {}
          }
        }

        let id = id.ok_or_else(|| CatalogError::ModelPathError("模型目录地址缺少 id 参数".into()))?;
        let root = root
          .or_else(|| path.parent().map(Path::to_path_buf))
          .unwrap_or_default();
        let catalog = ModelCatalog::from_json_file(path, root)?;
        catalog.get(&id).cloned()
      }
      other => Err(CatalogError::ModelPathError(format!(
        "模型路径必须使用 {} 或 {} 方案, 实际为 {}",
        ONNX_SCHEME, CATALOG_SCHEME, other
      ))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MODELS_JSON: &str = r#"{
    "version": "1.0.0",
    "exported_at": "2025-01-01T00:00:00+00:00",
    "onnx_config": {"opset": 12, "dynamic": false, "simplify": true, "nms": false, "half": false},
    "models": [
      {
        "id": "yolo11n",
        "name": "YOLOv11 Nano",
        "file": "/models/yolo11n.onnx",
        "description": "Fastest model. Ideal for real-time applications.",
        "size_mb": 10.2,
        "input_shape": [1, 3, 640, 640],
        "output_shape": [1, 84, 8400],
        "parameters": "2.6M",
        "recommended_use": "Real-time detection"
      },
      {
        "id": "yolo11s",
        "name": "YOLOv11 Small",
        "file": "/models/yolo11s.onnx",
        "description": "Balanced speed and accuracy.",
        "size_mb": 36.2,
        "input_shape": [1, 3, 640, 640],
        "output_shape": [1, 1, 84, 8400],
        "parameters": "9.4M",
        "recommended_use": "General purpose"
      }
    ]
  }"#;

  #[test]
  fn parses_exported_catalog() {
    let catalog = ModelCatalog::from_json_str(MODELS_JSON).unwrap();
    assert_eq!(catalog.onnx_config.opset, 12);
    assert!(!catalog.onnx_config.nms);
    assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["yolo11n", "yolo11s"]);

    let nano = catalog.get("yolo11n").unwrap();
    assert_eq!(nano.input_shape, [1, 3, 640, 640]);
    assert_eq!(nano.declared_features(), Some(84));
    assert_eq!(catalog.get("yolo11s").unwrap().declared_features(), Some(84));
  }

  #[test]
  fn unknown_model_id() {
    let catalog = ModelCatalog::from_json_str(MODELS_JSON).unwrap();
    assert!(matches!(
      catalog.get("yolo11x"),
      Err(CatalogError::UnknownModel(id)) if id == "yolo11x"
    ));
  }

  #[test]
  fn rejects_bad_output_rank() {
    let text = MODELS_JSON.replace("[1, 84, 8400]", "[84, 8400]");
    assert!(matches!(
      ModelCatalog::from_json_str(&text),
      Err(CatalogError::InvalidOutputShape(..))
    ));
  }

  #[test]
  fn binary_references_are_rebased() {
    let mut catalog = ModelCatalog::from_json_str(MODELS_JSON).unwrap();
    catalog.rebase(Path::new("/srv/public"));
    assert_eq!(
      catalog.get("yolo11n").unwrap().binary,
      PathBuf::from("/srv/public/models/yolo11n.onnx")
    );
  }

  #[test]
  fn model_from_onnx_url() {
    let url = Url::parse("onnx:///opt/models/yolo11m.onnx").unwrap();
    let model = ModelMetadata::from_url(&url).unwrap();
    assert_eq!(model.id, "yolo11m");
    assert_eq!(model.binary, PathBuf::from("/opt/models/yolo11m.onnx"));
    assert_eq!(model.output_shape, vec![1, 84, 8400]);
  }

  #[test]
  fn model_from_catalog_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.json");
    std::fs::write(&path, MODELS_JSON).unwrap();

    let url = Url::parse(&format!("catalog://{}?id=yolo11s", path.display())).unwrap();
    let model = ModelMetadata::from_url(&url).unwrap();
    assert_eq!(model.name, "YOLOv11 Small");
    assert_eq!(model.binary, dir.path().join("models/yolo11s.onnx"));
  }

  #[test]
  fn rejects_unknown_scheme() {
    let url = Url::parse("rknn:///model.rknn").unwrap();
    assert!(matches!(
      ModelMetadata::from_url(&url),
      Err(CatalogError::ModelPathError(_))
    ));
  }
}
