// 该文件是 Xifeng （西风） 项目的一部分。
// src/model.rs - 模型与推理后端
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

mod backend;
mod catalog;
mod engine;
mod session;

#[cfg(feature = "onnx")]
mod onnx;

pub use self::backend::{
  Backend, BackendConfig, BackendParseError, CapabilitySummary, PRIORITY, TensorLayout,
  candidates, resolve,
};
pub use self::catalog::{CatalogError, ModelCatalog, ModelMetadata, OnnxExportConfig};
pub use self::engine::{
  EngineError, InferenceEngine, InferenceHandle, OutputTensor, RunOutputs, check_tensor_len,
  ensure_initialized,
};
pub use self::session::ModelSession;

#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxEngine, OnnxHandle};
