// 该文件是 Xifeng （西风） 项目的一部分。
// src/model/backend.rs - 推理后端解析与回退
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

use std::{fmt, str::FromStr, time::Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  error::DetectError,
  model::{EngineError, InferenceEngine, ModelMetadata, ModelSession, ensure_initialized},
};

/// 推理执行后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// GPU 加速
  WebGpu,
  /// 可移植的软件后端，可选多线程与 SIMD
  Wasm,
  /// 标量 CPU 兜底
  Cpu,
}

/// 未指定偏好时的固定优先级
pub const PRIORITY: [Backend; 3] = [Backend::WebGpu, Backend::Wasm, Backend::Cpu];

impl Backend {
  pub fn as_str(&self) -> &'static str {
    match self {
      Backend::WebGpu => "webgpu",
      Backend::Wasm => "wasm",
      Backend::Cpu => "cpu",
    }
  }

  /// 能力摘要是否允许使用该后端，标量 CPU 总是可用
  pub fn is_usable(&self, caps: &CapabilitySummary) -> bool {
    match self {
      Backend::WebGpu => caps.gpu_accel,
      Backend::Wasm => caps.wasm_baseline,
      Backend::Cpu => true,
    }
  }
}

impl fmt::Display for Backend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的推理后端: {0}")]
pub struct BackendParseError(String);

impl FromStr for Backend {
  type Err = BackendParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "webgpu" | "gpu" => Ok(Backend::WebGpu),
      "wasm" => Ok(Backend::Wasm),
      "cpu" => Ok(Backend::Cpu),
      _ => Err(BackendParseError(s.to_string())),
    }
  }
}

/// 设备能力摘要，由外部探测后传入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySummary {
  pub gpu_accel: bool,
  pub wasm_baseline: bool,
  pub simd: bool,
  pub threads: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TensorLayout {
  #[default]
  Nchw,
  Nhwc,
}

/// 带有各自构造参数的候选后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
  WebGpu { preferred_layout: TensorLayout },
  Wasm { num_threads: usize, simd: bool },
  Cpu,
}

impl BackendConfig {
  pub fn kind(&self) -> Backend {
    match self {
      BackendConfig::WebGpu { .. } => Backend::WebGpu,
      BackendConfig::Wasm { .. } => Backend::Wasm,
      BackendConfig::Cpu => Backend::Cpu,
    }
  }

  pub fn for_backend(backend: Backend, caps: &CapabilitySummary, max_threads: usize) -> Self {
    match backend {
      Backend::WebGpu => BackendConfig::WebGpu {
        preferred_layout: TensorLayout::Nchw,
      },
      Backend::Wasm => {
        let num_threads = if caps.threads {
          std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, max_threads.max(1))
        } else {
          1
        };
        BackendConfig::Wasm {
          num_threads,
          simd: caps.simd,
        }
      }
      Backend::Cpu => BackendConfig::Cpu,
    }
  }
}

/// 构建有序的候选后端列表
///
/// 指定偏好时偏好后端排在首位，其余可用后端按固定优先级跟随；
/// 未指定时按固定优先级，并只保留能力摘要允许的后端。
pub fn candidates(
  caps: &CapabilitySummary,
  preferred: Option<Backend>,
  max_threads: usize,
) -> Vec<BackendConfig> {
  let mut order = Vec::with_capacity(PRIORITY.len());
  if let Some(preferred) = preferred {
    order.push(preferred);
  }
  order.extend(
    PRIORITY
      .iter()
      .copied()
      .filter(|b| Some(*b) != preferred && b.is_usable(caps)),
  );

  order
    .into_iter()
    .map(|b| BackendConfig::for_backend(b, caps, max_threads))
    .collect()
}

/// 依次尝试候选后端创建模型会话
///
/// 候选逐个串行尝试，第一个成功的后端即为会话使用的后端；
/// 全部失败时返回 `ModelLoadFailed`，携带最后一个底层错误。
pub fn resolve<E: InferenceEngine>(
  engine: &E,
  model: &ModelMetadata,
  caps: &CapabilitySummary,
  preferred: Option<Backend>,
  max_threads: usize,
) -> Result<ModelSession<E::Handle>, DetectError> {
  ensure_initialized(engine).map_err(|source| DetectError::ModelLoadFailed {
    attempts: 0,
    source,
  })?;

  let candidates = candidates(caps, preferred, max_threads);
  debug!(
    "模型 {} 的候选后端: {:?}",
    model.id,
    candidates.iter().map(BackendConfig::kind).collect::<Vec<_>>()
  );

  let start = Instant::now();
  let mut last_error = None;
  for (index, config) in candidates.iter().enumerate() {
    info!("尝试使用后端 {} 加载模型 {}", config.kind(), model.id);
    match engine.open(model, config) {
      Ok(handle) => {
        let session = ModelSession::new(handle, config.kind(), model);
        info!(
          "模型 {} 加载完成, 后端: {}, 耗时: {:.2?}",
          model.id,
          config.kind(),
          start.elapsed()
        );
        return Ok(session);
      }
      Err(source) => {
        let unavailable = DetectError::BackendUnavailable {
          backend: config.kind(),
          source: source.clone(),
        };
        warn!("({}/{}) {}", index + 1, candidates.len(), unavailable);
        last_error = Some(source);
      }
    }
  }

  Err(DetectError::ModelLoadFailed {
    attempts: candidates.len(),
    source: last_error.unwrap_or_else(|| EngineError::new("没有可用的候选后端")),
  })
}
