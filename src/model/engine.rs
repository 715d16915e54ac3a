// 该文件是 Xifeng （西风） 项目的一部分。
// src/model/engine.rs - 推理引擎抽象
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

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  error::DetectError,
  model::{BackendConfig, ModelMetadata},
};

/// 底层推理引擎返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
  message: String,
}

impl EngineError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

/// 一个输出张量（已拷贝出引擎）
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// 按输出名称索引的推理结果
pub type RunOutputs = HashMap<String, OutputTensor>;

/// 已加载模型的原生句柄
///
/// 句柄由 [`ModelSession`](crate::model::ModelSession) 独占持有，不可克隆；
/// `release` 消耗句柄本身，之后无法再被调用。
pub trait InferenceHandle {
  fn input_names(&self) -> Vec<String>;
  fn output_names(&self) -> Vec<String>;
  fn run(
    &mut self,
    input_name: &str,
    tensor: &[f32],
    shape: &[usize],
  ) -> Result<RunOutputs, EngineError>;
  fn release(self) -> Result<(), EngineError>;
}

/// 能够按后端配置创建模型句柄的推理引擎
pub trait InferenceEngine {
  /// 引擎名称，同时作为进程级初始化状态的键
  const NAME: &'static str;
  type Handle: InferenceHandle;

  /// 进程级运行环境初始化，每个进程只会被调用一次
  fn initialize(&self) -> Result<(), EngineError>;

  fn open(&self, model: &ModelMetadata, config: &BackendConfig)
  -> Result<Self::Handle, EngineError>;
}

static INIT_STATE: Mutex<Vec<(&'static str, Result<(), EngineError>)>> = Mutex::new(Vec::new());

/// 幂等的运行环境初始化
///
/// 第一次调用执行 `E::initialize` 并记录结果，之后的调用直接返回记录的结果。
/// 初始化期间持有锁，不会重入。
pub fn ensure_initialized<E: InferenceEngine>(engine: &E) -> Result<(), EngineError> {
  let mut state = INIT_STATE.lock().unwrap_or_else(PoisonError::into_inner);
  if let Some((_, outcome)) = state.iter().find(|(name, _)| *name == E::NAME) {
    debug!("推理运行时 {} 已初始化", E::NAME);
    return outcome.clone();
  }

  info!("初始化推理运行时: {}", E::NAME);
  let outcome = engine.initialize();
  if let Err(e) = &outcome {
    error!("推理运行时 {} 初始化失败: {}", E::NAME, e);
  }
  state.push((E::NAME, outcome.clone()));
  outcome
}

/// 校验扁平缓冲区长度与声明形状是否一致
pub fn check_tensor_len(actual: usize, shape: &[usize]) -> Result<(), DetectError> {
  let expected: usize = shape.iter().product();
  if actual != expected {
    return Err(DetectError::InvalidTensorShape { expected, actual });
  }
  Ok(())
}
