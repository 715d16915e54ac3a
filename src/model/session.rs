// 该文件是 Xifeng （西风） 项目的一部分。
// src/model/session.rs - 模型会话
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

use tracing::{debug, info, warn};

use crate::{
  error::DetectError,
  model::{Backend, InferenceHandle, ModelMetadata, OutputTensor, check_tensor_len},
};

const DEFAULT_INPUT_NAME: &str = "images";
const DEFAULT_OUTPUT_NAME: &str = "output0";

/// 独占持有原生推理句柄的模型会话
///
/// 释放后会话立即失效，之后的 `run` 返回 `SessionReleased`。
pub struct ModelSession<H: InferenceHandle> {
  handle: Option<H>,
  backend: Backend,
  model_id: String,
  input_name: String,
  output_name: String,
  input_shape: [usize; 4],
  output_shape: Vec<usize>,
}

impl<H: InferenceHandle> ModelSession<H> {
  pub(crate) fn new(handle: H, backend: Backend, model: &ModelMetadata) -> Self {
    let input_name = handle
      .input_names()
      .into_iter()
      .next()
      .unwrap_or_else(|| DEFAULT_INPUT_NAME.to_string());
    let output_name = handle
      .output_names()
      .into_iter()
      .next()
      .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string());
    debug!(
      "模型 {} 输入: {} {:?}, 输出: {} {:?}",
      model.id, input_name, model.input_shape, output_name, model.output_shape
    );

    Self {
      handle: Some(handle),
      backend,
      model_id: model.id.clone(),
      input_name,
      output_name,
      input_shape: model.input_shape,
      output_shape: model.output_shape.clone(),
    }
  }

  /// 实际使用的后端
  pub fn backend(&self) -> Backend {
    self.backend
  }

  pub fn model_id(&self) -> &str {
    &self.model_id
  }

  pub fn input_name(&self) -> &str {
    &self.input_name
  }

  pub fn output_name(&self) -> &str {
    &self.output_name
  }

  pub fn input_shape(&self) -> [usize; 4] {
    self.input_shape
  }

  pub fn output_shape(&self) -> &[usize] {
    &self.output_shape
  }

  pub fn is_released(&self) -> bool {
    self.handle.is_none()
  }

  /// 执行一次推理，返回声明的输出张量
  pub fn run(&mut self, tensor: &[f32]) -> Result<OutputTensor, DetectError> {
    let handle = self.handle.as_mut().ok_or(DetectError::SessionReleased)?;
    check_tensor_len(tensor.len(), &self.input_shape)?;

    let mut outputs = handle
      .run(&self.input_name, tensor, &self.input_shape)
      .map_err(DetectError::InferenceFailed)?;

    outputs
      .remove(&self.output_name)
      .ok_or_else(|| DetectError::OutputTensorMissing(self.output_name.clone()))
  }

  /// 释放原生句柄，可重复调用，失败只记录日志
  pub fn release(&mut self) {
    let Some(handle) = self.handle.take() else {
      return;
    };

    match handle.release() {
      Ok(()) => info!("模型会话 {} ({}) 已释放", self.model_id, self.backend),
      Err(e) => warn!("{}", DetectError::ReleaseFailed(e.to_string())),
    }
  }
}

impl<H: InferenceHandle> Drop for ModelSession<H> {
  fn drop(&mut self) {
    self.release();
  }
}

impl<H: InferenceHandle> std::fmt::Debug for ModelSession<H> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelSession")
      .field("model_id", &self.model_id)
      .field("backend", &self.backend)
      .field("input_name", &self.input_name)
      .field("output_name", &self.output_name)
      .field("released", &self.is_released())
      .finish()
  }
}
