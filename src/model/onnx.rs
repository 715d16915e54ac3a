// 该文件是 Xifeng （西风） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use std::fmt::Display;

use ort::{
  execution_providers::CPUExecutionProvider,
  session::{
    Session,
    builder::{GraphOptimizationLevel, SessionBuilder},
  },
  value::Tensor,
};
use tracing::{debug, info};

use crate::model::{
  BackendConfig, EngineError, InferenceEngine, InferenceHandle, ModelMetadata, OutputTensor,
  RunOutputs,
};

fn engine_err(e: impl Display) -> EngineError {
  EngineError::new(e.to_string())
}

/// 基于 ONNX Runtime 的推理引擎
#[derive(Debug, Default)]
pub struct OnnxEngine;

impl OnnxEngine {
  #[cfg(feature = "cuda")]
  fn with_gpu(builder: SessionBuilder) -> Result<SessionBuilder, EngineError> {
    use ort::execution_providers::CUDAExecutionProvider;

    builder
      .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
      .map_err(engine_err)
  }

  #[cfg(not(feature = "cuda"))]
  fn with_gpu(_builder: SessionBuilder) -> Result<SessionBuilder, EngineError> {
    Err(EngineError::new("未启用 GPU 加速支持 (需要 cuda 特性)"))
  }

  fn builder(config: &BackendConfig) -> Result<SessionBuilder, EngineError> {
    let builder = Session::builder()
      .map_err(engine_err)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(engine_err)?;

    match config {
      BackendConfig::WebGpu { preferred_layout } => {
        debug!("GPU 后端, 首选布局: {:?}", preferred_layout);
        Self::with_gpu(builder)
      }
      BackendConfig::Wasm { num_threads, simd } => {
        debug!("软件后端, 线程数: {}, SIMD: {}", num_threads, simd);
        builder
          .with_intra_threads(*num_threads)
          .map_err(engine_err)?
          .with_execution_providers([CPUExecutionProvider::default()
            .with_arena_allocator(true)
            .build()
            .error_on_failure()])
          .map_err(engine_err)
      }
      BackendConfig::Cpu => builder
        .with_intra_threads(1)
        .map_err(engine_err)?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(engine_err),
    }
  }
}

impl InferenceEngine for OnnxEngine {
  const NAME: &'static str = "onnxruntime";
  type Handle = OnnxHandle;

  fn initialize(&self) -> Result<(), EngineError> {
    let created = ort::init().with_name("xifeng").commit().map_err(engine_err)?;
    debug!("ONNX Runtime 环境已提交, 新建: {}", created);
    Ok(())
  }

  fn open(&self, model: &ModelMetadata, config: &BackendConfig) -> Result<OnnxHandle, EngineError> {
    if !model.binary.exists() {
      return Err(EngineError::new(format!(
        "模型文件不存在: {}",
        model.binary.display()
      )));
    }

    info!("加载模型文件: {}", model.binary.display());
    let session = Self::builder(config)?
      .commit_from_file(&model.binary)
      .map_err(engine_err)?;

    let inputs: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
    let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    debug!("模型输入: {:?}, 输出: {:?}", inputs, outputs);

    Ok(OnnxHandle {
      session,
      inputs,
      outputs,
    })
  }
}

pub struct OnnxHandle {
  session: Session,
  inputs: Vec<String>,
  outputs: Vec<String>,
}

impl InferenceHandle for OnnxHandle {
  fn input_names(&self) -> Vec<String> {
    self.inputs.clone()
  }

  fn output_names(&self) -> Vec<String> {
    self.outputs.clone()
  }

  fn run(
    &mut self,
    input_name: &str,
    tensor: &[f32],
    shape: &[usize],
  ) -> Result<RunOutputs, EngineError> {
    let shape: Vec<i64> = shape.iter().map(|&d| d as i64).collect();
    let input = Tensor::from_array((shape, tensor.to_vec())).map_err(engine_err)?;
    let outputs = self
      .session
      .run(ort::inputs![input_name => input])
      .map_err(engine_err)?;

    let mut result = RunOutputs::new();
    for name in &self.outputs {
      let Some(value) = outputs.get(name.as_str()) else {
        continue;
      };
      let (shape, data) = value.try_extract_tensor::<f32>().map_err(engine_err)?;
      result.insert(
        name.clone(),
        OutputTensor {
          shape: shape.iter().map(|&d| d.max(0) as usize).collect(),
          data: data.to_vec(),
        },
      );
    }
    Ok(result)
  }

  fn release(self) -> Result<(), EngineError> {
    drop(self.session);
    Ok(())
  }
}
