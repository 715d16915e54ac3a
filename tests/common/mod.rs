// 该文件是 Xifeng （西风） 项目的一部分。
// tests/common/mod.rs - 集成测试使用的脚本化推理引擎
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

#![allow(dead_code)]

use std::{cell::RefCell, collections::HashSet, rc::Rc};

use image::{Rgb, RgbImage};
use xifeng::{
  DetectorConfig,
  frame::Frame,
  labels::ClassMap,
  model::{
    Backend, BackendConfig, CapabilitySummary, EngineError, InferenceEngine, InferenceHandle,
    ModelMetadata, OutputTensor, RunOutputs,
  },
  Detector,
};

pub const MODEL_SIZE: usize = 64;
pub const NUM_CLASSES: usize = 80;

/// 引擎调用记录
#[derive(Debug, Default)]
pub struct Script {
  pub attempts: Vec<Backend>,
  pub opened: Vec<(String, Backend)>,
  pub released: Vec<String>,
  pub runs: usize,
  pub last_input_len: usize,
  pub output: Option<OutputTensor>,
  pub fail_run: bool,
}

/// 按脚本成功或失败的推理引擎
#[derive(Clone, Default)]
pub struct ScriptedEngine {
  failing: HashSet<Backend>,
  script: Rc<RefCell<Script>>,
}

impl ScriptedEngine {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failing(mut self, backends: &[Backend]) -> Self {
    self.failing.extend(backends.iter().copied());
    self
  }

  pub fn script(&self) -> Rc<RefCell<Script>> {
    self.script.clone()
  }

  pub fn set_output(&self, output: OutputTensor) {
    self.script.borrow_mut().output = Some(output);
  }
}

impl InferenceEngine for ScriptedEngine {
  const NAME: &'static str = "scripted";
  type Handle = ScriptedHandle;

  fn initialize(&self) -> Result<(), EngineError> {
    Ok(())
  }

  fn open(&self, model: &ModelMetadata, config: &BackendConfig) -> Result<ScriptedHandle, EngineError> {
    let backend = config.kind();
    self.script.borrow_mut().attempts.push(backend);
    if self.failing.contains(&backend) {
      return Err(EngineError::new(format!("{} 初始化失败", backend)));
    }

    self
      .script
      .borrow_mut()
      .opened
      .push((model.id.clone(), backend));
    Ok(ScriptedHandle {
      model_id: model.id.clone(),
      script: self.script.clone(),
    })
  }
}

pub struct ScriptedHandle {
  model_id: String,
  script: Rc<RefCell<Script>>,
}

impl InferenceHandle for ScriptedHandle {
  fn input_names(&self) -> Vec<String> {
    vec!["images".into()]
  }

  fn output_names(&self) -> Vec<String> {
    vec!["output0".into()]
  }

  fn run(&mut self, _: &str, tensor: &[f32], _: &[usize]) -> Result<RunOutputs, EngineError> {
    let mut script = self.script.borrow_mut();
    script.runs += 1;
    script.last_input_len = tensor.len();
    if script.fail_run {
      return Err(EngineError::new("device lost"));
    }

    let output = script
      .output
      .clone()
      .unwrap_or_else(|| yolo_output(NUM_CLASSES, &[]));
    let mut outputs = RunOutputs::new();
    outputs.insert("output0".into(), output);
    Ok(outputs)
  }

  fn release(self) -> Result<(), EngineError> {
    self.script.borrow_mut().released.push(self.model_id);
    Ok(())
  }
}

/// 单个预测：(cx, cy, w, h, class_id, score)
pub type Anchor = (f32, f32, f32, f32, usize, f32);

/// 构造 `[1, 4 + num_classes, anchors]` 的模型输出
pub fn yolo_output(num_classes: usize, anchors: &[Anchor]) -> OutputTensor {
  let features = 4 + num_classes;
  let n = anchors.len();
  let mut data = vec![0.0; features * n];
  for (col, &(cx, cy, w, h, class_id, score)) in anchors.iter().enumerate() {
    for (row, v) in [cx, cy, w, h].into_iter().enumerate() {
      data[row * n + col] = v;
    }
    data[(4 + class_id) * n + col] = score;
  }
  OutputTensor {
    shape: vec![1, features, n],
    data,
  }
}

pub fn model(id: &str) -> ModelMetadata {
  let mut model = ModelMetadata::from_path(format!("/models/{}.onnx", id)).with_shapes(
    [1, 3, MODEL_SIZE, MODEL_SIZE],
    vec![1, 4 + NUM_CLASSES, 8400],
  );
  model.id = id.to_string();
  model
}

pub fn full_caps() -> CapabilitySummary {
  CapabilitySummary {
    gpu_accel: true,
    wasm_baseline: true,
    simd: true,
    threads: true,
  }
}

pub fn detector(engine: &ScriptedEngine) -> Detector<ScriptedEngine> {
  detector_with(engine, DetectorConfig::default())
}

pub fn detector_with(engine: &ScriptedEngine, config: DetectorConfig) -> Detector<ScriptedEngine> {
  Detector::new(engine.clone(), config, ClassMap::coco()).unwrap()
}

/// 192x108 的帧，letterbox 到 64x64 时缩放比例为 1/3
pub fn frame(index: u64) -> Frame {
  Frame {
    image: RgbImage::from_pixel(192, 108, Rgb([40, 80, 120])),
    index,
    source: format!("frame-{}", index),
  }
}
