// 该文件是 Xifeng （西风） 项目的一部分。
// src/detector.rs - 单帧检测流水线
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

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  config::{ConfigError, DetectorConfig, TensorShape},
  error::DetectError,
  frame::PixelBuffer,
  labels::ClassMap,
  model::{
    Backend, CapabilitySummary, EngineError, InferenceEngine, ModelMetadata, ModelSession, resolve,
  },
  postprocess::{Decoder, FinalDetection, Mapper, Suppressor},
  preprocess::Preprocessor,
};

/// 单帧各阶段耗时（毫秒）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrameTiming {
  pub preprocess_ms: f64,
  pub inference_ms: f64,
  pub postprocess_ms: f64,
}

impl FrameTiming {
  pub fn total_ms(&self) -> f64 {
    self.preprocess_ms + self.inference_ms + self.postprocess_ms
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detections {
  pub detections: Vec<FinalDetection>,
  pub timing: FrameTiming,
}

fn elapsed_ms(start: Instant) -> f64 {
  start.elapsed().as_secs_f64() * 1000.0
}

/// 目标检测器
///
/// 串联预处理、推理、解码、NMS 与坐标映射。同一时刻最多持有一个模型会话，
/// `detect` 需要 `&mut self`，同一会话上不会有并发的推理调用。
pub struct Detector<E: InferenceEngine> {
  engine: E,
  config: DetectorConfig,
  preprocessor: Preprocessor,
  decoder: Decoder,
  suppressor: Suppressor,
  mapper: Mapper,
  session: Option<ModelSession<E::Handle>>,
}

impl<E: InferenceEngine> Detector<E> {
  pub fn new(engine: E, config: DetectorConfig, classes: ClassMap) -> Result<Self, ConfigError> {
    config.validate()?;
    if !classes.is_empty() && classes.len() != config.num_classes {
      warn!(
        "类别表包含 {} 个类别, 配置为 {} 个",
        classes.len(),
        config.num_classes
      );
    }

    Ok(Self {
      preprocessor: Preprocessor::from_config(&config),
      decoder: Decoder::from_config(&config),
      suppressor: Suppressor::new(config.iou_threshold),
      mapper: Mapper::new(classes).allow(config.allowed_class_ids.iter().copied()),
      engine,
      config,
      session: None,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn classes(&self) -> &ClassMap {
    self.mapper.classes()
  }

  pub fn session(&self) -> Option<&ModelSession<E::Handle>> {
    self.session.as_ref()
  }

  /// 当前会话实际使用的后端
  pub fn active_backend(&self) -> Option<Backend> {
    self.session.as_ref().map(ModelSession::backend)
  }

  pub fn model_id(&self) -> Option<&str> {
    self.session.as_ref().map(ModelSession::model_id)
  }

  /// 加载（或切换）模型
  ///
  /// 先释放已有会话再解析后端，返回实际使用的后端。
  pub fn load_model(
    &mut self,
    model: &ModelMetadata,
    caps: &CapabilitySummary,
    preferred: Option<Backend>,
  ) -> Result<Backend, DetectError> {
    self.release();

    let [_, channels, height, width] = model.input_shape;
    if channels != 3 || height == 0 || width == 0 || height != width {
      return Err(DetectError::ModelLoadFailed {
        attempts: 0,
        source: EngineError::new(format!(
          "模型 {} 的输入形状不受支持: {:?}",
          model.id, model.input_shape
        )),
      });
    }

    let expected = 4 + self.config.num_classes;
    if let Some(features) = model.declared_features().filter(|&f| f != expected) {
      warn!(
        "模型 {} 声明的特征数为 {}, 与配置的 {} 类 (期望 {}) 不一致",
        model.id, features, self.config.num_classes, expected
      );
    }

    let session = resolve(&self.engine, model, caps, preferred, self.config.max_threads)?;
    let backend = session.backend();

    let input = TensorShape {
      channels,
      height: height as u32,
      width: width as u32,
    };
    if input != self.config.input {
      info!(
        "模型输入尺寸 {}x{} 与配置 {}x{} 不同, 使用模型尺寸",
        input.width, input.height, self.config.input.width, self.config.input.height
      );
      self.config.input = input;
      self.preprocessor = Preprocessor::from_config(&self.config);
      self.decoder.set_image_size(input.width, input.height);
    }

    self.session = Some(session);
    Ok(backend)
  }

  /// 对单帧执行完整的检测流水线
  pub fn detect(&mut self, frame: &PixelBuffer<'_>) -> Result<Detections, DetectError> {
    let session = self.session.as_mut().ok_or(DetectError::SessionReleased)?;

    let start = Instant::now();
    let prepared = self.preprocessor.process(frame)?;
    let preprocess_ms = elapsed_ms(start);

    let start = Instant::now();
    let output = session.run(&prepared.tensor)?;
    let inference_ms = elapsed_ms(start);

    let start = Instant::now();
    let candidates = self.decoder.decode_tensor(&output)?;
    let candidate_count = candidates.len();
    let kept = self.suppressor.suppress(candidates);
    let mut detections = self.mapper.map(&kept, &prepared.geometry);
    if let Some(max) = self.config.max_detections {
      detections.truncate(max);
    }
    let postprocess_ms = elapsed_ms(start);

    debug!(
      "候选 {} 个, NMS 后 {} 个, 输出 {} 个; 耗时 {:.2}/{:.2}/{:.2} ms",
      candidate_count,
      kept.len(),
      detections.len(),
      preprocess_ms,
      inference_ms,
      postprocess_ms
    );

    Ok(Detections {
      detections,
      timing: FrameTiming {
        preprocess_ms,
        inference_ms,
        postprocess_ms,
      },
    })
  }

  /// 释放当前会话，可重复调用
  pub fn release(&mut self) {
    if let Some(mut session) = self.session.take() {
      session.release();
    }
  }
}
