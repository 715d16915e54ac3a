// 该文件是 Xifeng （西风） 项目的一部分。
// src/error.rs - 检测流水线错误定义
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

use thiserror::Error;

use crate::model::{Backend, EngineError};

/// 检测流水线错误
#[derive(Error, Debug)]
pub enum DetectError {
  /// 单个后端不可用，解析器会继续尝试下一个候选
  #[error("后端 {backend} 不可用: {source}")]
  BackendUnavailable {
    backend: Backend,
    #[source]
    source: EngineError,
  },
  /// 所有候选后端均失败
  #[error("模型加载失败，已尝试 {attempts} 个后端: {source}")]
  ModelLoadFailed {
    attempts: usize,
    #[source]
    source: EngineError,
  },
  #[error("张量形状无效: 期望长度 {expected}, 实际长度 {actual}")]
  InvalidTensorShape { expected: usize, actual: usize },
  #[error("不支持的输出形状: {0}")]
  UnsupportedOutputShape(String),
  #[error("推理结果中缺少输出张量: {0}")]
  OutputTensorMissing(String),
  #[error("预处理不可用: {0}")]
  PreprocessUnavailable(String),
  #[error("推理执行失败: {0}")]
  InferenceFailed(#[source] EngineError),
  #[error("模型会话释放失败: {0}")]
  ReleaseFailed(String),
  #[error("模型会话已释放或尚未加载")]
  SessionReleased,
}

impl DetectError {
  /// 仅影响当前帧的错误，调用方应跳过该帧并继续处理下一帧
  pub fn is_frame_scoped(&self) -> bool {
    matches!(
      self,
      DetectError::InvalidTensorShape { .. }
        | DetectError::UnsupportedOutputShape(_)
        | DetectError::OutputTensorMissing(_)
        | DetectError::PreprocessUnavailable(_)
        | DetectError::InferenceFailed(_)
    )
  }
}
