// 该文件是 Xifeng （西风） 项目的一部分。
// src/output.rs - 检测结果输出
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

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detector::{Detections, FrameTiming},
  frame::Frame,
  model::Backend,
  postprocess::FinalDetection,
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod log_output;
pub use self::log_output::LogOutput;

#[cfg(feature = "jsonl_output")]
mod json_lines;
#[cfg(feature = "jsonl_output")]
pub use self::json_lines::{JsonLinesOutput, JsonLinesOutputError};

/// 单帧检测报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
  pub frame: u64,
  pub source: String,
  pub timestamp: DateTime<Utc>,
  pub backend: Backend,
  pub model_id: String,
  pub width: u32,
  pub height: u32,
  pub detections: Vec<FinalDetection>,
  pub timing: FrameTiming,
}

impl FrameReport {
  pub fn new(frame: &Frame, backend: Backend, model_id: impl Into<String>, result: Detections) -> Self {
    Self {
      frame: frame.index,
      source: frame.source.clone(),
      timestamp: Utc::now(),
      backend,
      model_id: model_id.into(),
      width: frame.image.width(),
      height: frame.image.height(),
      detections: result.detections,
      timing: result.timing,
    }
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "jsonl_output")]
  #[error("JSON Lines 输出错误: {0}")]
  JsonLinesOutputError(#[from] JsonLinesOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "jsonl_output")]
  JsonLinesOutput(JsonLinesOutput),
  LogOutput(LogOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "jsonl_output")]
      JsonLinesOutput::SCHEME | JsonLinesOutput::STDOUT_SCHEME => {
        let output = JsonLinesOutput::from_url(url)?;
        Ok(OutputWrapper::JsonLinesOutput(output))
      }
      LogOutput::SCHEME => Ok(OutputWrapper::LogOutput(LogOutput)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<Frame, FrameReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "jsonl_output")]
      OutputWrapper::JsonLinesOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => output
        .render_result(frame, result)
        .map_err(|never| match never {}),
    }
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  #[test]
  fn report_carries_frame_metadata() {
    let frame = Frame {
      image: RgbImage::new(8, 6),
      index: 42,
      source: "camera".into(),
    };
    let report = FrameReport::new(&frame, Backend::Wasm, "yolo11n", Detections::default());

    assert_eq!(report.frame, 42);
    assert_eq!((report.width, report.height), (8, 6));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["backend"], "wasm");
    assert_eq!(json["model_id"], "yolo11n");
    assert!(json["timestamp"].is_string());
    assert!(json["timing"]["inference_ms"].is_number());
  }

  #[test]
  fn output_url_selection() {
    let url = Url::parse("log:").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::LogOutput(_))
    ));

    let url = Url::parse("rtsp://127.0.0.1/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(scheme)) if scheme == "rtsp"
    ));
  }
}
