// 该文件是 Xifeng （西风） 项目的一部分。
// src/output/json_lines.rs - JSON Lines 结果记录
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
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{FrameReport, Render},
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("输出写入器已失效")]
  Poisoned,
}

/// 每帧一行 JSON 的结果记录
pub struct JsonLinesOutput {
  writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesOutput {
  pub const STDOUT_SCHEME: &'static str = "stdout";

  pub fn new(writer: impl Write + Send + 'static) -> Self {
    Self {
      writer: Mutex::new(Box::new(writer)),
    }
  }

  pub fn stdout() -> Self {
    Self::new(std::io::stdout())
  }

  /// 追加写入文件，必要时创建上级目录
  pub fn create(path: impl AsRef<Path>) -> Result<Self, JsonLinesOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let file: File = OpenOptions::new().create(true).append(true).open(path)?;
    info!("检测结果写入: {}", path.display());
    Ok(Self::new(BufWriter::new(file)))
  }
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      Self::SCHEME => Self::create(url.path()),
      Self::STDOUT_SCHEME => Ok(Self::stdout()),
      other => {
        error!("URI 方案不匹配: 期望 '{}', 实际为 '{}'", Self::SCHEME, other);
        Err(JsonLinesOutputError::SchemeMismatch)
      }
    }
  }
}

impl Render<Frame, FrameReport> for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(&self, _frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    let mut writer = self
      .writer
      .lock()
      .map_err(|_| JsonLinesOutputError::Poisoned)?;
    serde_json::to_writer(&mut *writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}
