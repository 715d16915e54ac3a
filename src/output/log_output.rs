// 该文件是 Xifeng （西风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::convert::Infallible;

use tracing::{debug, info};

use crate::{
  frame::Frame,
  output::{FrameReport, Render},
};

/// 只通过 tracing 记录检测结果
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl LogOutput {
  pub const SCHEME: &'static str = "log";
}

impl Render<Frame, FrameReport> for LogOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    info!(
      "帧 {} ({}): {} 个目标, 后端 {}, 耗时 {:.2} ms",
      result.frame,
      frame.source,
      result.detections.len(),
      result.backend,
      result.timing.total_ms()
    );
    for item in &result.detections {
      debug!(
        "  {} ({}) {:.4}: [{:.1}, {:.1}, {:.1}, {:.1}]",
        item.class_name, item.class_id, item.confidence, item.x1, item.y1, item.x2, item.y2
      );
    }
    Ok(())
  }
}
