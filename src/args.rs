// 该文件是 Xifeng （西风） 项目的一部分。
// src/args.rs - 命令行参数定义
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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use url::Url;
use xifeng::{DetectorConfig, model::{Backend, CapabilitySummary}};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskKind {
  /// 处理第一帧后退出
  #[default]
  Oneshot,
  /// 重复处理第一帧，统计平均耗时
  Repeat,
  /// 持续处理所有输入帧
  Continuous,
}

/// Xifeng 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  /// - onnx:///path/model.onnx
  /// - catalog:///path/models.json?id=yolo11n
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// - image:///path/a.jpg
  /// - folder:///path/frames
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// - jsonl:///path/results.jsonl
  /// - stdout:
  /// - log:
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,

  /// 检测器配置文件 (JSON)
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 类别表文件 (JSON)，缺省使用内置 COCO 类别
  #[arg(long, value_name = "FILE")]
  pub classes: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou: Option<f32>,

  /// 每帧最多输出的目标数
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,

  /// 只保留指定类别，可重复
  #[arg(long, value_name = "CLASS_ID")]
  pub allow: Vec<u32>,

  /// 首选推理后端 (webgpu, wasm, cpu)
  #[arg(long, value_name = "BACKEND")]
  pub backend: Option<Backend>,

  /// 设备支持 GPU 加速
  #[arg(long)]
  pub gpu: bool,

  /// 软件后端只使用单线程
  #[arg(long)]
  pub single_thread: bool,

  /// 软件后端不使用 SIMD
  #[arg(long)]
  pub no_simd: bool,

  #[arg(long, value_enum, default_value_t = TaskKind::Oneshot)]
  pub task: TaskKind,

  /// 重复任务的次数
  #[arg(long, value_name = "COUNT", default_value_t = 100)]
  pub repeat: usize,

  /// 持续任务处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 推理跟不上输入时丢弃旧帧
  #[arg(long)]
  pub drop_frames: bool,
}

impl Args {
  /// 设备能力摘要，由命令行开关给出
  pub fn capabilities(&self) -> CapabilitySummary {
    CapabilitySummary {
      gpu_accel: self.gpu,
      wasm_baseline: true,
      simd: !self.no_simd,
      threads: !self.single_thread,
    }
  }

  /// 在配置文件的基础上应用命令行覆盖
  pub fn apply(&self, mut config: DetectorConfig) -> DetectorConfig {
    if let Some(confidence) = self.confidence {
      config = config.confidence_threshold(confidence);
    }
    if let Some(iou) = self.iou {
      config = config.iou_threshold(iou);
    }
    if self.max_detections.is_some() {
      config = config.max_detections(self.max_detections);
    }
    if !self.allow.is_empty() {
      config = config.allowed_class_ids(self.allow.iter().copied());
    }
    config
  }
}
