// 该文件是 Xifeng （西风） 项目的一部分。
// src/main.rs - 主程序入口
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xifeng::{
  Detector, DetectorConfig, FromUrl,
  input::InputWrapper,
  labels::ClassMap,
  model::{ModelMetadata, OnnxEngine},
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

use args::{Args, TaskKind};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = match &args.config {
    Some(path) => DetectorConfig::from_json_file(path)?,
    None => DetectorConfig::default(),
  };
  let config = args.apply(config);
  let classes = match &args.classes {
    Some(path) => ClassMap::load_or_empty(path),
    None => ClassMap::coco(),
  };

  let model = ModelMetadata::from_url(&args.model)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let mut detector = Detector::new(OnnxEngine, config, classes)?;
  let caps = args.capabilities();
  let backend = detector.load_model(&model, &caps, args.backend)?;
  info!("模型 {} 使用后端 {}", model.id, backend);

  match args.task {
    TaskKind::Oneshot => OneShotTask.run_task(input, detector, output)?,
    TaskKind::Repeat => RepeatShotTask::default()
      .with_repeat(args.repeat)
      .run_task(input, detector, output)?,
    TaskKind::Continuous => ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .with_drop_frames(args.drop_frames)
      .run_task(input, detector, output)?,
  }

  Ok(())
}
