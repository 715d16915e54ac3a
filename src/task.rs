// 该文件是 Xifeng （西风） 项目的一部分。
// src/task.rs - 任务执行
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  detector::Detector,
  error::DetectError,
  frame::Frame,
  model::InferenceEngine,
  output::{FrameReport, Render},
};

mod frame_slot;

pub use self::frame_slot::{SlotReceiver, SlotSender, frame_slot};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 检测单帧并输出
///
/// 仅影响当前帧的错误记录后返回 `Ok(None)`，其余错误向上传递。
pub fn process_frame<E, O, RE>(
  detector: &mut Detector<E>,
  output: &O,
  frame: &Frame,
) -> anyhow::Result<Option<FrameReport>>
where
  E: InferenceEngine,
  O: Render<Frame, FrameReport, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  let result = match detector.detect(&frame.pixels()) {
    Ok(result) => result,
    Err(e) if e.is_frame_scoped() => {
      warn!("跳过第 {} 帧 ({}): {}", frame.index, frame.source, e);
      return Ok(None);
    }
    Err(e) => return Err(e.into()),
  };

  let session = detector.session().ok_or(DetectError::SessionReleased)?;
  let report = FrameReport::new(frame, session.backend(), session.model_id(), result);
  output.render_result(frame, &report)?;
  Ok(Some(report))
}

pub struct OneShotTask;

impl<E, RE, I, O> Task<I, Detector<E>, O> for OneShotTask
where
  E: InferenceEngine,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  O: Render<Frame, FrameReport, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: Detector<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let report = process_frame(&mut model, &output, &frame)?;
    info!(
      "推理完成，耗时: {:.2?}, 检测到 {} 个目标",
      now.elapsed(),
      report.map(|r| r.detections.len()).unwrap_or_default()
    );
    model.release();
    Ok(())
  }
}

/// 重复检测同一帧，用于测量平均耗时
pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 100 }
  }
}

impl RepeatShotTask {
  /// 前两次视为预热，不计入平均值
  const WARMUP: usize = 2;

  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<E, RE, I, O> Task<I, Detector<E>, O> for RepeatShotTask
where
  E: InferenceEngine,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  O: Render<Frame, FrameReport, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: Detector<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");

    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      process_frame(&mut model, &output, &frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }

    let measured = if times.len() > Self::WARMUP {
      &times[Self::WARMUP..]
    } else {
      &times[..]
    };
    warn!(
      "平均推理时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    model.release();
    Ok(())
  }
}

/// 持续处理输入帧，直到输入结束、达到指定帧数或收到中断信号
pub struct ContinuousTask {
  frame_number: Option<usize>,
  drop_frames: bool,
  catch_interrupt: bool,
  stop: Arc<AtomicBool>,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      drop_frames: false,
      catch_interrupt: true,
      stop: Arc::new(AtomicBool::new(false)),
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 推理跟不上输入时丢弃旧帧，只处理最新一帧
  pub fn with_drop_frames(mut self, drop_frames: bool) -> Self {
    self.drop_frames = drop_frames;
    self
  }

  /// 是否安装 Ctrl-C 处理器，进程内只能安装一次
  pub fn with_catch_interrupt(mut self, catch_interrupt: bool) -> Self {
    self.catch_interrupt = catch_interrupt;
    self
  }

  /// 外部停止标志，置位后任务不再开始处理新的帧
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stop.clone()
  }

  fn install_interrupt(&self) -> anyhow::Result<()> {
    let stop = self.stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      stop.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(())
  }

  fn reached_limit(&self, processed: usize) -> bool {
    if self.frame_number.is_some_and(|n| processed >= n) {
      info!("达到指定帧数 {}, 退出任务循环", processed);
      return true;
    }
    if self.stop.load(Ordering::SeqCst) {
      warn!("中断信号接收，退出任务循环");
      return true;
    }
    false
  }
}

impl<E, RE, I, O> Task<I, Detector<E>, O> for ContinuousTask
where
  E: InferenceEngine,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame> + Send,
  O: Render<Frame, FrameReport, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: Detector<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    if self.catch_interrupt {
      self.install_interrupt()?;
    }

    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut handle = |frame: &Frame| -> anyhow::Result<()> {
      let now = Instant::now();
      match process_frame(&mut model, &output, frame)? {
        Some(report) => info!(
          "第 {} 帧: {} 个目标, 耗时 {:.2?}",
          frame.index,
          report.detections.len(),
          now.elapsed()
        ),
        None => skipped += 1,
      }
      processed += 1;
      Ok(())
    };

    if self.drop_frames {
      let (tx, rx) = frame_slot();
      let stop = &self.stop;
      let result = thread::scope(|scope| {
        scope.spawn(move || {
          for frame in input {
            if stop.load(Ordering::SeqCst) {
              break;
            }
            tx.publish(frame);
          }
        });

        let mut count = 0usize;
        let mut result = Ok(());
        while !self.reached_limit(count) {
          let Some(frame) = rx.take() else { break };
          result = handle(&frame);
          if result.is_err() {
            break;
          }
          count += 1;
        }
        // 通知生产者退出
        stop.store(true, Ordering::SeqCst);
        result
      });
      info!("丢弃 {} 帧", rx.dropped());
      result?;
    } else {
      let mut input = input;
      let mut count = 0usize;
      while !self.reached_limit(count) {
        let Some(frame) = input.next() else { break };
        handle(&frame)?;
        count += 1;
      }
    }

    drop(handle);
    info!("任务完成，共处理 {} 帧，跳过 {} 帧", processed, skipped);
    model.release();
    Ok(())
  }
}
