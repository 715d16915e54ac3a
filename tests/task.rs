// 该文件是 Xifeng （西风） 项目的一部分。
// tests/task.rs - 任务执行集成测试
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

mod common;

use std::{cell::RefCell, rc::Rc};

use common::{NUM_CLASSES, ScriptedEngine, detector, frame, full_caps, model, yolo_output};
use xifeng::{
  Detector,
  frame::Frame,
  model::Backend,
  output::{FrameReport, Render},
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

/// 收集每帧报告的输出
#[derive(Clone, Default)]
struct Collect {
  reports: Rc<RefCell<Vec<FrameReport>>>,
}

impl Collect {
  fn frames(&self) -> Vec<u64> {
    self.reports.borrow().iter().map(|r| r.frame).collect()
  }
}

impl Render<Frame, FrameReport> for Collect {
  type Error = std::io::Error;

  fn render_result(&self, _frame: &Frame, result: &FrameReport) -> Result<(), Self::Error> {
    self.reports.borrow_mut().push(result.clone());
    Ok(())
  }
}

fn loaded(engine: &ScriptedEngine) -> Detector<ScriptedEngine> {
  engine.set_output(yolo_output(NUM_CLASSES, &[(15.0, 15.0, 10.0, 10.0, 0, 0.8)]));
  let mut detector = detector(engine);
  detector.load_model(&model("yolo11n"), &full_caps(), None).unwrap();
  detector
}

fn frames(n: u64) -> Vec<Frame> {
  (0..n).map(frame).collect()
}

fn continuous() -> ContinuousTask {
  ContinuousTask::default().with_catch_interrupt(false)
}

#[test]
fn one_shot_reports_first_frame_and_releases() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  OneShotTask
    .run_task(frames(3).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  assert_eq!(output.frames(), vec![0]);
  let reports = output.reports.borrow();
  assert_eq!(reports[0].backend, Backend::WebGpu);
  assert_eq!(reports[0].model_id, "yolo11n");
  assert_eq!(reports[0].detections[0].class_name, "person");
  assert_eq!(engine.script().borrow().released, vec!["yolo11n".to_string()]);
}

#[test]
fn one_shot_without_frames_fails() {
  let engine = ScriptedEngine::new();
  let result = OneShotTask.run_task(Vec::<Frame>::new().into_iter(), loaded(&engine), Collect::default());
  assert!(result.is_err());
}

#[test]
fn repeat_shot_runs_the_same_frame() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  RepeatShotTask::default()
    .with_repeat(4)
    .run_task(frames(2).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  assert_eq!(output.frames(), vec![0, 0, 0, 0]);
  assert_eq!(engine.script().borrow().runs, 4);
}

#[test]
fn continuous_processes_every_frame_in_order() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  continuous()
    .run_task(frames(5).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  assert_eq!(output.frames(), vec![0, 1, 2, 3, 4]);
  assert_eq!(engine.script().borrow().released.len(), 1);
}

#[test]
fn continuous_stops_at_frame_number() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  continuous()
    .with_frame_number(Some(2))
    .run_task(frames(5).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  assert_eq!(output.frames(), vec![0, 1]);
}

#[test]
fn continuous_respects_stop_flag() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  let task = continuous();
  task.stop_flag().store(true, std::sync::atomic::Ordering::SeqCst);
  task
    .run_task(frames(5).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  // 每帧开始前检查停止标志
  assert!(output.frames().is_empty());
  assert_eq!(engine.script().borrow().runs, 0);
  assert_eq!(engine.script().borrow().released.len(), 1);
}

#[test]
fn zero_frame_number_processes_nothing() {
  for drop_frames in [false, true] {
    let engine = ScriptedEngine::new();
    let output = Collect::default();

    continuous()
      .with_frame_number(Some(0))
      .with_drop_frames(drop_frames)
      .run_task(frames(5).into_iter(), loaded(&engine), output.clone())
      .unwrap();

    assert!(output.frames().is_empty(), "drop_frames = {}", drop_frames);
    assert_eq!(engine.script().borrow().runs, 0);
  }
}

#[test]
fn frame_scoped_failures_are_skipped() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();
  let detector = loaded(&engine);
  engine.script().borrow_mut().fail_run = true;

  continuous()
    .run_task(frames(3).into_iter(), detector, output.clone())
    .unwrap();

  assert!(output.frames().is_empty());
  assert_eq!(engine.script().borrow().runs, 3);
}

#[test]
fn missing_session_aborts_the_task() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  let result = continuous().run_task(frames(3).into_iter(), detector(&engine), output.clone());
  assert!(result.is_err());
  assert!(output.frames().is_empty());
}

#[test]
fn dropping_frames_still_processes_the_newest_frame() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  continuous()
    .with_drop_frames(true)
    .run_task(frames(20).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  let seen = output.frames();
  assert!(!seen.is_empty());
  assert_eq!(seen.last(), Some(&19));
  assert!(seen.windows(2).all(|w| w[0] < w[1]));
  assert_eq!(engine.script().borrow().released.len(), 1);
}

#[test]
fn dropping_frames_honors_frame_number() {
  let engine = ScriptedEngine::new();
  let output = Collect::default();

  continuous()
    .with_drop_frames(true)
    .with_frame_number(Some(1))
    .run_task(frames(20).into_iter(), loaded(&engine), output.clone())
    .unwrap();

  assert_eq!(output.frames().len(), 1);
  assert_eq!(engine.script().borrow().runs, 1);
}
