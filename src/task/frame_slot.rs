// 该文件是 Xifeng （西风） 项目的一部分。
// src/task/frame_slot.rs - 单槽最新帧信箱
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

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

/// 创建容量为 1 的最新帧信箱
///
/// 推理跟不上帧率时丢帧而不是排队：生产者遇到满槽时取走旧帧再放入新帧，
/// 消费者取帧后再排空通道，总是拿到最新的一帧。两端丢弃的帧都计入同一计数。
/// 发送端全部释放后，消费者取完剩余帧即结束。
pub fn frame_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
  let (tx, rx) = bounded(1);
  let dropped = Arc::new(AtomicU64::new(0));
  (
    SlotSender {
      tx,
      evict: rx.clone(),
      dropped: dropped.clone(),
    },
    SlotReceiver { rx, dropped },
  )
}

pub struct SlotSender<T> {
  tx: Sender<T>,
  // 满槽时用于取走旧帧
  evict: Receiver<T>,
  dropped: Arc<AtomicU64>,
}

impl<T> SlotSender<T> {
  /// 放入新帧，槽内未被取走的旧帧被覆盖
  ///
  /// 发送端自身持有接收端的克隆，通道不会因消费者退出而断开，
  /// 生产者需另行检查停止标志。
  pub fn publish(&self, mut value: T) {
    loop {
      match self.tx.try_send(value) {
        Ok(()) => return,
        Err(TrySendError::Full(v)) => {
          if self.evict.try_recv().is_ok() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
          }
          value = v;
        }
        Err(TrySendError::Disconnected(_)) => return,
      }
    }
  }

  pub fn dropped(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }
}

pub struct SlotReceiver<T> {
  rx: Receiver<T>,
  dropped: Arc<AtomicU64>,
}

impl<T> SlotReceiver<T> {
  /// 阻塞到有帧可取，并只保留最新的一帧；发送端释放且通道为空时返回 `None`
  pub fn take(&self) -> Option<T> {
    let mut value = self.rx.recv().ok()?;
    while let Ok(newer) = self.rx.try_recv() {
      self.dropped.fetch_add(1, Ordering::Relaxed);
      value = newer;
    }
    Some(value)
  }

  /// 被覆盖（丢弃）的帧数
  pub fn dropped(&self) -> u64 {
    self.dropped.load(Ordering::Relaxed)
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;

  #[test]
  fn newest_value_wins() {
    let (tx, rx) = frame_slot();
    tx.publish(1);
    tx.publish(2);
    tx.publish(3);
    drop(tx);
    assert_eq!(rx.take(), Some(3));
    assert_eq!(rx.take(), None);
    assert_eq!(rx.dropped(), 2);
  }

  #[test]
  fn sender_drop_drains_then_ends() {
    let (tx, rx) = frame_slot();
    tx.publish("last");
    drop(tx);
    assert_eq!(rx.take(), Some("last"));
    assert_eq!(rx.take(), None);
  }

  #[test]
  fn consumer_wakes_for_producer() {
    let (tx, rx) = frame_slot();
    let producer = thread::spawn(move || {
      for i in 0..100 {
        tx.publish(i);
      }
    });

    let mut received = Vec::new();
    while let Some(v) = rx.take() {
      received.push(v);
    }
    producer.join().unwrap();

    assert_eq!(received.last(), Some(&99));
    assert!(received.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(received.len() as u64 + rx.dropped(), 100);
  }
}
