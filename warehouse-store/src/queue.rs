// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./queue_test.rs"]
mod queue_test;

use crate::config::QueueConfig;
use crate::protos::metrics_data::MetricsData;
use async_trait::async_trait;
use bd_server_stats::stats::Scope;
use parking_lot::Mutex;
use prometheus::{IntCounter, IntGauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
  // The wait was interrupted without data. Consumers should simply wait again.
  #[error("queue wait interrupted: {0}")]
  Interrupted(String),
  // The queue has been closed and drained. Nothing will ever be delivered again.
  #[error("queue is closed")]
  Closed,
}

//
// DataQueue
//

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataQueue {
  /// Enqueue a snapshot. Waits for space if the queue is bounded and full.
  async fn send_metrics_data(&self, data: MetricsData) -> Result<(), QueueError>;

  /// Wait for the next snapshot destined for real-time storage.
  async fn poll_real_time_storage_metrics_data(&self) -> Result<MetricsData, QueueError>;
}

pub type DynamicDataQueue = Arc<dyn DataQueue + Send + Sync + 'static>;

#[derive(Clone)]
enum QueueSender {
  Bounded(mpsc::Sender<MetricsData>),
  Unbounded(mpsc::UnboundedSender<MetricsData>),
}

enum QueueReceiver {
  Bounded(mpsc::Receiver<MetricsData>),
  Unbounded(mpsc::UnboundedReceiver<MetricsData>),
}

impl QueueReceiver {
  async fn recv(&mut self) -> Option<MetricsData> {
    match self {
      Self::Bounded(receiver) => receiver.recv().await,
      Self::Unbounded(receiver) => receiver.recv().await,
    }
  }
}

struct Stats {
  enqueued: IntCounter,
  rejected: IntCounter,
  queued: IntGauge,
}

impl Stats {
  fn new(scope: &Scope) -> Self {
    let scope = scope.scope("queue");
    Self {
      enqueued: scope.counter("enqueued"),
      rejected: scope.counter("rejected"),
      queued: scope.gauge("queued"),
    }
  }
}

//
// InMemoryDataQueue
//

// A multi-producer, multi-consumer queue backed by a tokio channel. Consumers share the receiving
// end behind an async mutex, so each snapshot is delivered to exactly one consumer in FIFO order.
// Nothing survives a restart.
pub struct InMemoryDataQueue {
  sender: Mutex<Option<QueueSender>>,
  receiver: tokio::sync::Mutex<QueueReceiver>,
  // Incremented before an item is published to the channel, so a consumer can never observe the
  // item before it is counted.
  len: AtomicUsize,
  stats: Stats,
}

impl InMemoryDataQueue {
  #[must_use]
  pub fn unbounded(scope: &Scope) -> Arc<Self> {
    let (tx, rx) = mpsc::unbounded_channel();
    Self::new(
      scope,
      QueueSender::Unbounded(tx),
      QueueReceiver::Unbounded(rx),
    )
  }

  // A capacity of 0 is bumped to 1 since tokio does not support rendezvous channels.
  #[must_use]
  pub fn bounded(scope: &Scope, capacity: usize) -> Arc<Self> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    Self::new(scope, QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
  }

  #[must_use]
  pub fn from_config(config: &QueueConfig, scope: &Scope) -> Arc<Self> {
    config
      .max_len
      .map_or_else(|| Self::unbounded(scope), |max_len| Self::bounded(scope, max_len))
  }

  fn new(scope: &Scope, sender: QueueSender, receiver: QueueReceiver) -> Arc<Self> {
    Arc::new(Self {
      sender: Mutex::new(Some(sender)),
      receiver: tokio::sync::Mutex::new(receiver),
      len: AtomicUsize::new(0),
      stats: Stats::new(scope),
    })
  }

  // Stop accepting new snapshots. Consumers still receive everything already queued, after which
  // they observe QueueError::Closed.
  pub fn close(&self) {
    if self.sender.lock().take().is_some() {
      log::debug!("closing in memory data queue");
    }
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.len.load(Ordering::SeqCst)
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn reject(&self) -> QueueError {
    self.stats.rejected.inc();
    QueueError::Closed
  }

  fn add_queued(&self) {
    self.len.fetch_add(1, Ordering::SeqCst);
    self.stats.queued.inc();
  }

  fn remove_queued(&self) {
    self.len.fetch_sub(1, Ordering::SeqCst);
    self.stats.queued.dec();
  }
}

#[async_trait]
impl DataQueue for InMemoryDataQueue {
  async fn send_metrics_data(&self, data: MetricsData) -> Result<(), QueueError> {
    // Clone the sender out of the lock so a bounded send can wait without holding it.
    let Some(sender) = self.sender.lock().clone() else {
      return Err(self.reject());
    };

    match sender {
      QueueSender::Bounded(sender) => {
        // Waiting for a slot takes nothing from the caller, so a dropped send is not counted.
        let permit = sender.reserve().await.map_err(|_| self.reject())?;
        self.add_queued();
        permit.send(data);
      },
      QueueSender::Unbounded(sender) => {
        self.add_queued();
        if sender.send(data).is_err() {
          self.remove_queued();
          return Err(self.reject());
        }
      },
    }
    self.stats.enqueued.inc();
    Ok(())
  }

  async fn poll_real_time_storage_metrics_data(&self) -> Result<MetricsData, QueueError> {
    let data = self
      .receiver
      .lock()
      .await
      .recv()
      .await
      .ok_or(QueueError::Closed)?;
    self.remove_queued();
    Ok(data)
  }
}
