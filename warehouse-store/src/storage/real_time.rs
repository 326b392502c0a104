// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./real_time_test.rs"]
mod real_time_test;

use super::StorageError;
use crate::clients::redis::RedisStoreClient;
use crate::clients::store::{DynamicStoreClient, StoreError};
use crate::codec::MetricsDataCodec;
use crate::config::WarehouseConfig;
use crate::protos::metrics_data::MetricsData;
use crate::queue::{DynamicDataQueue, QueueError};
use crate::worker_pool::WorkerPool;
use bd_log::warn_every;
use bd_server_stats::stats::{AutoGauge, Scope};
use bd_shutdown::ComponentShutdown;
use prometheus::{IntCounter, IntGauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::ext::NumericalDuration;

const JOB_NAME: &str = "warehouse-redis-data-storage";

#[derive(Clone)]
struct Stats {
  received: IntCounter,
  empty_skipped: IntCounter,
  encode_failed: IntCounter,
  write_created: IntCounter,
  write_replaced: IntCounter,
  write_failed: IntCounter,
  write_rejected: IntCounter,
  queue_error: IntCounter,
  writes_in_flight: IntGauge,
}

impl Stats {
  fn new(scope: &Scope) -> Self {
    let scope = scope.scope("real_time_storage");
    Self {
      received: scope.counter("received"),
      empty_skipped: scope.counter("empty_skipped"),
      encode_failed: scope.counter("encode_failed"),
      write_created: scope.counter("write_created"),
      write_replaced: scope.counter("write_replaced"),
      write_failed: scope.counter("write_failed"),
      write_rejected: scope.counter("write_rejected"),
      queue_error: scope.counter("queue_error"),
      writes_in_flight: scope.gauge("writes_in_flight"),
    }
  }
}

//
// RealTimeStorage
//

// Keeps the latest snapshot for every (monitor id, metric set) pair in a hash-keyed store. A
// single background job drains the real-time storage queue and fires one write per snapshot
// without waiting for it. Write failures are logged and the snapshot is dropped; the job only
// stops on shutdown or when the queue is closed.
pub struct RealTimeStorage {
  store: DynamicStoreClient,
  stats: Stats,
  started: AtomicBool,
  destroyed: AtomicBool,
}

impl std::fmt::Debug for RealTimeStorage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RealTimeStorage")
      .field("started", &self.started)
      .field("destroyed", &self.destroyed)
      .finish_non_exhaustive()
  }
}

impl RealTimeStorage {
  /// Validate the Redis configuration and open the store connection. Nothing is consumed until
  /// [`Self::start`] is called.
  pub async fn new(config: &WarehouseConfig, scope: &Scope) -> Result<Arc<Self>, StorageError> {
    let connect_info = config.redis().inspect_err(|e| {
      log::error!("init error, please configure warehouse redis properties: {e}");
    })?;
    let store = RedisStoreClient::connect(&connect_info).await?;
    Ok(Self::new_with_client(Arc::new(store), scope))
  }

  #[must_use]
  pub fn new_with_client(store: DynamicStoreClient, scope: &Scope) -> Arc<Self> {
    Arc::new(Self {
      store,
      stats: Stats::new(scope),
      started: AtomicBool::new(false),
      destroyed: AtomicBool::new(false),
    })
  }

  /// Schedule the consumption job on the worker pool. Only the first call starts a job.
  pub fn start(
    self: &Arc<Self>,
    queue: DynamicDataQueue,
    worker_pool: &WorkerPool,
  ) -> Result<(), StorageError> {
    if self.started.swap(true, Ordering::SeqCst) {
      return Err(StorageError::AlreadyStarted);
    }

    let storage = self.clone();
    worker_pool
      .execute_job(JOB_NAME, move |shutdown| storage.consume(queue, shutdown))
      .inspect_err(|_| self.started.store(false, Ordering::SeqCst))?;
    Ok(())
  }

  /// Read the latest snapshot stored for a monitor and metric set. Returns None if the pair has
  /// never been written. Store and decode failures are returned to the caller as is.
  pub async fn get_current_metrics_data(
    &self,
    monitor_id: u64,
    metrics: &str,
  ) -> Result<Option<MetricsData>, StorageError> {
    let Some(value) = self
      .store
      .get_field(&monitor_id.to_string(), metrics)
      .await?
    else {
      return Ok(None);
    };
    Ok(Some(MetricsDataCodec::decode(&value)?))
  }

  /// Release the store connection and then the store client. Never fails: errors are logged and
  /// teardown continues. Calls after the first are no-ops. Writes issued afterwards are rejected
  /// by the store client and counted as `write_rejected`.
  pub async fn destroy(&self) {
    if self.destroyed.swap(true, Ordering::SeqCst) {
      log::debug!("real time storage already destroyed");
      return;
    }

    if let Err(e) = self.store.close().await {
      log::warn!("unable to close store connection: {e}");
    }
    if let Err(e) = self.store.shutdown().await {
      log::warn!("unable to shut down store client: {e}");
    }
    log::info!("real time storage destroyed");
  }

  async fn consume(self: Arc<Self>, queue: DynamicDataQueue, mut shutdown: ComponentShutdown) {
    loop {
      let result = tokio::select! {
        biased;
        () = shutdown.cancelled() => {
          log::info!("real time storage shutting down");
          break;
        },
        result = queue.poll_real_time_storage_metrics_data() => result,
      };

      match result {
        Ok(data) => self.save_data(data, &shutdown),
        Err(QueueError::Closed) => {
          log::info!("real time storage queue closed, no more data will be stored");
          break;
        },
        Err(e @ QueueError::Interrupted(_)) => {
          warn_every!(15.seconds(), "real time storage queue error: {}", e);
          self.stats.queue_error.inc();
        },
      }
    }
  }

  // Fire a write for the snapshot and return immediately. The spawned task holds a clone of the
  // job's shutdown token so that worker pool shutdown waits for in-flight writes.
  fn save_data(&self, data: MetricsData, shutdown: &ComponentShutdown) {
    self.stats.received.inc();
    let key = data.store_key();
    if data.is_empty() {
      log::info!(
        "[warehouse redis] metrics data {key} - {} has no values, ignoring",
        data.store_field()
      );
      self.stats.empty_skipped.inc();
      return;
    }

    let value = match MetricsDataCodec::encode(&data) {
      Ok(value) => value,
      Err(e) => {
        warn_every!(
          15.seconds(),
          "unable to encode metrics data {}:{}: {}",
          key,
          data.store_field(),
          e
        );
        self.stats.encode_failed.inc();
        return;
      },
    };

    let field = data.metrics;
    let store = self.store.clone();
    let stats = self.stats.clone();
    let shutdown = shutdown.clone();
    let auto_writes_in_flight = AutoGauge::new(stats.writes_in_flight.clone());
    tokio::spawn(async move {
      match store.upsert_field(&key, &field, value).await {
        Ok(true) => {
          log::debug!("[warehouse] redis add new data {key}:{field}");
          stats.write_created.inc();
        },
        Ok(false) => {
          log::debug!("[warehouse] redis replace data {key}:{field}");
          stats.write_replaced.inc();
        },
        Err(StoreError::Closed) => {
          log::debug!("[warehouse] store closed, dropping data {key}:{field}");
          stats.write_rejected.inc();
        },
        Err(e) => {
          warn_every!(
            15.seconds(),
            "[warehouse] redis write {}:{} failed: {}",
            key,
            field,
            e
          );
          stats.write_failed.inc();
        },
      }
      drop(auto_writes_in_flight);
      drop(shutdown);
    });
  }
}

/// Hosting process hook. Returns None without touching the store when real-time storage is
/// disabled, otherwise connects and starts consuming `queue`.
pub async fn maybe_start_real_time_storage(
  config: &WarehouseConfig,
  scope: &Scope,
  queue: DynamicDataQueue,
  worker_pool: &WorkerPool,
) -> Result<Option<Arc<RealTimeStorage>>, StorageError> {
  if !config.redis_enabled() {
    log::info!("real time storage is disabled");
    return Ok(None);
  }

  let storage = RealTimeStorage::new(config, scope).await?;
  storage.start(queue, worker_pool)?;
  Ok(Some(storage))
}
