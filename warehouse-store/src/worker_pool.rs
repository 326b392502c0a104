// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./worker_pool_test.rs"]
mod worker_pool_test;

use bd_server_stats::stats::{AutoGauge, Scope};
use bd_shutdown::{ComponentShutdown, ComponentShutdownTrigger};
use futures::Future;
use parking_lot::Mutex;
use prometheus::{IntCounter, IntGauge};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WorkerPoolError {
  #[error("worker pool has been shut down")]
  ShutDown,
}

struct Stats {
  jobs_started: IntCounter,
  jobs_finished: IntCounter,
  jobs_active: IntGauge,
}

//
// WorkerPool
//

// Runs named, long lived background jobs. Every job is handed a shutdown token and must return
// once the token is cancelled. Shutting the pool down cancels every token and waits for all of
// them (including clones handed to tasks spawned by a job) to be dropped.
pub struct WorkerPool {
  shutdown_trigger: Mutex<Option<ComponentShutdownTrigger>>,
  jobs: Mutex<Vec<(String, JoinHandle<()>)>>,
  stats: Stats,
}

impl WorkerPool {
  #[must_use]
  pub fn new(scope: &Scope) -> Arc<Self> {
    let scope = scope.scope("worker_pool");
    Arc::new(Self {
      shutdown_trigger: Mutex::new(Some(ComponentShutdownTrigger::default())),
      jobs: Mutex::default(),
      stats: Stats {
        jobs_started: scope.counter("jobs_started"),
        jobs_finished: scope.counter("jobs_finished"),
        jobs_active: scope.gauge("jobs_active"),
      },
    })
  }

  pub fn execute_job<Fut: Future<Output = ()> + Send + 'static>(
    &self,
    name: &str,
    job: impl FnOnce(ComponentShutdown) -> Fut,
  ) -> Result<(), WorkerPoolError> {
    let shutdown = self
      .shutdown_trigger
      .lock()
      .as_ref()
      .ok_or(WorkerPoolError::ShutDown)?
      .make_shutdown();

    let job = job(shutdown);
    let name = name.to_string();
    let cloned_name = name.clone();
    let jobs_finished = self.stats.jobs_finished.clone();
    let auto_jobs_active = AutoGauge::new(self.stats.jobs_active.clone());
    self.stats.jobs_started.inc();
    let handle = tokio::spawn(async move {
      log::info!("worker pool job {cloned_name} started");
      job.await;
      log::info!("worker pool job {cloned_name} finished");
      jobs_finished.inc();
      drop(auto_jobs_active);
    });

    self.jobs.lock().push((name, handle));
    Ok(())
  }

  // Cancel all jobs and wait for them to complete. Subsequent calls are no-ops.
  pub async fn shutdown(&self) {
    let Some(shutdown_trigger) = self.shutdown_trigger.lock().take() else {
      return;
    };
    log::info!("shutting down worker pool");
    shutdown_trigger.shutdown().await;

    let jobs = std::mem::take(&mut *self.jobs.lock());
    for (name, handle) in jobs {
      if let Err(e) = handle.await {
        log::error!("worker pool job {name} did not complete cleanly: {e}");
      }
    }
    log::info!("worker pool shut down");
  }
}
