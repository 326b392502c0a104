// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::clients::store::{StoreClient, StoreError};
use crate::protos::metrics_data::{Field, FieldType, MetricsData, ValueRow};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use time::ext::NumericalStdDuration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

// Make a snapshot with `rows` value rows. Row contents encode the row index so that two snapshots
// for the same pair with different row counts are distinguishable.
#[must_use]
pub fn make_metrics_data(id: u64, metrics: &str, rows: usize) -> MetricsData {
  MetricsData {
    app: "linux".to_string(),
    fields: vec![
      Field {
        name: "instance".to_string(),
        field_type: FieldType::String,
        unit: String::new(),
        instance: true,
      },
      Field {
        name: "usage".to_string(),
        field_type: FieldType::Number,
        unit: "%".to_string(),
        instance: false,
      },
    ],
    ..MetricsData::new(
      id,
      metrics,
      (0 .. rows)
        .map(|i| ValueRow::new([format!("instance-{i}"), i.to_string()]))
        .collect(),
    )
  }
}

// Wait up to a second for a condition to become true.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
  timeout(1.std_seconds(), async {
    while !condition() {
      tokio::time::sleep(1.std_milliseconds()).await;
    }
  })
  .await
  .unwrap();
}

//
// FakeStoreClient
//

// In memory store with call counters, failure injection, and an optional gate that holds every
// write until the test releases a permit.
#[derive(Default)]
pub struct FakeStoreClient {
  data: Mutex<HashMap<(String, String), Bytes>>,
  fail_upsert_calls: Mutex<HashSet<usize>>,
  upsert_gate: Option<Arc<Semaphore>>,
  upsert_calls: AtomicUsize,
  completed_upserts: AtomicUsize,
  get_calls: AtomicUsize,
  close_calls: AtomicUsize,
  shutdown_calls: AtomicUsize,
  closed: AtomicBool,
}

impl FakeStoreClient {
  #[must_use]
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  // Every write waits for a permit from the returned semaphore, which starts with none.
  #[must_use]
  pub fn new_gated() -> (Arc<Self>, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    (
      Arc::new(Self {
        upsert_gate: Some(gate.clone()),
        ..Default::default()
      }),
      gate,
    )
  }

  // Fail the nth (0 based) upsert call.
  pub fn fail_upsert_call(&self, call: usize) {
    self.fail_upsert_calls.lock().insert(call);
  }

  pub fn upsert_calls(&self) -> usize {
    self.upsert_calls.load(Ordering::SeqCst)
  }

  pub fn completed_upserts(&self) -> usize {
    self.completed_upserts.load(Ordering::SeqCst)
  }

  pub fn get_calls(&self) -> usize {
    self.get_calls.load(Ordering::SeqCst)
  }

  pub fn close_calls(&self) -> usize {
    self.close_calls.load(Ordering::SeqCst)
  }

  pub fn shutdown_calls(&self) -> usize {
    self.shutdown_calls.load(Ordering::SeqCst)
  }

  pub fn stored(&self, key: &str, field: &str) -> Option<Bytes> {
    self
      .data
      .lock()
      .get(&(key.to_string(), field.to_string()))
      .cloned()
  }

  pub async fn wait_for_upsert_calls(&self, calls: usize) {
    wait_until(|| self.upsert_calls() >= calls).await;
  }

  pub async fn wait_for_completed_upserts(&self, upserts: usize) {
    wait_until(|| self.completed_upserts() >= upserts).await;
  }
}

#[async_trait]
impl StoreClient for FakeStoreClient {
  async fn upsert_field(&self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError> {
    let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.upsert_gate {
      gate.acquire().await.unwrap().forget();
    }

    let result = if self.closed.load(Ordering::SeqCst) {
      Err(StoreError::Closed)
    } else if self.fail_upsert_calls.lock().contains(&call) {
      Err(StoreError::Timeout)
    } else {
      Ok(
        self
          .data
          .lock()
          .insert((key.to_string(), field.to_string()), value)
          .is_none(),
      )
    };
    self.completed_upserts.fetch_add(1, Ordering::SeqCst);
    result
  }

  async fn get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
    self.get_calls.fetch_add(1, Ordering::SeqCst);
    if self.closed.load(Ordering::SeqCst) {
      return Err(StoreError::Closed);
    }
    Ok(self.stored(key, field))
  }

  async fn close(&self) -> Result<(), StoreError> {
    self.close_calls.fetch_add(1, Ordering::SeqCst);
    self.closed.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn shutdown(&self) -> Result<(), StoreError> {
    self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}
