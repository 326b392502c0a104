// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
  #[error("store connection is closed")]
  Closed,
  #[error("store operation timed out")]
  Timeout,
  #[error("invalid store address: {0}")]
  Address(String),
  #[error("redis error: {0}")]
  Redis(#[from] ::redis::RedisError),
}

//
// StoreClient
//

// Async client for a hash-like key/field store. Implementations must be safe to use concurrently
// from the write path and the read path without any external locking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreClient {
  /// Set `field` in the hash at `key` to `value`, replacing any previous value. Returns true if
  /// the field was created and false if it was replaced.
  async fn upsert_field(&self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError>;

  /// Get `field` in the hash at `key`, or None if it was never written.
  async fn get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError>;

  /// Release the connection. Calls after the first are no-ops. Once closed, reads and writes
  /// fail with [`StoreError::Closed`].
  async fn close(&self) -> Result<(), StoreError>;

  /// Release the underlying client resource. Calls after the first are no-ops.
  async fn shutdown(&self) -> Result<(), StoreError>;
}

pub type DynamicStoreClient = Arc<dyn StoreClient + Send + Sync + 'static>;
