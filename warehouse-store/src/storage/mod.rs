// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod real_time;

use crate::clients::store::StoreError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::worker_pool::WorkerPoolError;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
  // Fatal at startup. The hosting process decides whether to abort or run without the feature.
  #[error("configuration error: {0}")]
  Config(#[from] ConfigError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Codec(#[from] CodecError),
  #[error(transparent)]
  WorkerPool(#[from] WorkerPoolError),
  #[error("real time storage has already been started")]
  AlreadyStarted,
}
