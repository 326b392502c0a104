// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./redis_test.rs"]
mod redis_test;

use super::store::{StoreClient, StoreError};
use crate::config::RedisConnectInfo;
use ::redis::AsyncCommands;
use ::redis::aio::{ConnectionLike, MultiplexedConnection};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Future;
use parking_lot::Mutex;
use std::time::Duration;
use url::Url;

// Build the redis:// URL for a set of connection parameters. The password is percent-encoded as
// URL userinfo.
pub(crate) fn connection_url(info: &RedisConnectInfo) -> Result<Url, StoreError> {
  let mut url =
    Url::parse("redis://localhost").map_err(|e| StoreError::Address(e.to_string()))?;
  url
    .set_host(Some(&info.host))
    .map_err(|e| StoreError::Address(format!("{}: {e}", info.host)))?;
  url
    .set_port(Some(info.port))
    .map_err(|()| StoreError::Address(format!("invalid port {}", info.port)))?;
  if let Some(password) = &info.password {
    url
      .set_password(Some(password))
      .map_err(|()| StoreError::Address("unable to set password".to_string()))?;
  }
  Ok(url)
}

//
// RedisStoreClient
//

// Store client backed by a single Redis connection, by default a multiplexed connection. Each
// operation works on a clone of the connection, which shares the same underlying socket and is
// safe for concurrent use.
pub struct RedisStoreClient<C = MultiplexedConnection> {
  client: Mutex<Option<::redis::Client>>,
  connection: Mutex<Option<C>>,
  command_timeout: Duration,
}

impl RedisStoreClient {
  pub async fn connect(info: &RedisConnectInfo) -> Result<Self, StoreError> {
    let url = connection_url(info)?;
    let client = ::redis::Client::open(url.as_str())?;
    let connection = tokio::time::timeout(
      info.connect_timeout,
      client.get_multiplexed_async_connection(),
    )
    .await
    .map_err(|_| StoreError::Timeout)??;
    log::info!("connected to redis at {}:{}", info.host, info.port);

    Ok(Self {
      client: Mutex::new(Some(client)),
      connection: Mutex::new(Some(connection)),
      command_timeout: info.command_timeout,
    })
  }
}

impl<C: ConnectionLike + Clone + Send + Sync> RedisStoreClient<C> {
  // Wrap an already established connection. There is no owning client, so shutdown only has an
  // effect through close.
  #[must_use]
  pub fn new_with_connection(connection: C, command_timeout: Duration) -> Self {
    Self {
      client: Mutex::new(None),
      connection: Mutex::new(Some(connection)),
      command_timeout,
    }
  }

  fn connection(&self) -> Result<C, StoreError> {
    self.connection.lock().clone().ok_or(StoreError::Closed)
  }

  async fn with_timeout<T>(
    &self,
    command: impl Future<Output = ::redis::RedisResult<T>>,
  ) -> Result<T, StoreError> {
    Ok(
      tokio::time::timeout(self.command_timeout, command)
        .await
        .map_err(|_| StoreError::Timeout)??,
    )
  }
}

#[async_trait]
impl<C: ConnectionLike + Clone + Send + Sync + 'static> StoreClient for RedisStoreClient<C> {
  async fn upsert_field(&self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError> {
    let mut connection = self.connection()?;
    // HSET replies with the number of fields added, so 1 for a new field and 0 for a replace.
    let created: bool = self
      .with_timeout(connection.hset(key, field, value.to_vec()))
      .await?;
    Ok(created)
  }

  async fn get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
    let mut connection = self.connection()?;
    let value: Option<Vec<u8>> = self.with_timeout(connection.hget(key, field)).await?;
    Ok(value.map(Bytes::from))
  }

  async fn close(&self) -> Result<(), StoreError> {
    // Dropping the last clone of a multiplexed connection tears down its driver task. Writes that
    // are still in flight hold their own clone and finish first.
    if self.connection.lock().take().is_some() {
      log::debug!("redis connection closed");
    }
    Ok(())
  }

  async fn shutdown(&self) -> Result<(), StoreError> {
    if self.client.lock().take().is_some() {
      log::debug!("redis client shut down");
    }
    Ok(())
  }
}
