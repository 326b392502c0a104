// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use warehouse_common::config::{EnvOrInline, MissingEnvVar};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const fn default_connect_timeout() -> Duration {
  DEFAULT_CONNECT_TIMEOUT
}

const fn default_command_timeout() -> Duration {
  DEFAULT_COMMAND_TIMEOUT
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
  #[error("missing config section {0}, please configure it in the warehouse config file")]
  Missing(&'static str),
  #[error("store.redis.host must not be empty")]
  EmptyHost,
  #[error("store.redis.port must be between 1 and 65535")]
  InvalidPort,
  #[error("store.redis.{0} must be greater than zero")]
  ZeroTimeout(&'static str),
  #[error("store.redis.password: {0}")]
  Password(#[from] MissingEnvVar),
}

//
// WarehouseConfig
//

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
  #[serde(default)]
  pub store: Option<StoreConfig>,
  #[serde(default)]
  pub queue: QueueConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
  #[serde(default)]
  pub redis: Option<RedisConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
  // Absent means unbounded.
  #[serde(default)]
  pub max_len: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub host: Option<String>,
  #[serde(default)]
  pub port: Option<u16>,
  #[serde(default)]
  pub password: Option<EnvOrInline>,
  #[serde(default = "default_connect_timeout", with = "humantime_serde")]
  pub connect_timeout: Duration,
  #[serde(default = "default_command_timeout", with = "humantime_serde")]
  pub command_timeout: Duration,
}

impl Default for RedisConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      host: None,
      port: None,
      password: None,
      connect_timeout: DEFAULT_CONNECT_TIMEOUT,
      command_timeout: DEFAULT_COMMAND_TIMEOUT,
    }
  }
}

//
// RedisConnectInfo
//

// Fully validated Redis connection parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConnectInfo {
  pub host: String,
  pub port: u16,
  pub password: Option<String>,
  pub connect_timeout: Duration,
  pub command_timeout: Duration,
}

impl RedisConfig {
  pub fn validate(&self) -> Result<RedisConnectInfo, ConfigError> {
    let host = self
      .host
      .as_deref()
      .map(str::trim)
      .ok_or(ConfigError::Missing("store.redis.host"))?;
    if host.is_empty() {
      return Err(ConfigError::EmptyHost);
    }
    let port = self.port.ok_or(ConfigError::Missing("store.redis.port"))?;
    if port == 0 {
      return Err(ConfigError::InvalidPort);
    }
    if self.connect_timeout.is_zero() {
      return Err(ConfigError::ZeroTimeout("connect_timeout"));
    }
    if self.command_timeout.is_zero() {
      return Err(ConfigError::ZeroTimeout("command_timeout"));
    }

    // An empty password means no authentication.
    let password = self
      .password
      .as_ref()
      .map(EnvOrInline::resolve)
      .transpose()?
      .filter(|password| !password.is_empty());

    Ok(RedisConnectInfo {
      host: host.to_string(),
      port,
      password,
      connect_timeout: self.connect_timeout,
      command_timeout: self.command_timeout,
    })
  }
}

impl WarehouseConfig {
  pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
    warehouse_common::config::load_from_file(path)
  }

  // Whether real-time storage should be started at all. A missing section means disabled.
  #[must_use]
  pub fn redis_enabled(&self) -> bool {
    self
      .store
      .as_ref()
      .and_then(|store| store.redis.as_ref())
      .is_some_and(|redis| redis.enabled)
  }

  pub fn redis(&self) -> Result<RedisConnectInfo, ConfigError> {
    self
      .store
      .as_ref()
      .ok_or(ConfigError::Missing("store"))?
      .redis
      .as_ref()
      .ok_or(ConfigError::Missing("store.redis"))?
      .validate()
  }
}
