// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

//
// EnvOrInline
//

/// A secret that is either written inline in the config file or read from an environment
/// variable at load time.
///
/// ```yaml
/// password: hunter2
/// # or
/// password:
///   env_var: REDIS_PASSWORD
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvOrInline {
  EnvVar { env_var: String },
  Inline(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("environment variable {0} is not set")]
pub struct MissingEnvVar(pub String);

impl EnvOrInline {
  // Resolve to the secret value. An environment variable that is not set is an error so that a
  // typo in the config does not silently turn into "no credential".
  pub fn resolve(&self) -> Result<String, MissingEnvVar> {
    match self {
      Self::EnvVar { env_var } => {
        std::env::var(env_var).map_err(|_| MissingEnvVar(env_var.clone()))
      },
      Self::Inline(inline) => Ok(inline.clone()),
    }
  }
}

// Parse a YAML string into a config type.
pub fn yaml_to_config<T: DeserializeOwned>(yaml: &str) -> anyhow::Result<T> {
  Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_from_file<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
  let file_contents =
    std::fs::read_to_string(path).with_context(|| format!("can't read config file {path}"))?;
  let config =
    yaml_to_config(&file_contents).with_context(|| format!("can't parse config file {path}"))?;
  log::info!("loaded config file {path}");
  Ok(config)
}
