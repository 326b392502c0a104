// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./metrics_data_test.rs"]
mod metrics_data_test;

use serde::{Deserialize, Serialize};

//
// Code
//

// Result of the collection that produced a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
  #[default]
  Success,
  Unavailable,
  UnReachable,
  UnConnectable,
  Fail,
  Timeout,
}

//
// FieldType
//

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
  #[default]
  Number,
  String,
}

//
// Field
//

// Column definition for the values of a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
  pub name: String,
  pub field_type: FieldType,
  #[serde(default)]
  pub unit: String,
  // Whether this column is part of the row's instance identity.
  #[serde(default)]
  pub instance: bool,
}

//
// ValueRow
//

// A single row of collected values, positional with respect to the snapshot's fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRow {
  pub columns: Vec<String>,
}

impl ValueRow {
  #[must_use]
  pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      columns: columns.into_iter().map(Into::into).collect(),
    }
  }
}

//
// MetricsData
//

/// One batch of measured values for one monitored entity and one metric set, produced at a point
/// in time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsData {
  /// Monitored entity id.
  pub id: u64,
  /// Type of the monitored application, e.g. "linux" or "mysql".
  #[serde(default)]
  pub app: String,
  /// Name of the metric set this snapshot belongs to.
  pub metrics: String,
  #[serde(default)]
  pub priority: u8,
  /// Collection time, epoch milliseconds.
  #[serde(default)]
  pub time: u64,
  #[serde(default)]
  pub code: Code,
  #[serde(default)]
  pub msg: String,
  #[serde(default)]
  pub fields: Vec<Field>,
  #[serde(default)]
  pub values: Vec<ValueRow>,
}

impl MetricsData {
  #[must_use]
  pub fn new(id: u64, metrics: impl Into<String>, values: Vec<ValueRow>) -> Self {
    Self {
      id,
      metrics: metrics.into(),
      values,
      ..Default::default()
    }
  }

  // A snapshot without values has nothing worth storing.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  // Outer store key: the entity id.
  #[must_use]
  pub fn store_key(&self) -> String {
    self.id.to_string()
  }

  // Inner store field: the metric set name.
  #[must_use]
  pub fn store_field(&self) -> &str {
    &self.metrics
  }
}
