// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./codec_test.rs"]
mod codec_test;

use crate::protos::metrics_data::MetricsData;
use bytes::Bytes;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
  #[error("unable to encode metrics data: {0}")]
  Encode(serde_json::Error),
  #[error("unable to decode metrics data: {0}")]
  Decode(serde_json::Error),
}

//
// MetricsDataCodec
//

// Converts snapshots to and from the store's value representation. Keys and fields are plain
// UTF-8 strings and are not handled here.
pub struct MetricsDataCodec;

impl MetricsDataCodec {
  pub fn encode(data: &MetricsData) -> Result<Bytes, CodecError> {
    serde_json::to_vec(data)
      .map(Bytes::from)
      .map_err(CodecError::Encode)
  }

  pub fn decode(bytes: &[u8]) -> Result<MetricsData, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
  }
}
