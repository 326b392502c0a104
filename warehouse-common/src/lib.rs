// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod config;

use bd_log::SwapLogger;
use bd_panic::PanicType;

#[cfg(test)]
#[ctor::ctor]
fn test_global_init() {
  global_initialize();
}

// Must be called once by the hosting process before any warehouse component is constructed.
pub fn global_initialize() {
  // Install the panic handler before the logger. A log emitted /w thread ids (always set by
  // SwapLogger) during ctor will otherwise panic.
  bd_panic::default(PanicType::ForceAbort);

  SwapLogger::initialize();
}
