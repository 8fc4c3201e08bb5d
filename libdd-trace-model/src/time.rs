// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Timestamp helpers. Every timestamp in the model and the store is a
//! `u64` count of microseconds since the unix epoch.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Converts a `SystemTime` to epoch microseconds. Times before the
/// epoch clamp to zero.
pub fn epoch_micros(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_micros() as u64
}

/// Current time in epoch microseconds.
pub fn now_micros() -> u64 {
    epoch_micros(SystemTime::now())
}

/// Converts a `Duration` to whole microseconds.
pub fn duration_micros(d: Duration) -> u64 {
    d.as_micros() as u64
}
