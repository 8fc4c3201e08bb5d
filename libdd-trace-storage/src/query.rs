// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structured trace query.
///
/// Zero/empty means "unset" for every field except the two time
/// bounds, which are mandatory. Timestamps and durations are
/// microseconds, matching the span model.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceQueryParameters {
    pub service_name: String,
    pub operation_name: String,
    /// Tag predicates; every entry must match some span of a returned
    /// trace. Requires `service_name`.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Inclusive lower bound on span start time. Required.
    pub start_time_min: u64,
    /// Inclusive upper bound on span start time. Required.
    pub start_time_max: u64,
    /// Inclusive lower bound on span duration.
    #[serde(default)]
    pub duration_min: u64,
    /// Inclusive upper bound on span duration; 0 means unbounded.
    #[serde(default)]
    pub duration_max: u64,
    /// Result cap; 0 selects the store's configured default.
    #[serde(default)]
    pub num_traces: usize,
}
