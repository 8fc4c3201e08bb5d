// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::encoding::Encoding;
use crate::error::{Result, SpanStoreError};
use std::time::Duration;

/// Default result cap applied when a query does not set `num_traces`.
pub const DEFAULT_NUM_TRACES: usize = 100;

/// Span store configuration.
///
/// The same retention governs the primary row and every secondary
/// index entry of a span, so the engine reclaims them together.
#[derive(Debug, Clone)]
pub struct SpanStoreConfig {
    /// How long spans stay queryable.
    pub retention: Duration,
    /// Value encoding applied to new writes. Reads auto-detect.
    pub encoding: Encoding,
    /// Lifetime of service/operation cache entries. Also the write
    /// cache TTL: re-announcing a live (service, operation) pair is a
    /// no-op, which throttles redundant cache churn on hot services.
    pub cache_ttl: Duration,
    /// When non-empty, only these tag keys are indexed. Mutually
    /// exclusive with `tag_index_deny`.
    pub tag_index_allow: Vec<String>,
    /// Tag keys excluded from the tag index; used to suppress
    /// high-cardinality tags.
    pub tag_index_deny: Vec<String>,
    /// Index span tags.
    pub tags_indexed: bool,
    /// Index process tags.
    pub process_tags_indexed: bool,
    /// Index log fields.
    pub log_fields_indexed: bool,
    /// Result cap substituted when a query leaves `num_traces` at 0.
    pub default_num_traces: usize,
}

impl Default for SpanStoreConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(72 * 3600),
            encoding: Encoding::Msgpack,
            cache_ttl: Duration::from_secs(72 * 3600),
            tag_index_allow: Vec::new(),
            tag_index_deny: Vec::new(),
            tags_indexed: true,
            process_tags_indexed: true,
            log_fields_indexed: true,
            default_num_traces: DEFAULT_NUM_TRACES,
        }
    }
}

impl SpanStoreConfig {
    /// Rejects configurations the store cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !self.tag_index_allow.is_empty() && !self.tag_index_deny.is_empty() {
            return Err(SpanStoreError::InvalidConfig(
                "tag index allow and deny lists are mutually exclusive".into(),
            ));
        }
        if self.retention.is_zero() {
            return Err(SpanStoreError::InvalidConfig(
                "span retention must be non-zero".into(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(SpanStoreError::InvalidConfig(
                "cache TTL must be non-zero".into(),
            ));
        }
        if self.default_num_traces == 0 {
            return Err(SpanStoreError::InvalidConfig(
                "default number of traces must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
