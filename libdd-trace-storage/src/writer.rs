// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span ingest path.
//!
//! One `write_span` call commits the primary row and every secondary
//! index entry in a single engine batch, all carrying the same TTL, so
//! readers never observe an index pointing at a missing primary and
//! the engine reclaims a span and its index entries together.

use crate::cache::CacheStore;
use crate::config::SpanStoreConfig;
use crate::encoding::{encode_span, Encoding};
use crate::engine::KvEngine;
use crate::error::{Result, SpanStoreError};
use crate::keys;
use crate::store::DependencyRecorder;
use libdd_trace_model::time::{duration_micros, now_micros};
use libdd_trace_model::{KeyValue, Span};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stable 64-bit content hash of a span.
///
/// The hash is the last component of the primary key: retried writes
/// of identical content land on the same key, and spans that share
/// (trace, span id, start time) but differ in content get distinct
/// rows. Hashing runs over the canonical msgpack encoding so it does
/// not depend on the configured value encoding.
pub fn span_hash(span: &Span) -> Result<u64> {
    let canonical =
        rmp_serde::to_vec_named(span).map_err(|e| SpanStoreError::Serialize(e.to_string()))?;
    Ok(fnv1a64(&canonical))
}

/// Keeps high-cardinality tags out of the tag index.
struct TagIndexFilter {
    allow: HashSet<String>,
    deny: HashSet<String>,
}

impl TagIndexFilter {
    fn from_config(config: &SpanStoreConfig) -> Self {
        Self {
            allow: config.tag_index_allow.iter().cloned().collect(),
            deny: config.tag_index_deny.iter().cloned().collect(),
        }
    }

    // The allow list takes precedence; config validation guarantees the
    // two lists are never both populated.
    fn allows(&self, key: &str) -> bool {
        if !self.allow.is_empty() {
            return self.allow.contains(key);
        }
        !self.deny.contains(key)
    }
}

/// Span writer. Shares the engine and cache with the reader.
pub struct Writer {
    engine: Arc<KvEngine>,
    cache: Arc<CacheStore>,
    retention: Duration,
    encoding: Encoding,
    filter: TagIndexFilter,
    tags_indexed: bool,
    process_tags_indexed: bool,
    log_fields_indexed: bool,
    recorder: Option<Arc<dyn DependencyRecorder>>,
}

impl Writer {
    pub(crate) fn new(
        engine: Arc<KvEngine>,
        cache: Arc<CacheStore>,
        config: &SpanStoreConfig,
        recorder: Option<Arc<dyn DependencyRecorder>>,
    ) -> Self {
        Self {
            engine,
            cache,
            retention: config.retention,
            encoding: config.encoding,
            filter: TagIndexFilter::from_config(config),
            tags_indexed: config.tags_indexed,
            process_tags_indexed: config.process_tags_indexed,
            log_fields_indexed: config.log_fields_indexed,
            recorder,
        }
    }

    /// Persists one span: primary row, service/operation/tag/duration
    /// index entries, shared TTL, cache announcement.
    pub fn write_span(&self, span: &Span) -> Result<()> {
        let service = span.service_name();
        if service.is_empty() {
            return Err(SpanStoreError::ServiceNameNotSet);
        }

        let hash = span_hash(span)?;
        let payload = encode_span(span, self.encoding)?;
        let expires_at = now_micros() + duration_micros(self.retention);

        let trace_id = span.trace_id;
        let start = span.start_time;

        let mut batch = self.engine.batch();
        batch.put(
            &keys::primary_key(trace_id, start, span.span_id, hash),
            self.encoding.user_meta(),
            expires_at,
            &payload,
        );
        batch.put(
            &keys::service_index_key(service, start, trace_id),
            0,
            expires_at,
            &[],
        );
        batch.put(
            &keys::operation_index_key(service, &span.operation_name, start, trace_id),
            0,
            expires_at,
            &[],
        );
        for kv in self.indexable_tags(span) {
            batch.put(
                &keys::tag_index_key(service, &kv.key, &kv.value_bytes(), start, trace_id),
                0,
                expires_at,
                &[],
            );
        }
        batch.put(
            &keys::duration_index_key(span.duration, start, trace_id),
            0,
            expires_at,
            &[],
        );
        batch.commit()?;

        trace!(trace_id = %trace_id, span_id = %span.span_id, "span written");

        self.cache.update(service, &span.operation_name);
        if let Some(recorder) = &self.recorder {
            recorder.record(span);
        }
        Ok(())
    }

    fn indexable_tags<'a>(&'a self, span: &'a Span) -> impl Iterator<Item = &'a KeyValue> {
        let span_tags = self.tags_indexed.then_some(span.tags.iter());
        let process_tags = self
            .process_tags_indexed
            .then_some(span.process.tags.iter());
        let log_fields = self
            .log_fields_indexed
            .then(|| span.logs.iter().flat_map(|log| log.fields.iter()));

        span_tags
            .into_iter()
            .flatten()
            .chain(process_tags.into_iter().flatten())
            .chain(log_fields.into_iter().flatten())
            .filter(|kv| self.filter.allows(&kv.key))
    }
}
