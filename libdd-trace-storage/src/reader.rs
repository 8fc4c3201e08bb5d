// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Read path: trace lookup and the query planner.
//!
//! A query is translated into a set of index seeks. Each seek is a
//! prefix-and-time-bounded scan over one secondary index; because the
//! engine iterates keys in ascending byte order and every index key
//! ends in the trace id, each seek yields a sorted trace id list. The
//! lists are intersected with a linear sort-merge join, ranked, and
//! only then materialized from the primary rows.

use crate::cache::CacheStore;
use crate::encoding::decode_span;
use crate::engine::KvEngine;
use crate::error::{Result, SpanStoreError};
use crate::keys;
use crate::query::TraceQueryParameters;
use libdd_trace_model::adjuster::adjust_span_references;
use libdd_trace_model::{Span, Trace, TraceId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Trace reader over the shared engine and cache.
pub struct TraceReader {
    engine: Arc<KvEngine>,
    cache: Arc<CacheStore>,
    default_num_traces: usize,
}

impl TraceReader {
    pub(crate) fn new(
        engine: Arc<KvEngine>,
        cache: Arc<CacheStore>,
        default_num_traces: usize,
    ) -> Self {
        Self {
            engine,
            cache,
            default_num_traces,
        }
    }

    /// Fetches every span stored under `trace_id`, in engine order.
    /// `None` when the trace does not exist.
    pub fn get_trace(
        &self,
        token: &CancellationToken,
        trace_id: TraceId,
    ) -> Result<Option<Trace>> {
        let traces = self.get_traces(token, &[trace_id])?;
        Ok(traces.into_iter().next())
    }

    /// Known service names, sorted. Served from the cache.
    pub fn get_services(&self) -> Result<Vec<String>> {
        Ok(self.cache.get_services())
    }

    /// Known operation names of `service`, sorted; empty for unknown
    /// services. Served from the cache.
    pub fn get_operations(&self, service: &str) -> Result<Vec<String>> {
        Ok(self.cache.get_operations(service))
    }

    /// Runs the planner and returns matching trace ids, newest-first
    /// in scan order, capped at the query's `num_traces`.
    pub fn find_trace_ids(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<TraceId>> {
        validate_query(query)?;
        let num_traces = if query.num_traces == 0 {
            self.default_num_traces
        } else {
            query.num_traces
        };

        let mut id_sets: Vec<Vec<TraceId>> = Vec::new();
        for seek in plan_index_seeks(query) {
            id_sets.push(self.scan_index_keys(
                &seek,
                token,
                query.start_time_min,
                query.start_time_max,
            )?);
        }

        // The duration index is the only range-scanned one; it joins in
        // as one more sorted input.
        if query.duration_min != 0 || query.duration_max != 0 {
            id_sets.push(self.scan_duration_index(
                query.duration_min,
                query.duration_max,
                token,
                query.start_time_min,
                query.start_time_max,
            )?);
        }

        if id_sets.is_empty() {
            return Err(SpanStoreError::Unsupported);
        }

        let merged = id_sets
            .into_iter()
            .reduce(|left, right| merge_join(&left, &right))
            .unwrap_or_default();
        Ok(rank(merged, num_traces))
    }

    /// `find_trace_ids` followed by materialization. When no index
    /// applies but the mandatory time window is present, degrades to a
    /// bounded scan of the primary rows.
    pub fn find_traces(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<Trace>> {
        match self.find_trace_ids(token, query) {
            Ok(ids) => self.get_traces(token, &ids),
            Err(SpanStoreError::Unsupported)
                if query.start_time_min != 0 && query.start_time_max != 0 =>
            {
                debug!("no usable index for query; scanning primary time range");
                self.scan_time_range(token, query.start_time_min, query.start_time_max)
            }
            Err(e) => Err(e),
        }
    }

    /// Materializes traces by their primary prefixes. Trace ids without
    /// live spans are dropped; a returned trace always has at least one
    /// span.
    fn get_traces(&self, token: &CancellationToken, ids: &[TraceId]) -> Result<Vec<Trace>> {
        let view = self.engine.view();
        let mut traces = Vec::with_capacity(ids.len());
        for id in ids {
            let prefix = keys::primary_seek_prefix(*id);
            let mut spans = Vec::with_capacity(32);
            view.scan_from(&prefix, token, |entry| {
                if !entry.key.starts_with(&prefix) {
                    return Ok(false);
                }
                spans.push(decode_span(entry.value, entry.user_meta)?);
                Ok(true)
            })?;
            if !spans.is_empty() {
                traces.push(finish_trace(spans));
            }
        }
        Ok(traces)
    }

    /// One prefix-and-time-bounded index seek.
    ///
    /// Positions the iterator at `prefix ‖ be64(start_time_min)` and
    /// walks forward while the key still matches. The non-tail part of
    /// a key is compared exactly against the prefix because string
    /// segments have no separators: a scan for "service1" also visits
    /// "service12" keys, whose embedded timestamps still parse
    /// correctly thanks to the fixed-width tail.
    fn scan_index_keys(
        &self,
        prefix: &[u8],
        token: &CancellationToken,
        start_time_min: u64,
        start_time_max: u64,
    ) -> Result<Vec<TraceId>> {
        let mut start = Vec::with_capacity(prefix.len() + 8);
        start.extend_from_slice(prefix);
        start.extend_from_slice(&start_time_min.to_be_bytes());

        let view = self.engine.view();
        let mut ids: Vec<TraceId> = Vec::new();
        let mut prev: Option<TraceId> = None;
        view.scan_from(&start, token, |entry| {
            let key = entry.key;
            if key.len() < 1 + keys::INDEX_TAIL_SIZE {
                return Ok(false);
            }
            let split = key.len() - keys::INDEX_TAIL_SIZE;
            if !key[..split].starts_with(prefix) {
                return Ok(false);
            }
            let Some(ts) = keys::embedded_start_time(key) else {
                return Ok(false);
            };
            if ts > start_time_max {
                return Ok(false);
            }
            if &key[..split] == prefix {
                if let Some(id) = keys::trailing_trace_id(key) {
                    // Adjacent duplicates come from one trace emitting
                    // several spans in the same index bucket.
                    if prev != Some(id) {
                        ids.push(id);
                        prev = Some(id);
                    }
                }
            }
            Ok(true)
        })?;

        // Seek output is ordered by (timestamp, trace id), so one trace
        // can still appear under several timestamps.
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Range seek over the duration index, bounded by the start-time
    /// window through a post-filter on the embedded timestamp. Not
    /// unique per trace id, so duplicates go through a set.
    fn scan_duration_index(
        &self,
        duration_min: u64,
        duration_max: u64,
        token: &CancellationToken,
        start_time_min: u64,
        start_time_max: u64,
    ) -> Result<Vec<TraceId>> {
        let duration_max = if duration_max == 0 {
            u64::MAX
        } else {
            duration_max
        };
        let end_bound = keys::duration_seek_bound(duration_max);
        let mut start = keys::duration_seek_bound(duration_min).to_vec();
        start.extend_from_slice(&start_time_min.to_be_bytes());

        let view = self.engine.view();
        let mut unique: HashSet<TraceId> = HashSet::new();
        view.scan_from(&start, token, |entry| {
            let key = entry.key;
            if key.len() < end_bound.len() || key[..end_bound.len()] > end_bound[..] {
                return Ok(false);
            }
            let Some(ts) = keys::embedded_start_time(key) else {
                return Ok(false);
            };
            if ts >= start_time_min && ts <= start_time_max {
                if let Some(id) = keys::trailing_trace_id(key) {
                    unique.insert(id);
                }
            }
            Ok(true)
        })?;

        let mut ids: Vec<TraceId> = unique.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Full scan of the primary rows between the two time bounds,
    /// grouping consecutive spans by trace id. Only used when no index
    /// applies.
    fn scan_time_range(
        &self,
        token: &CancellationToken,
        start_time_min: u64,
        start_time_max: u64,
    ) -> Result<Vec<Trace>> {
        let view = self.engine.view();
        let start = [keys::SPAN_KEY_PREFIX];

        let mut grouped: Vec<Vec<Span>> = Vec::new();
        let mut spans: Vec<Span> = Vec::new();
        let mut prev: Option<TraceId> = None;
        view.scan_from(&start, token, |entry| {
            let key = entry.key;
            if key.first() != Some(&keys::SPAN_KEY_PREFIX) {
                return Ok(false);
            }
            let (Some(trace_id), Some(ts)) =
                (keys::primary_trace_id(key), keys::primary_start_time(key))
            else {
                return Ok(true);
            };
            if ts < start_time_min || ts > start_time_max {
                return Ok(true);
            }
            let span = decode_span(entry.value, entry.user_meta)?;
            if prev != Some(trace_id) && !spans.is_empty() {
                grouped.push(std::mem::take(&mut spans));
            }
            spans.push(span);
            prev = Some(trace_id);
            Ok(true)
        })?;
        if !spans.is_empty() {
            grouped.push(spans);
        }

        Ok(grouped.into_iter().map(finish_trace).collect())
    }
}

fn finish_trace(spans: Vec<Span>) -> Trace {
    let mut trace = Trace::new(spans);
    adjust_span_references(&mut trace);
    trace
}

/// Builds the unique-index seek prefixes implied by a query. Tags
/// require a service name, which validation has already enforced.
fn plan_index_seeks(query: &TraceQueryParameters) -> Vec<Vec<u8>> {
    let mut seeks = Vec::new();
    if !query.service_name.is_empty() {
        if !query.operation_name.is_empty() {
            seeks.push(keys::operation_seek_prefix(
                &query.service_name,
                &query.operation_name,
            ));
        } else {
            seeks.push(keys::service_seek_prefix(&query.service_name));
        }
        for (key, value) in &query.tags {
            seeks.push(keys::tag_seek_prefix(&query.service_name, key, value));
        }
    }
    seeks
}

/// Fails fast on queries the planner cannot honor. Runs before any
/// I/O.
fn validate_query(query: &TraceQueryParameters) -> Result<()> {
    if *query == TraceQueryParameters::default() {
        return Err(SpanStoreError::MalformedRequest);
    }
    if query.service_name.is_empty() && !query.tags.is_empty() {
        return Err(SpanStoreError::ServiceNameNotSet);
    }
    if query.service_name.is_empty() && !query.operation_name.is_empty() {
        return Err(SpanStoreError::ServiceNameNotSet);
    }
    if query.start_time_min == 0 || query.start_time_max == 0 {
        return Err(SpanStoreError::StartAndEndTimeNotSet);
    }
    if query.start_time_max < query.start_time_min {
        return Err(SpanStoreError::StartTimeMinGreaterThanMax);
    }
    if query.duration_min != 0 && query.duration_max != 0 && query.duration_min > query.duration_max
    {
        return Err(SpanStoreError::DurationMinGreaterThanMax);
    }
    Ok(())
}

/// Linear intersection of two sorted lists.
fn merge_join<T: Ord + Copy>(left: &[T], right: &[T]) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len().min(right.len()));
    let (mut l, mut r) = (0, 0);
    while l < left.len() && r < right.len() {
        match left[l].cmp(&right[r]) {
            std::cmp::Ordering::Equal => {
                merged.push(left[l]);
                l += 1;
                r += 1;
            }
            std::cmp::Ordering::Less => l += 1,
            std::cmp::Ordering::Greater => r += 1,
        }
    }
    merged
}

/// Keeps the last `num_traces` ids of the ascending merge output and
/// reverses, so callers see newest-first by trace id order as observed
/// by the scans. Empty input stays empty; an oversize cap returns
/// everything.
fn rank(mut merged: Vec<TraceId>, num_traces: usize) -> Vec<TraceId> {
    if num_traces < merged.len() {
        merged.drain(..merged.len() - num_traces);
    }
    merged.reverse();
    merged
}
