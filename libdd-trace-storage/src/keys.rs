// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! On-disk key schema.
//!
//! The key space is partitioned by a single-byte prefix tag. All
//! integers are emitted big-endian so that lexicographic byte order
//! equals numeric order, which is what makes prefix-and-time-bounded
//! scans and the trailing-slice tricks in the reader possible.
//!
//! Layouts (after the tag byte):
//!
//! | tag | layout |
//! |-----|--------|
//! | `0x80` primary   | traceID.high(8) ‖ traceID.low(8) ‖ startTime(8) ‖ spanID(8) ‖ spanHash(8) |
//! | `0x81` service   | service ‖ startTime(8) ‖ traceID(16) |
//! | `0x82` operation | service ‖ operation ‖ startTime(8) ‖ traceID(16) |
//! | `0x83` tag       | service ‖ tagKey ‖ tagValue ‖ startTime(8) ‖ traceID(16) |
//! | `0x84` duration  | duration(8) ‖ startTime(8) ‖ traceID(16) |
//!
//! String segments are concatenated without separators; every
//! secondary key ends in the fixed-width 24-byte
//! `startTime ‖ traceID` tail, so the variable part is always
//! `key[1..len-24]`.

use libdd_trace_model::{SpanId, TraceId};

/// Primary span rows.
pub const SPAN_KEY_PREFIX: u8 = 0x80;
/// Service name index.
pub const SERVICE_INDEX_KEY: u8 = 0x81;
/// Service + operation name index.
pub const OPERATION_INDEX_KEY: u8 = 0x82;
/// Service + tag key/value index.
pub const TAG_INDEX_KEY: u8 = 0x83;
/// Duration index; the only range-scanned index.
pub const DURATION_INDEX_KEY: u8 = 0x84;

/// Width of a serialized trace id.
pub const TRACE_ID_SIZE: usize = TraceId::SIZE;
/// Fixed tail of every secondary index key: startTime(8) ‖ traceID(16).
pub const INDEX_TAIL_SIZE: usize = 8 + TRACE_ID_SIZE;
/// Width of a primary key.
pub const PRIMARY_KEY_SIZE: usize = 1 + TRACE_ID_SIZE + 8 + 8 + 8;

fn push_be64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Builds the primary key for a span row.
pub fn primary_key(trace_id: TraceId, start_time: u64, span_id: SpanId, span_hash: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(PRIMARY_KEY_SIZE);
    key.push(SPAN_KEY_PREFIX);
    key.extend_from_slice(&trace_id.to_bytes());
    push_be64(&mut key, start_time);
    key.extend_from_slice(&span_id.to_bytes());
    push_be64(&mut key, span_hash);
    key
}

/// 17-byte seek prefix covering every span of one trace.
pub fn primary_seek_prefix(trace_id: TraceId) -> [u8; 1 + TRACE_ID_SIZE] {
    let mut prefix = [0u8; 1 + TRACE_ID_SIZE];
    prefix[0] = SPAN_KEY_PREFIX;
    prefix[1..].copy_from_slice(&trace_id.to_bytes());
    prefix
}

fn index_key(prefix: Vec<u8>, start_time: u64, trace_id: TraceId) -> Vec<u8> {
    let mut key = prefix;
    key.reserve(INDEX_TAIL_SIZE);
    push_be64(&mut key, start_time);
    key.extend_from_slice(&trace_id.to_bytes());
    key
}

/// Service index entry for one span.
pub fn service_index_key(service: &str, start_time: u64, trace_id: TraceId) -> Vec<u8> {
    index_key(service_seek_prefix(service), start_time, trace_id)
}

/// Service+operation index entry for one span.
pub fn operation_index_key(
    service: &str,
    operation: &str,
    start_time: u64,
    trace_id: TraceId,
) -> Vec<u8> {
    index_key(
        operation_seek_prefix(service, operation),
        start_time,
        trace_id,
    )
}

/// Tag index entry for one (service, tagKey, tagValue) triple.
pub fn tag_index_key(
    service: &str,
    tag_key: &str,
    tag_value: &[u8],
    start_time: u64,
    trace_id: TraceId,
) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(1 + service.len() + tag_key.len() + tag_value.len());
    prefix.push(TAG_INDEX_KEY);
    prefix.extend_from_slice(service.as_bytes());
    prefix.extend_from_slice(tag_key.as_bytes());
    prefix.extend_from_slice(tag_value);
    index_key(prefix, start_time, trace_id)
}

/// Duration index entry for one span.
pub fn duration_index_key(duration: u64, start_time: u64, trace_id: TraceId) -> Vec<u8> {
    index_key(duration_seek_bound(duration).to_vec(), start_time, trace_id)
}

/// Seek prefix for a service scan.
pub fn service_seek_prefix(service: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(1 + service.len());
    prefix.push(SERVICE_INDEX_KEY);
    prefix.extend_from_slice(service.as_bytes());
    prefix
}

/// Seek prefix for a service+operation scan.
pub fn operation_seek_prefix(service: &str, operation: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(1 + service.len() + operation.len());
    prefix.push(OPERATION_INDEX_KEY);
    prefix.extend_from_slice(service.as_bytes());
    prefix.extend_from_slice(operation.as_bytes());
    prefix
}

/// Seek prefix for a tag scan.
pub fn tag_seek_prefix(service: &str, tag_key: &str, tag_value: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(1 + service.len() + tag_key.len() + tag_value.len());
    prefix.push(TAG_INDEX_KEY);
    prefix.extend_from_slice(service.as_bytes());
    prefix.extend_from_slice(tag_key.as_bytes());
    prefix.extend_from_slice(tag_value.as_bytes());
    prefix
}

/// 9-byte duration range bound: tag ‖ duration(8).
pub fn duration_seek_bound(duration: u64) -> [u8; 9] {
    let mut bound = [0u8; 9];
    bound[0] = DURATION_INDEX_KEY;
    bound[1..].copy_from_slice(&duration.to_be_bytes());
    bound
}

/// Trailing 16 bytes of a secondary index key.
pub fn trailing_trace_id(key: &[u8]) -> Option<TraceId> {
    if key.len() < TRACE_ID_SIZE {
        return None;
    }
    TraceId::from_bytes(&key[key.len() - TRACE_ID_SIZE..])
}

/// Start time embedded in a secondary index key, the 8 bytes
/// immediately preceding the trace id tail.
pub fn embedded_start_time(key: &[u8]) -> Option<u64> {
    if key.len() < INDEX_TAIL_SIZE {
        return None;
    }
    let at = key.len() - INDEX_TAIL_SIZE;
    Some(u64::from_be_bytes(key[at..at + 8].try_into().ok()?))
}

/// Trace id of a primary key.
pub fn primary_trace_id(key: &[u8]) -> Option<TraceId> {
    if key.len() != PRIMARY_KEY_SIZE || key[0] != SPAN_KEY_PREFIX {
        return None;
    }
    TraceId::from_bytes(&key[1..1 + TRACE_ID_SIZE])
}

/// Start time of a primary key.
pub fn primary_start_time(key: &[u8]) -> Option<u64> {
    if key.len() != PRIMARY_KEY_SIZE || key[0] != SPAN_KEY_PREFIX {
        return None;
    }
    let at = 1 + TRACE_ID_SIZE;
    Some(u64::from_be_bytes(key[at..at + 8].try_into().ok()?))
}
