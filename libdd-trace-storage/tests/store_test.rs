// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libdd_trace_model::{KeyValue, Log, Process, Span, SpanId, TraceId};
use libdd_trace_storage::{
    SpanStore, SpanStoreConfig, SpanStoreError, TraceQueryParameters,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const T0: u64 = 1_600_000_000_000_000;
const HOUR: u64 = 3_600_000_000;

fn open_store(dir: &tempfile::TempDir) -> SpanStore {
    SpanStore::open(dir.path(), SpanStoreConfig::default()).unwrap()
}

fn make_span(trace_low: u64, span_id: u64, start_time: u64) -> Span {
    Span {
        trace_id: TraceId::new(1, trace_low),
        span_id: SpanId(span_id),
        operation_name: "op".into(),
        start_time,
        duration: 1_000,
        tags: vec![KeyValue::string("key", "value")],
        logs: vec![Log {
            timestamp: start_time,
            fields: vec![KeyValue::string("event", "start")],
        }],
        process: Process::new("service", vec![]),
        ..Default::default()
    }
}

fn window_query() -> TraceQueryParameters {
    TraceQueryParameters {
        service_name: "service".into(),
        start_time_min: T0 - HOUR,
        start_time_max: T0 + HOUR,
        ..Default::default()
    }
}

#[test]
fn write_then_get_trace_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    let span = make_span(0, 0, T0);
    store.write_span(&span).unwrap();

    let trace = store.get_trace(&token, TraceId::new(1, 0)).unwrap().unwrap();
    assert_eq!(trace.spans.len(), 1);
    assert_eq!(trace.spans[0], span);

    assert!(store
        .get_trace(&token, TraceId::new(9, 9))
        .unwrap()
        .is_none());
}

#[test]
fn rewriting_an_identical_span_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    let span = make_span(0, 0, T0);
    store.write_span(&span).unwrap();
    store.write_span(&span).unwrap();

    let trace = store.get_trace(&token, TraceId::new(1, 0)).unwrap().unwrap();
    assert_eq!(trace.spans.len(), 1);

    let ids = store.find_trace_ids(&token, &window_query()).unwrap();
    assert_eq!(ids.len(), 1);
}

#[test]
fn services_and_operations_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let mut span = make_span(0, 0, T0);
    span.process.service_name = "zeta".into();
    span.operation_name = "b-op".into();
    store.write_span(&span).unwrap();

    span.trace_id = TraceId::new(1, 1);
    span.operation_name = "a-op".into();
    store.write_span(&span).unwrap();

    span.trace_id = TraceId::new(1, 2);
    span.process.service_name = "alpha".into();
    store.write_span(&span).unwrap();

    assert_eq!(store.get_services().unwrap(), vec!["alpha", "zeta"]);
    assert_eq!(store.get_operations("zeta").unwrap(), vec!["a-op", "b-op"]);
    assert!(store.get_operations("missing").unwrap().is_empty());
}

#[test]
fn tag_predicates_filter_traces() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    store.write_span(&make_span(0, 0, T0)).unwrap();
    let mut untagged = make_span(1, 0, T0 + 1_000);
    untagged.tags.clear();
    store.write_span(&untagged).unwrap();

    let mut query = window_query();
    query.tags = HashMap::from([("key".to_string(), "value".to_string())]);
    let ids = store.find_trace_ids(&token, &query).unwrap();
    assert_eq!(ids, vec![TraceId::new(1, 0)]);

    query.tags = HashMap::from([("key".to_string(), "other".to_string())]);
    assert!(store.find_trace_ids(&token, &query).unwrap().is_empty());
}

#[test]
fn duration_window_joins_against_the_other_indexes() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    let mut fast = make_span(0, 0, T0);
    fast.duration = 1_000;
    store.write_span(&fast).unwrap();

    let mut slow = make_span(1, 0, T0 + 1_000);
    slow.duration = 10_000;
    store.write_span(&slow).unwrap();

    let mut query = window_query();
    query.duration_min = 5_000;
    let ids = store.find_trace_ids(&token, &query).unwrap();
    assert_eq!(ids, vec![TraceId::new(1, 1)]);

    query.duration_min = 500;
    query.duration_max = 2_000;
    let ids = store.find_trace_ids(&token, &query).unwrap();
    assert_eq!(ids, vec![TraceId::new(1, 0)]);
}

#[test]
fn all_predicates_intersect() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    let matching = make_span(0, 0, T0);
    store.write_span(&matching).unwrap();

    let mut wrong_operation = make_span(1, 0, T0 + 1_000);
    wrong_operation.operation_name = "other-op".into();
    store.write_span(&wrong_operation).unwrap();

    let mut too_slow = make_span(2, 0, T0 + 2_000);
    too_slow.duration = 60_000;
    store.write_span(&too_slow).unwrap();

    let query = TraceQueryParameters {
        service_name: "service".into(),
        operation_name: "op".into(),
        tags: HashMap::from([("key".to_string(), "value".to_string())]),
        start_time_min: T0 - HOUR,
        start_time_max: T0 + HOUR,
        duration_min: 500,
        duration_max: 2_000,
        ..Default::default()
    };
    let ids = store.find_trace_ids(&token, &query).unwrap();
    assert_eq!(ids, vec![TraceId::new(1, 0)]);
}

#[test]
fn results_are_capped_and_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    for low in 0..5 {
        store
            .write_span(&make_span(low, 0, T0 + low * 1_000))
            .unwrap();
    }

    let mut query = window_query();
    query.num_traces = 2;
    let ids = store.find_trace_ids(&token, &query).unwrap();
    assert_eq!(ids, vec![TraceId::new(1, 4), TraceId::new(1, 3)]);

    // An oversize cap returns everything available.
    query.num_traces = 100;
    let ids = store.find_trace_ids(&token, &query).unwrap();
    assert_eq!(ids.len(), 5);
    assert!(ids.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn time_only_query_falls_back_to_a_range_scan() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    store.write_span(&make_span(0, 0, T0)).unwrap();
    store.write_span(&make_span(0, 1, T0 + 1_000)).unwrap();
    store.write_span(&make_span(7, 0, T0 + 2_000)).unwrap();
    // Outside the window; must not appear.
    store.write_span(&make_span(8, 0, T0 + 2 * HOUR)).unwrap();

    let query = TraceQueryParameters {
        start_time_min: T0 - HOUR,
        start_time_max: T0 + HOUR,
        ..Default::default()
    };

    // The id lookup itself reports the missing index...
    let err = store.find_trace_ids(&token, &query).unwrap_err();
    assert!(matches!(err, SpanStoreError::Unsupported));

    // ...and FindTraces degrades to the bounded primary scan.
    let traces = store.find_traces(&token, &query).unwrap();
    assert_eq!(traces.len(), 2);
    assert!(traces.iter().all(|t| !t.spans.is_empty()));
    let mut sizes: Vec<usize> = traces.iter().map(|t| t.spans.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2]);
}

#[test]
fn expired_spans_vanish_from_every_read() {
    let dir = tempfile::tempdir().unwrap();
    let store = SpanStore::open(
        dir.path(),
        SpanStoreConfig {
            retention: Duration::from_millis(50),
            ..Default::default()
        },
    )
    .unwrap();
    let token = CancellationToken::new();

    store.write_span(&make_span(0, 0, T0)).unwrap();
    assert!(store
        .get_trace(&token, TraceId::new(1, 0))
        .unwrap()
        .is_some());

    std::thread::sleep(Duration::from_millis(100));

    assert!(store
        .get_trace(&token, TraceId::new(1, 0))
        .unwrap()
        .is_none());
    assert!(store.find_trace_ids(&token, &window_query()).unwrap().is_empty());

    let purged = store
        .purge_expired(libdd_trace_model::time::now_micros())
        .unwrap();
    assert!(purged > 0);
    assert!(store
        .get_trace(&token, TraceId::new(1, 0))
        .unwrap()
        .is_none());
}

#[test]
fn cancellation_propagates_and_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store.write_span(&make_span(0, 0, T0)).unwrap();

    let token = CancellationToken::new();
    token.cancel();

    let err = store.find_traces(&token, &window_query()).unwrap_err();
    assert!(matches!(err, SpanStoreError::Cancelled));

    let err = store.get_trace(&token, TraceId::new(1, 0)).unwrap_err();
    assert!(matches!(err, SpanStoreError::Cancelled));
}

#[test]
fn adjuster_runs_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let token = CancellationToken::new();

    let mut span = make_span(0, 0, T0);
    span.references = vec![
        libdd_trace_model::SpanRef::child_of(TraceId::new(0, 1), SpanId(5)),
        libdd_trace_model::SpanRef::child_of(TraceId::new(0, 0), SpanId(6)),
    ];
    store.write_span(&span).unwrap();

    let trace = store.get_trace(&token, TraceId::new(1, 0)).unwrap().unwrap();
    assert_eq!(trace.spans[0].references.len(), 1);
    assert_eq!(
        trace.spans[0].warnings,
        vec!["Invalid span reference removed".to_string()]
    );
}
