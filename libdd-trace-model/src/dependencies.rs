// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Service dependency links derived from materialized traces.
//!
//! Links are computed, never stored: a collaborator that wants
//! dependency data runs traces through [`derive`] on its own schedule.

use crate::ids::SpanId;
use crate::span::Trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One directed edge in the service dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLink {
    pub parent: String,
    pub child: String,
    pub call_count: u64,
    /// Epoch microseconds; supplied by the caller, typically the end of
    /// the derivation window.
    pub timestamp: u64,
}

/// Derives dependency links from a set of traces.
///
/// For every span whose parent resolves to a span of a different
/// service within the same trace, one call is counted on the
/// (parent service, child service) edge. Self links are skipped.
/// Output is sorted by (parent, child) for deterministic consumption.
pub fn derive(traces: &[Trace], timestamp: u64) -> Vec<DependencyLink> {
    let mut counts: HashMap<(String, String), u64> = HashMap::new();

    for trace in traces {
        let by_id: HashMap<SpanId, &str> = trace
            .spans
            .iter()
            .map(|s| (s.span_id, s.service_name()))
            .collect();

        for span in &trace.spans {
            let Some(parent_id) = span.parent_id() else {
                continue;
            };
            let Some(parent_service) = by_id.get(&parent_id) else {
                continue;
            };
            if *parent_service == span.service_name() {
                continue;
            }
            *counts
                .entry((parent_service.to_string(), span.service_name().to_string()))
                .or_insert(0) += 1;
        }
    }

    let mut links: Vec<DependencyLink> = counts
        .into_iter()
        .map(|((parent, child), call_count)| DependencyLink {
            parent,
            child,
            call_count,
            timestamp,
        })
        .collect();
    links.sort_by(|a, b| (&a.parent, &a.child).cmp(&(&b.parent, &b.child)));
    links
}
