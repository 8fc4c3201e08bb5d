// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Post-read trace adjustments.
//!
//! Adjusters run on traces after they leave storage and before they
//! reach a caller. They are pure: they never consult the store.

use crate::span::Trace;

/// Warning attached to a span that lost at least one reference.
pub const INVALID_REFERENCE_WARNING: &str = "Invalid span reference removed";

/// Drops span references whose trace id is zero in both halves.
///
/// Clients occasionally emit references to the zero trace id when a
/// parent context failed to propagate. Such references can never be
/// resolved, so they are removed and the affected span gains one
/// [`INVALID_REFERENCE_WARNING`] warning regardless of how many
/// references were dropped.
pub fn adjust_span_references(trace: &mut Trace) {
    for span in &mut trace.spans {
        let before = span.references.len();
        span.references.retain(|r| !r.trace_id.is_zero());
        if span.references.len() != before {
            span.warnings.push(INVALID_REFERENCE_WARNING.to_string());
        }
    }
}
