// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::ids::{SpanId, TraceId};
use crate::keyvalue::KeyValue;
use serde::{Deserialize, Serialize};

/// Span flag bit: the trace was sampled.
pub const FLAG_SAMPLED: u32 = 1;
/// Span flag bit: the trace was forced through debug sampling.
pub const FLAG_DEBUG: u32 = 2;

/// Kind of a link between two spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefType {
    ChildOf,
    FollowsFrom,
}

/// Typed link from one span to another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanRef {
    pub ref_type: RefType,
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

impl SpanRef {
    pub fn child_of(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            ref_type: RefType::ChildOf,
            trace_id,
            span_id,
        }
    }

    pub fn follows_from(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            ref_type: RefType::FollowsFrom,
            trace_id,
            span_id,
        }
    }
}

/// The process that emitted a span.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub service_name: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

impl Process {
    pub fn new(service_name: impl Into<String>, tags: Vec<KeyValue>) -> Self {
        Self {
            service_name: service_name.into(),
            tags,
        }
    }
}

/// Timestamped list of tag fields attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    /// Microseconds since the unix epoch.
    pub timestamp: u64,
    pub fields: Vec<KeyValue>,
}

/// A single unit of work within a trace.
///
/// Spans are immutable once written; `warnings` is the only field the
/// read path appends to, and only in the returned copy.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    /// Historical parent pointer. Superseded by `references`; kept for
    /// clients that still populate it.
    #[serde(default)]
    pub parent_span_id: Option<SpanId>,
    pub operation_name: String,
    #[serde(default)]
    pub references: Vec<SpanRef>,
    #[serde(default)]
    pub flags: u32,
    /// Microseconds since the unix epoch.
    pub start_time: u64,
    /// Microseconds.
    pub duration: u64,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    #[serde(default)]
    pub logs: Vec<Log>,
    pub process: Process,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Span {
    pub fn service_name(&self) -> &str {
        &self.process.service_name
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }

    /// Resolves the parent span id: the first child-of reference within
    /// the same trace wins, then the historical field.
    pub fn parent_id(&self) -> Option<SpanId> {
        self.references
            .iter()
            .find(|r| r.ref_type == RefType::ChildOf && r.trace_id == self.trace_id)
            .map(|r| r.span_id)
            .or(self.parent_span_id)
    }
}

/// Collection of spans sharing a trace id, in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub spans: Vec<Span>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Trace {
    pub fn new(spans: Vec<Span>) -> Self {
        Self {
            spans,
            warnings: Vec::new(),
        }
    }
}
