// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Data model for distributed-tracing spans.
//!
//! This crate defines the span types persisted by `libdd-trace-storage`
//! and consumed by query transports: identifiers, spans and their typed
//! tags, traces, derived dependency links, and the post-read adjuster
//! that repairs malformed span references.
//!
//! All types are plain serde-serializable data; nothing in this crate
//! performs I/O.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod adjuster;
pub mod dependencies;
mod ids;
mod keyvalue;
mod span;
pub mod time;

pub use dependencies::DependencyLink;
pub use ids::{SpanId, TraceId};
pub use keyvalue::{KeyValue, TagValue};
pub use span::{Log, Process, RefType, Span, SpanRef, Trace, FLAG_DEBUG, FLAG_SAMPLED};
