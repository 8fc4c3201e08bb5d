// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Embedded single-node span store.
//!
//! Spans land in an ordered key/value engine under a primary row plus
//! four secondary indexes (service, service+operation, tag, duration),
//! all big-endian keyed so lexicographic order matches numeric order.
//! Queries are planned as index seeks whose sorted trace id outputs
//! are intersected with a linear sort-merge join before any span value
//! is fetched.
//!
//! ```no_run
//! use libdd_trace_storage::{SpanStore, SpanStoreConfig, TraceQueryParameters};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> libdd_trace_storage::Result<()> {
//! let store = SpanStore::open("/var/lib/trace-storage", SpanStoreConfig::default())?;
//! let token = CancellationToken::new();
//! let traces = store.find_traces(
//!     &token,
//!     &TraceQueryParameters {
//!         service_name: "checkout".into(),
//!         start_time_min: 1,
//!         start_time_max: u64::MAX,
//!         ..Default::default()
//!     },
//! )?;
//! # drop(traces);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod cache;
pub mod config;
pub mod encoding;
pub mod engine;
mod error;
pub mod keys;
pub mod query;
pub mod reader;
pub mod store;
pub mod writer;

pub use config::{SpanStoreConfig, DEFAULT_NUM_TRACES};
pub use encoding::Encoding;
pub use error::{Result, SpanStoreError};
pub use query::TraceQueryParameters;
pub use store::{DependencyRecorder, SpanReader, SpanStore, SpanStoreBuilder, SpanWriter};
