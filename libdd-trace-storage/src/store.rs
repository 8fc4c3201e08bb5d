// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public read/write facade.
//!
//! Transports (gRPC, in-process, test harnesses) consume the
//! [`SpanWriter`] and [`SpanReader`] traits only; everything behind
//! them is owned by one [`SpanStore`] value. Multiple stores may
//! coexist in a process, each owning its cache and engine handle.

use crate::cache::CacheStore;
use crate::config::SpanStoreConfig;
use crate::engine::KvEngine;
use crate::error::Result;
use crate::keys;
use crate::query::TraceQueryParameters;
use crate::reader::TraceReader;
use crate::writer::Writer;
use libdd_trace_model::{Span, Trace, TraceId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Write half of the storage surface.
pub trait SpanWriter {
    fn write_span(&self, span: &Span) -> Result<()>;
}

/// Read half of the storage surface.
pub trait SpanReader {
    fn get_trace(&self, token: &CancellationToken, trace_id: TraceId) -> Result<Option<Trace>>;
    fn get_services(&self) -> Result<Vec<String>>;
    fn get_operations(&self, service: &str) -> Result<Vec<String>>;
    fn find_traces(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<Trace>>;
    fn find_trace_ids(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<TraceId>>;
}

/// Collaborator that derives dependency data from the write stream.
/// Invoked after every successful commit.
pub trait DependencyRecorder: Send + Sync {
    fn record(&self, span: &Span);
}

/// Configures and opens a [`SpanStore`].
pub struct SpanStoreBuilder {
    path: PathBuf,
    config: SpanStoreConfig,
    recorder: Option<Arc<dyn DependencyRecorder>>,
}

impl SpanStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: SpanStoreConfig::default(),
            recorder: None,
        }
    }

    pub fn config(mut self, config: SpanStoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dependency_recorder(mut self, recorder: Arc<dyn DependencyRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Validates the configuration, opens the engine, and warms the
    /// cache from the service and operation indexes.
    pub fn build(self) -> Result<SpanStore> {
        self.config.validate()?;
        let engine = Arc::new(KvEngine::open(&self.path)?);
        let cache = Arc::new(CacheStore::new(self.config.cache_ttl));
        warm_cache(&engine, &cache)?;

        let writer = Writer::new(
            Arc::clone(&engine),
            Arc::clone(&cache),
            &self.config,
            self.recorder,
        );
        let reader = TraceReader::new(
            Arc::clone(&engine),
            Arc::clone(&cache),
            self.config.default_num_traces,
        );
        Ok(SpanStore {
            engine,
            writer,
            reader,
        })
    }
}

/// Embedded single-node span store.
pub struct SpanStore {
    engine: Arc<KvEngine>,
    writer: Writer,
    reader: TraceReader,
}

impl SpanStore {
    pub fn builder(path: impl Into<PathBuf>) -> SpanStoreBuilder {
        SpanStoreBuilder::new(path)
    }

    /// Opens a store under `path` with the given configuration.
    pub fn open(path: impl Into<PathBuf>, config: SpanStoreConfig) -> Result<Self> {
        Self::builder(path).config(config).build()
    }

    pub fn write_span(&self, span: &Span) -> Result<()> {
        self.writer.write_span(span)
    }

    pub fn get_trace(&self, token: &CancellationToken, trace_id: TraceId) -> Result<Option<Trace>> {
        self.reader.get_trace(token, trace_id)
    }

    pub fn get_services(&self) -> Result<Vec<String>> {
        self.reader.get_services()
    }

    pub fn get_operations(&self, service: &str) -> Result<Vec<String>> {
        self.reader.get_operations(service)
    }

    pub fn find_traces(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<Trace>> {
        self.reader.find_traces(token, query)
    }

    pub fn find_trace_ids(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<TraceId>> {
        self.reader.find_trace_ids(token, query)
    }

    /// Deletes entries whose TTL elapsed before `now` (microseconds).
    /// Read paths already filter expired entries; this reclaims the
    /// space eagerly, mainly for tests.
    pub fn purge_expired(&self, now: u64) -> Result<usize> {
        self.engine.purge_expired(now)
    }

    /// Flushes the engine and consumes the store. The cache sweeper
    /// stops when its last owner drops.
    pub fn shutdown(self) -> Result<()> {
        self.engine.persist()
    }
}

impl SpanWriter for SpanStore {
    fn write_span(&self, span: &Span) -> Result<()> {
        SpanStore::write_span(self, span)
    }
}

impl SpanReader for SpanStore {
    fn get_trace(&self, token: &CancellationToken, trace_id: TraceId) -> Result<Option<Trace>> {
        SpanStore::get_trace(self, token, trace_id)
    }

    fn get_services(&self) -> Result<Vec<String>> {
        SpanStore::get_services(self)
    }

    fn get_operations(&self, service: &str) -> Result<Vec<String>> {
        SpanStore::get_operations(self, service)
    }

    fn find_traces(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<Trace>> {
        SpanStore::find_traces(self, token, query)
    }

    fn find_trace_ids(
        &self,
        token: &CancellationToken,
        query: &TraceQueryParameters,
    ) -> Result<Vec<TraceId>> {
        SpanStore::find_trace_ids(self, token, query)
    }
}

/// Rebuilds the service/operation cache from the index prefixes.
///
/// Services come from one pass over the service index; operations are
/// then scanned per service, which is what resolves the missing
/// separator between the service and operation segments of an
/// operation index key.
fn warm_cache(engine: &KvEngine, cache: &CacheStore) -> Result<()> {
    let token = CancellationToken::new();
    let view = engine.view();

    let mut services: Vec<String> = Vec::new();
    view.scan_from(&[keys::SERVICE_INDEX_KEY], &token, |entry| {
        let key = entry.key;
        if key.first() != Some(&keys::SERVICE_INDEX_KEY) {
            return Ok(false);
        }
        if key.len() < 1 + keys::INDEX_TAIL_SIZE {
            return Ok(true);
        }
        let split = key.len() - keys::INDEX_TAIL_SIZE;
        let service = String::from_utf8_lossy(&key[1..split]).into_owned();
        if services.last() != Some(&service) {
            services.push(service);
        }
        Ok(true)
    })?;

    for service in &services {
        cache.touch_service(service);

        let prefix = keys::operation_seek_prefix(service, "");
        let mut prev: Option<String> = None;
        view.scan_from(&prefix, &token, |entry| {
            let key = entry.key;
            if key.len() < 1 + keys::INDEX_TAIL_SIZE {
                return Ok(false);
            }
            let split = key.len() - keys::INDEX_TAIL_SIZE;
            if !key[..split].starts_with(&prefix) {
                return Ok(false);
            }
            let operation = String::from_utf8_lossy(&key[prefix.len()..split]).into_owned();
            if prev.as_ref() != Some(&operation) {
                cache.update(service, &operation);
                prev = Some(operation);
            }
            Ok(true)
        })?;
    }

    if !services.is_empty() {
        debug!(services = services.len(), "warmed cache from index scan");
    }
    Ok(())
}
