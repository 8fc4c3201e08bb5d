// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Adapter over the ordered key/value engine (fjall).
//!
//! This is the only module that touches the engine, and the only
//! concurrency boundary around it: higher layers hold an `Arc<KvEngine>`
//! and go through batches and read views exclusively.
//!
//! fjall stores plain byte values with no per-entry metadata, so the
//! adapter frames every value as
//! `[user_meta (1)] [expires_at BE (8)] [payload]`. Expiry is epoch
//! microseconds; expired entries are filtered on read and reclaimed by
//! [`KvEngine::purge_expired`].

use crate::error::{Result, SpanStoreError};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode, Snapshot};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const VALUE_HEADER_LEN: usize = 9;

const SPANS_PARTITION: &str = "spans";

/// One decoded entry handed to a scan visitor.
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub user_meta: u8,
    pub value: &'a [u8],
}

fn frame_value(user_meta: u8, expires_at: u64, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(VALUE_HEADER_LEN + payload.len());
    framed.push(user_meta);
    framed.extend_from_slice(&expires_at.to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

fn split_value(raw: &[u8]) -> Option<(u8, u64, &[u8])> {
    if raw.len() < VALUE_HEADER_LEN {
        return None;
    }
    let expires_at = u64::from_be_bytes(raw[1..VALUE_HEADER_LEN].try_into().ok()?);
    Some((raw[0], expires_at, &raw[VALUE_HEADER_LEN..]))
}

/// Handle on the underlying store. Cheap to share behind an `Arc`;
/// safe for concurrent use.
pub struct KvEngine {
    keyspace: Keyspace,
    spans: PartitionHandle,
}

impl KvEngine {
    /// Opens (or creates) the engine under `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let keyspace = fjall::Config::new(path).open()?;
        let spans = keyspace.open_partition(SPANS_PARTITION, PartitionCreateOptions::default())?;
        Ok(Self { keyspace, spans })
    }

    /// Starts a batch. Entries become visible atomically on commit.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            batch: self.keyspace.batch(),
            partition: &self.spans,
        }
    }

    /// Writes a single entry outside a batch. Test hook; the write
    /// path always goes through [`KvEngine::batch`].
    pub fn put(&self, key: &[u8], user_meta: u8, expires_at: u64, payload: &[u8]) -> Result<()> {
        self.spans
            .insert(key, frame_value(user_meta, expires_at, payload))?;
        Ok(())
    }

    /// Opens a snapshot read view. Reads through the view never observe
    /// writes committed after this call.
    pub fn view(&self) -> ReadView {
        ReadView {
            snapshot: self.spans.snapshot(),
            now: libdd_trace_model::time::now_micros(),
        }
    }

    /// Deletes every entry whose TTL has elapsed at `now` and returns
    /// how many were removed. Normal operation relies on read-side
    /// filtering; this hook exists for tests and manual maintenance.
    pub fn purge_expired(&self, now: u64) -> Result<usize> {
        let mut expired = Vec::new();
        for item in self.spans.iter() {
            let (key, raw) = item?;
            match split_value(&raw) {
                Some((_, expires_at, _)) if expires_at > now => {}
                _ => expired.push(key.to_vec()),
            }
        }
        for key in &expired {
            self.spans.remove(key.as_slice())?;
        }
        Ok(expired.len())
    }

    /// Flushes the journal to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

/// Batched, atomic writes.
pub struct WriteBatch<'a> {
    batch: fjall::Batch,
    partition: &'a PartitionHandle,
}

impl WriteBatch<'_> {
    /// Queues one entry.
    pub fn put(&mut self, key: &[u8], user_meta: u8, expires_at: u64, payload: &[u8]) {
        self.batch
            .insert(self.partition, key, frame_value(user_meta, expires_at, payload));
    }

    /// Commits every queued entry atomically.
    pub fn commit(self) -> Result<()> {
        self.batch.commit()?;
        Ok(())
    }
}

/// Snapshot read view.
///
/// The expiry cutoff is fixed when the view opens, so one read
/// operation sees a consistent picture even while entries age out.
pub struct ReadView {
    snapshot: Snapshot,
    now: u64,
}

impl ReadView {
    /// Point lookup. Absent and expired entries both read as `None`.
    pub fn get(&self, key: &[u8]) -> Result<Option<(u8, Vec<u8>)>> {
        let Some(raw) = self.snapshot.get(key)? else {
            return Ok(None);
        };
        let Some((user_meta, expires_at, payload)) = split_value(&raw) else {
            return Ok(None);
        };
        if expires_at <= self.now {
            return Ok(None);
        }
        Ok(Some((user_meta, payload.to_vec())))
    }

    /// Forward scan from `start`, in ascending key order.
    ///
    /// The visitor returns `Ok(true)` to keep scanning and `Ok(false)`
    /// to stop; its error aborts the scan. Expired entries are skipped
    /// before the visitor sees them. The cancellation token is checked
    /// at every step.
    pub fn scan_from<F>(&self, start: &[u8], token: &CancellationToken, mut visit: F) -> Result<()>
    where
        F: FnMut(Entry<'_>) -> Result<bool>,
    {
        if token.is_cancelled() {
            return Err(SpanStoreError::Cancelled);
        }
        for item in self.snapshot.range(start.to_vec()..) {
            if token.is_cancelled() {
                return Err(SpanStoreError::Cancelled);
            }
            let (key, raw) = item?;
            let Some((user_meta, expires_at, payload)) = split_value(&raw) else {
                warn!(key_len = key.len(), "skipping entry with truncated value header");
                continue;
            };
            if expires_at <= self.now {
                continue;
            }
            let keep_going = visit(Entry {
                key: &key,
                user_meta,
                value: payload,
            })?;
            if !keep_going {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_engine() -> (tempfile::TempDir, KvEngine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = KvEngine::open(dir.path()).unwrap();
        (dir, engine)
    }

    const FAR_FUTURE: u64 = u64::MAX;

    #[test]
    fn batch_round_trip() {
        let (_dir, engine) = open_engine();

        let mut batch = engine.batch();
        batch.put(b"a", 0x01, FAR_FUTURE, b"payload");
        batch.put(b"b", 0x02, FAR_FUTURE, b"");
        batch.commit().unwrap();

        let view = engine.view();
        assert_eq!(view.get(b"a").unwrap(), Some((0x01, b"payload".to_vec())));
        assert_eq!(view.get(b"b").unwrap(), Some((0x02, Vec::new())));
        assert_eq!(view.get(b"c").unwrap(), None);
    }

    #[test]
    fn expired_entries_are_invisible_and_purgeable() {
        let (_dir, engine) = open_engine();

        engine.put(b"old", 0, 1, b"x").unwrap();
        engine.put(b"new", 0, FAR_FUTURE, b"y").unwrap();

        let view = engine.view();
        assert_eq!(view.get(b"old").unwrap(), None);
        assert!(view.get(b"new").unwrap().is_some());

        let mut seen = Vec::new();
        view.scan_from(b"", &CancellationToken::new(), |entry| {
            seen.push(entry.key.to_vec());
            Ok(true)
        })
        .unwrap();
        assert_eq!(seen, vec![b"new".to_vec()]);

        let removed = engine
            .purge_expired(libdd_trace_model::time::now_micros())
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn scan_is_ordered_and_stoppable() {
        let (_dir, engine) = open_engine();
        for key in [&b"k3"[..], b"k1", b"k2", b"k4"] {
            engine.put(key, 0, FAR_FUTURE, b"").unwrap();
        }

        let view = engine.view();
        let mut seen = Vec::new();
        view.scan_from(b"k2", &CancellationToken::new(), |entry| {
            seen.push(entry.key.to_vec());
            Ok(entry.key != b"k3".as_slice())
        })
        .unwrap();
        assert_eq!(seen, vec![b"k2".to_vec(), b"k3".to_vec()]);
    }

    #[test]
    fn cancellation_aborts_scans() {
        let (_dir, engine) = open_engine();
        engine.put(b"k", 0, FAR_FUTURE, b"").unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let err = engine
            .view()
            .scan_from(b"", &token, |_| Ok(true))
            .unwrap_err();
        assert!(matches!(err, SpanStoreError::Cancelled));
    }

    #[test]
    fn snapshot_isolation() {
        let (_dir, engine) = open_engine();
        engine.put(b"k", 0, FAR_FUTURE, b"v1").unwrap();

        let view = engine.view();
        engine.put(b"k2", 0, FAR_FUTURE, b"v2").unwrap();

        assert!(view.get(b"k").unwrap().is_some());
        assert_eq!(view.get(b"k2").unwrap(), None);
    }
}
