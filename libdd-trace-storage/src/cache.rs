// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory service/operation cache.
//!
//! Answers `GetServices` and `GetOperations` without touching the
//! engine. The writer announces every (service, operation) pair it
//! commits; announcing a pair that is still live is a no-op, which is
//! what bounds cache churn for hot services. A background sweep evicts
//! expired entries so an idle store does not hold dead names forever.
//!
//! The mutex is never held across engine I/O.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

struct CachedService {
    deadline: Instant,
    operations: HashMap<String, Instant>,
}

type ServiceMap = HashMap<String, CachedService>;

/// TTL-bounded set of service names and their operation names.
pub struct CacheStore {
    inner: Arc<Mutex<ServiceMap>>,
    ttl: Duration,
    // Dropping the sender wakes the sweeper so it can exit.
    stop: Option<mpsc::Sender<()>>,
    sweeper: Option<thread::JoinHandle<()>>,
}

impl CacheStore {
    /// Creates the cache and starts its sweep task, which runs every
    /// `ttl / 2`.
    pub fn new(ttl: Duration) -> Self {
        let inner: Arc<Mutex<ServiceMap>> = Arc::new(Mutex::new(HashMap::new()));
        let (stop, stop_rx) = mpsc::channel::<()>();

        let sweep_map = Arc::clone(&inner);
        let interval = ttl / 2;
        let sweeper = thread::Builder::new()
            .name("trace-cache-sweeper".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let now = Instant::now();
                        let mut map = lock(&sweep_map);
                        evict_expired(&mut map, now);
                    }
                    _ => break,
                }
            })
            .ok();

        Self {
            inner,
            ttl,
            stop: Some(stop),
            sweeper,
        }
    }

    /// Announces a (service, operation) pair.
    ///
    /// A live entry is left untouched; an expired one is re-armed. A
    /// new operation under a live service refreshes only that
    /// operation, not the service deadline.
    pub fn update(&self, service: &str, operation: &str) {
        let now = Instant::now();
        let deadline = now + self.ttl;
        let mut map = lock(&self.inner);

        let entry = map
            .entry(service.to_string())
            .or_insert_with(|| CachedService {
                deadline,
                operations: HashMap::new(),
            });
        if entry.deadline <= now {
            entry.deadline = deadline;
        }
        let op_deadline = entry
            .operations
            .entry(operation.to_string())
            .or_insert(deadline);
        if *op_deadline <= now {
            *op_deadline = deadline;
        }
    }

    /// Announces a service without an operation; used by the cold-start
    /// warmer while it scans the service index.
    pub fn touch_service(&self, service: &str) {
        let now = Instant::now();
        let deadline = now + self.ttl;
        let mut map = lock(&self.inner);
        let entry = map
            .entry(service.to_string())
            .or_insert_with(|| CachedService {
                deadline,
                operations: HashMap::new(),
            });
        if entry.deadline <= now {
            entry.deadline = deadline;
        }
    }

    /// Live service names, sorted ascending.
    pub fn get_services(&self) -> Vec<String> {
        let now = Instant::now();
        let map = lock(&self.inner);
        let mut services: Vec<String> = map
            .iter()
            .filter(|(_, entry)| entry.deadline > now)
            .map(|(name, _)| name.clone())
            .collect();
        services.sort_unstable();
        services
    }

    /// Live operation names of one service, sorted ascending; empty
    /// when the service is unknown or expired.
    pub fn get_operations(&self, service: &str) -> Vec<String> {
        let now = Instant::now();
        let map = lock(&self.inner);
        let Some(entry) = map.get(service).filter(|e| e.deadline > now) else {
            return Vec::new();
        };
        let mut operations: Vec<String> = entry
            .operations
            .iter()
            .filter(|(_, deadline)| **deadline > now)
            .map(|(name, _)| name.clone())
            .collect();
        operations.sort_unstable();
        operations
    }

    #[cfg(test)]
    fn service_deadline(&self, service: &str) -> Option<Instant> {
        lock(&self.inner).get(service).map(|e| e.deadline)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.inner).len()
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.sweeper.take() {
            let _ = handle.join();
        }
    }
}

fn lock(map: &Mutex<ServiceMap>) -> std::sync::MutexGuard<'_, ServiceMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

fn evict_expired(map: &mut ServiceMap, now: Instant) {
    let before = map.len();
    map.retain(|_, entry| entry.deadline > now);
    for entry in map.values_mut() {
        entry.operations.retain(|_, deadline| *deadline > now);
    }
    if map.len() != before {
        debug!(evicted = before - map.len(), "cache sweep evicted services");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_deduplicated_output() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.update("svc-b", "op2");
        cache.update("svc-a", "op1");
        cache.update("svc-a", "op0");
        cache.update("svc-a", "op1");

        assert_eq!(cache.get_services(), vec!["svc-a", "svc-b"]);
        assert_eq!(cache.get_operations("svc-a"), vec!["op0", "op1"]);
        assert_eq!(cache.get_operations("unknown"), Vec::<String>::new());
    }

    #[test]
    fn live_entries_are_not_rearmed() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.update("svc", "op");
        let first = cache.service_deadline("svc").unwrap();

        cache.update("svc", "op");
        cache.update("svc", "other-op");
        assert_eq!(cache.service_deadline("svc").unwrap(), first);
        assert_eq!(cache.get_operations("svc"), vec!["op", "other-op"]);
    }

    #[test]
    fn expired_entries_disappear_from_reads() {
        let cache = CacheStore::new(Duration::from_millis(10));
        cache.update("svc", "op");
        std::thread::sleep(Duration::from_millis(20));

        assert!(cache.get_services().is_empty());
        assert!(cache.get_operations("svc").is_empty());

        // A write after expiry re-arms the entry.
        cache.update("svc", "op");
        assert_eq!(cache.get_services(), vec!["svc"]);
    }

    #[test]
    fn sweeper_evicts_in_the_background() {
        let cache = CacheStore::new(Duration::from_millis(20));
        cache.update("svc", "op");
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.len(), 0);
    }
}
