// Copyright Trellis Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A capacity-bounded, expiring cache with single-flight builds.
//!
//! Concurrent misses for the same key converge on one build: the first
//! caller runs the builder while later callers block on the entry's
//! build lock and then read the published value. Misses on different
//! keys proceed independently. Entries expire a fixed interval after
//! they are written and the map is bounded by an entry count; eviction
//! is purely a resource-management decision, a later lookup simply
//! rebuilds. Failed builds are never cached.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::debug;

struct Slot<V> {
    build_lock: Mutex<()>,
    value: OnceLock<(V, Instant)>,
}

impl<V> Slot<V> {
    fn new() -> Slot<V> {
        Slot {
            build_lock: Mutex::new(()),
            value: OnceLock::new(),
        }
    }
}

struct Entry<V> {
    slot: Arc<Slot<V>>,
    last_access: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    access_counter: u64,
}

/// A concurrent cache of at most `capacity` entries, each live for `ttl`
/// from the time it was written.
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Constructs a cache bounded to `capacity` entries with the given
    /// time-to-live from write.
    pub fn new(capacity: usize, ttl: Duration) -> TtlCache<K, V> {
        TtlCache {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                access_counter: 0,
            }),
            capacity,
            ttl,
        }
    }

    /// Returns the cached value for `key`, building it with `build` on a
    /// miss. Concurrent calls for the same key run `build` exactly once;
    /// if it fails, nothing is cached and the error propagates to every
    /// caller that ran it.
    pub fn get_or_try_build<E, F>(&self, key: &K, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot_for(key);

        if let Some((value, _)) = slot.value.get() {
            return Ok(value.clone());
        }

        let _guard = slot.build_lock.lock().expect("poisoned");
        // A racing caller may have completed the build while this one
        // waited on the lock.
        if let Some((value, _)) = slot.value.get() {
            return Ok(value.clone());
        }

        match build() {
            Ok(value) => {
                let _ = slot.value.set((value.clone(), Instant::now()));
                self.enforce_capacity();
                Ok(value)
            }
            Err(e) => {
                let mut inner = self.inner.lock().expect("poisoned");
                if let Some(entry) = inner.entries.get(key) {
                    if Arc::ptr_eq(&entry.slot, &slot) {
                        inner.entries.remove(key);
                    }
                }
                Err(e)
            }
        }
    }

    /// Returns the cached value for `key` without building, if present
    /// and unexpired.
    pub fn get(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().expect("poisoned");
        let entry = inner.entries.get(key)?;
        match entry.slot.value.get() {
            Some((value, written_at)) if written_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Inserts a value directly, replacing any existing entry for `key`.
    pub fn insert(&self, key: K, value: V) {
        let slot = Slot::new();
        let _ = slot.value.set((value, Instant::now()));
        {
            let mut inner = self.inner.lock().expect("poisoned");
            inner.access_counter += 1;
            let last_access = inner.access_counter;
            inner.entries.insert(
                key,
                Entry {
                    slot: Arc::new(slot),
                    last_access,
                },
            );
        }
        self.enforce_capacity();
    }

    /// The number of entries currently resident, including in-flight
    /// builds.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned").entries.len()
    }

    /// Reports whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches (or installs) the slot for `key`, discarding an expired
    /// completed entry first.
    fn slot_for(&self, key: &K) -> Arc<Slot<V>> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.access_counter += 1;
        let last_access = inner.access_counter;

        let expired = match inner.entries.get(key) {
            Some(entry) => match entry.slot.value.get() {
                Some((_, written_at)) => written_at.elapsed() >= self.ttl,
                // An in-flight build is never expired.
                None => false,
            },
            None => return self.install(&mut inner, key, last_access),
        };
        if expired {
            inner.entries.remove(key);
            return self.install(&mut inner, key, last_access);
        }

        let entry = inner.entries.get_mut(key).expect("present");
        entry.last_access = last_access;
        Arc::clone(&entry.slot)
    }

    fn install(&self, inner: &mut Inner<K, V>, key: &K, last_access: u64) -> Arc<Slot<V>> {
        let slot = Arc::new(Slot::new());
        inner.entries.insert(
            key.clone(),
            Entry {
                slot: Arc::clone(&slot),
                last_access,
            },
        );
        slot
    }

    /// Evicts least-recently-accessed completed entries until the entry
    /// count fits the capacity. In-flight builds are never evicted.
    fn enforce_capacity(&self) {
        let mut inner = self.inner.lock().expect("poisoned");
        while inner.entries.len() > self.capacity {
            let victim = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.slot.value.get().is_some())
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    debug!("evicting cache entry past capacity {}", self.capacity);
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
