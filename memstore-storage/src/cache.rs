//! Bounded LRU+TTL cache with hit accounting. Generic over a single value
//! type per instance — the facade holds one instance per namespace rather
//! than one polymorphic map.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    set_at: Instant,
    hit_count: u64,
}

struct Inner<V> {
    map: HashMap<String, Entry<V>>,
    /// Recency order, most-recently-used at the back.
    order: Vec<String>,
    total_hits: u64,
    total_misses: u64,
    total_sets: u64,
    total_deletes: u64,
}

/// `{size, max_size, hit_rate, total_hits, total_misses, total_sets, total_deletes}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_sets: u64,
    pub total_deletes: u64,
}

pub struct LruTtlCache<V> {
    max_size: usize,
    ttl: Duration,
    update_age_on_get: bool,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> LruTtlCache<V> {
    pub fn new(max_size: usize, ttl: Duration, update_age_on_get: bool) -> Self {
        Self {
            max_size,
            ttl,
            update_age_on_get,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: Vec::new(),
                total_hits: 0,
                total_misses: 0,
                total_sets: 0,
                total_deletes: 0,
            }),
        }
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.duration_since(entry.set_at) > self.ttl
    }

    fn touch(order: &mut Vec<String>, key: &str) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push(key.to_string());
    }

    /// Inserts or replaces `key`. Resets the hit count and refreshes recency.
    /// Evicts the least-recently-used entry if this insert would exceed `max_size`.
    pub fn set(&self, key: &str, value: V) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let now = Instant::now();

        let is_new = !inner.map.contains_key(key);
        inner.map.insert(
            key.to_string(),
            Entry {
                value,
                set_at: now,
                hit_count: 0,
            },
        );
        Self::touch(&mut inner.order, key);
        inner.total_sets += 1;

        if is_new && inner.map.len() > self.max_size {
            if let Some(victim) = inner.order.first().cloned() {
                inner.order.remove(0);
                inner.map.remove(&victim);
            }
        }
    }

    /// Returns the value, incrementing hit count and (if configured)
    /// refreshing recency. Expired or absent keys are a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let now = Instant::now();

        let expired = match inner.map.get(key) {
            Some(entry) => self.is_expired(entry, now),
            None => {
                inner.total_misses += 1;
                return None;
            }
        };

        if expired {
            inner.map.remove(key);
            if let Some(pos) = inner.order.iter().position(|k| k == key) {
                inner.order.remove(pos);
            }
            inner.total_misses += 1;
            return None;
        }

        let update_age = self.update_age_on_get;
        let value = {
            let entry = inner.map.get_mut(key).expect("checked above");
            entry.hit_count += 1;
            entry.value.clone()
        };
        if update_age {
            Self::touch(&mut inner.order, key);
        }
        inner.total_hits += 1;
        Some(value)
    }

    /// Like `get`, but never affects recency or hit count.
    pub fn peek(&self, key: &str) -> Option<V> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let entry = inner.map.get(key)?;
        if self.is_expired(entry, Instant::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Presence check without producing a hit/miss statistic.
    pub fn has(&self, key: &str) -> bool {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        match inner.map.get(key) {
            Some(entry) => !self.is_expired(entry, Instant::now()),
            None => false,
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let removed = inner.map.remove(key).is_some();
        if removed {
            if let Some(pos) = inner.order.iter().position(|k| k == key) {
                inner.order.remove(pos);
            }
            inner.total_deletes += 1;
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.map.clear();
        inner.order.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner.map.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner.map.values().map(|e| e.value.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(String, V)> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner
            .map
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Value plus `(timestamp, hit_count)`, ignoring expiry side effects.
    pub fn get_with_metadata(&self, key: &str) -> Option<(V, Instant, u64)> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let entry = inner.map.get(key)?;
        if self.is_expired(entry, Instant::now()) {
            return None;
        }
        Some((entry.value.clone(), entry.set_at, entry.hit_count))
    }

    /// Milliseconds remaining until expiry; 0 if expired or absent.
    pub fn get_remaining_ttl(&self, key: &str) -> u64 {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        match inner.map.get(key) {
            Some(entry) => {
                let elapsed = entry.set_at.elapsed();
                if elapsed >= self.ttl {
                    0
                } else {
                    (self.ttl - elapsed).as_millis() as u64
                }
            }
            None => 0,
        }
    }

    /// Drops all expired entries; returns the count removed.
    pub fn prune(&self) -> usize {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let now = Instant::now();
        let expired_keys: Vec<String> = inner
            .map
            .iter()
            .filter(|(_, e)| now.duration_since(e.set_at) > self.ttl)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired_keys {
            inner.map.remove(key);
            if let Some(pos) = inner.order.iter().position(|k| k == key) {
                inner.order.remove(pos);
            }
        }
        expired_keys.len()
    }

    /// Bulk-seeds entries via repeated `set`.
    pub fn warm_up(&self, entries: impl IntoIterator<Item = (String, V)>) {
        for (k, v) in entries {
            self.set(&k, v);
        }
    }

    /// Snapshot dump of `(key, value, set_at)` for every live entry.
    pub fn dump(&self) -> Vec<(String, V, Instant)> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        inner
            .map
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone(), e.set_at))
            .collect()
    }

    /// Restores a dump produced by `dump`, preserving original timestamps so
    /// TTL expiry is computed relative to the original `set_at`.
    pub fn load(&self, dump: Vec<(String, V, Instant)>) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        for (key, value, set_at) in dump {
            inner.order.retain(|k| k != &key);
            inner.order.push(key.clone());
            inner.map.insert(
                key,
                Entry {
                    value,
                    set_at,
                    hit_count: 0,
                },
            );
        }
    }

    /// Top-n entries by hit count, descending.
    pub fn get_top_hit_entries(&self, n: usize) -> Vec<(String, V, u64)> {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let mut all: Vec<(String, V, u64)> = inner
            .map
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone(), e.hit_count))
            .collect();
        all.sort_by(|a, b| b.2.cmp(&a.2));
        all.truncate(n);
        all
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let total = inner.total_hits + inner.total_misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            inner.total_hits as f64 / total as f64
        };
        CacheStats {
            size: inner.map.len(),
            max_size: self.max_size,
            hit_rate,
            total_hits: inner.total_hits,
            total_misses: inner.total_misses,
            total_sets: inner.total_sets,
            total_deletes: inner.total_deletes,
        }
    }
}
