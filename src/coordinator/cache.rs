//! Bounded response cache.
//!
//! FIFO eviction, not LRU: entries are keyed by logical request, and
//! recency of insertion approximates recency of use here.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// What a hit returns.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub data: Value,
    pub source: Option<String>,
    pub aggregated: bool,
    pub confidence: f64,
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

struct CacheInner {
    map: HashMap<String, Entry>,
    order: VecDeque<String>,
}

pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let inner = self.lock();
        let entry = inner.map.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    pub fn insert(&self, key: String, response: CachedResponse) {
        let mut inner = self.lock();
        let now = Instant::now();
        if inner
            .map
            .insert(
                key.clone(),
                Entry {
                    response,
                    stored_at: now,
                },
            )
            .is_none()
        {
            inner.order.push_back(key);
        }
        while inner.map.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().expect("response cache poisoned")
    }
}
