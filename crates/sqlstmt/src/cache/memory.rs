use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::CacheStore;
use crate::error::DbResult;

/// Bounded in-process cache with LRU eviction and per-entry expiry.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    capacity: usize,
    map: HashMap<String, Entry>,
    order: VecDeque<String>,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Number of stored entries, expired ones included until they are touched.
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

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, key: &str) -> Option<String> {
        let mut inner = self.lock();
        let now = Instant::now();
        let value = match inner.map.get(key) {
            Some(entry) if entry.is_live(now) => entry.value.clone(),
            Some(_) => {
                inner.map.remove(key);
                inner.remove_from_order(key);
                return None;
            }
            None => return None,
        };
        inner.touch(key);
        Some(value)
    }

    fn write(&self, key: &str, value: String, ttl: Option<Duration>) {
        let mut inner = self.lock();
        let entry = Entry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        if inner.map.insert(key.to_string(), entry).is_some() {
            inner.touch(key);
        } else {
            inner.order.push_back(key.to_string());
        }
        inner.evict_if_needed();
    }
}

impl MemoryStoreInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove_from_order(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key) {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}

impl CacheStore for MemoryStore {
    async fn has(&self, key: &str) -> DbResult<bool> {
        Ok(self.read(key).is_some())
    }

    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DbResult<()> {
        self.write(key, value, ttl);
        Ok(())
    }
}
