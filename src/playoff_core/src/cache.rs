//! Result cache the service consults before running a simulation.
//!
//! Caching is an optimization only. Every failure in here is reported as a
//! [`CacheError`] and the caller carries on computing.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::CacheError;

/// Operation names, also the prefix of every key
pub const CONFERENCE_STANDINGS: &str = "conference_standings";
pub const PLAYOFF_BRACKET: &str = "playoff_bracket";
pub const CHAMPIONSHIP_ODDS: &str = "championship_odds";

/// Operation name plus its parameters, serialized to canonical JSON.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    operation: String,
    params: String,
}

impl CacheKey {
    pub fn new<P: Serialize + ?Sized>(operation: &str, params: &P) -> Result<Self, CacheError> {
        Ok(CacheKey {
            operation: operation.to_string(),
            params: serde_json::to_string(params)?,
        })
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.params)
    }
}

pub trait ResultCache {
    /// A live entry for `key`, `None` when missing or expired
    fn fetch(&self, key: &CacheKey) -> Result<Option<Value>, CacheError>;

    fn store(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Drop every entry of `operation`, or everything when `None`.
    /// Returns the number of entries removed.
    fn invalidate(&self, operation: Option<&str>) -> Result<usize, CacheError>;
}

impl<C: ResultCache + ?Sized> ResultCache for &C {
    fn fetch(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        (**self).fetch(key)
    }

    fn store(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError> {
        (**self).store(key, value, ttl)
    }

    fn invalidate(&self, operation: Option<&str>) -> Result<usize, CacheError> {
        (**self).invalidate(operation)
    }
}

impl<C: ResultCache + ?Sized> ResultCache for Arc<C> {
    fn fetch(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        (**self).fetch(key)
    }

    fn store(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError> {
        (**self).store(key, value, ttl)
    }

    fn invalidate(&self, operation: Option<&str>) -> Result<usize, CacheError> {
        (**self).invalidate(operation)
    }
}

/// Always computes, never remembers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl ResultCache for NoCache {
    fn fetch(&self, _key: &CacheKey) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }

    fn store(&self, _key: &CacheKey, _value: Value, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn invalidate(&self, _operation: Option<&str>) -> Result<usize, CacheError> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    created_at: Instant,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OperationStats {
    pub count: usize,

    /// Age of the oldest and newest entry, in seconds
    pub oldest_age_secs: f64,
    pub newest_age_secs: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub operations: BTreeMap<String, OperationStats>,

    /// Serialized size of the cached values
    pub size_bytes: usize,
}

/// In-process cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove expired entries, returning how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read();
        let mut stats = CacheStats {
            total_entries: entries.len(),
            ..CacheStats::default()
        };

        for (key, entry) in entries.iter() {
            let age = now.saturating_duration_since(entry.created_at).as_secs_f64();
            let op = stats.operations.entry(key.operation.clone()).or_default();
            if op.count == 0 {
                op.oldest_age_secs = age;
                op.newest_age_secs = age;
            } else {
                op.oldest_age_secs = op.oldest_age_secs.max(age);
                op.newest_age_secs = op.newest_age_secs.min(age);
            }
            op.count += 1;
            stats.size_bytes += entry.value.to_string().len();
        }

        stats
    }
}

impl ResultCache for MemoryCache {
    fn fetch(&self, key: &CacheKey) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => {
                    debug!(
                        %key,
                        age_secs = now.saturating_duration_since(entry.created_at).as_secs_f64(),
                        "cache hit"
                    );
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: take the write lock and drop it, unless someone refreshed it meanwhile
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            debug!(%key, "cache entry expired");
        }
        Ok(None)
    }

    fn store(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| CacheError::Unavailable(format!("ttl of {}s is out of range", ttl.as_secs())))?;
        self.entries.write().insert(
            key.clone(),
            Entry {
                value,
                created_at: now,
                expires_at,
            },
        );
        debug!(%key, ttl_secs = ttl.as_secs(), "cached");
        Ok(())
    }

    fn invalidate(&self, operation: Option<&str>) -> Result<usize, CacheError> {
        let mut entries = self.entries.write();
        let removed = match operation {
            Some(op) => {
                let before = entries.len();
                entries.retain(|k, _| k.operation != op);
                before - entries.len()
            }
            None => {
                let removed = entries.len();
                entries.clear();
                removed
            }
        };
        info!(operation = operation.unwrap_or("*"), removed, "cache invalidated");
        Ok(removed)
    }
}
