//! Cache-aside storage for each owner's serialized transaction list.
//!
//! The cache holds, per owner, either the full ordered list as one
//! serialized blob or nothing at all. Writers invalidate instead of
//! patching: patching in place would have to re-derive the ordering, so
//! mutations simply drop the entry and let the next read repopulate it.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::database_id::OwnerId;

/// How long a cached list stays valid before readers must refetch.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors from the cache layer.
///
/// These never surface to callers of the ledger: the mutation service logs
/// them and carries on as if the lookup missed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    /// The cache lock was contended and the bounded wait gave up.
    #[error("the cache is busy")]
    Busy,

    /// The cache backend failed.
    #[error("the cache backend failed: {0}")]
    Backend(String),
}

/// Stores each owner's serialized transaction list with a time-to-live.
pub trait ListCache {
    /// The cached blob for `owner_id`, or `None` on a miss or an expired
    /// entry.
    fn get(&self, owner_id: OwnerId) -> Result<Option<String>, CacheError>;

    /// Cache `payload` for `owner_id`, replacing any previous entry.
    fn set(&self, owner_id: OwnerId, payload: String, ttl: Duration) -> Result<(), CacheError>;

    /// Drop the entry for `owner_id`, if any.
    fn invalidate(&self, owner_id: OwnerId) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

/// An in-process [ListCache] with lazy expiry.
///
/// Lookups use `try_lock`, so a contended cache degrades to a miss instead
/// of stalling the request that hit it.
#[derive(Debug, Default)]
pub struct InMemoryListCache {
    entries: Mutex<HashMap<OwnerId, CacheEntry>>,
}

impl InMemoryListCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListCache for InMemoryListCache {
    fn get(&self, owner_id: OwnerId) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.try_lock().map_err(|_| CacheError::Busy)?;

        match entries.get(&owner_id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.payload.clone())),
            Some(_) => {
                entries.remove(&owner_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, owner_id: OwnerId, payload: String, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.try_lock().map_err(|_| CacheError::Busy)?;

        entries.insert(
            owner_id,
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    fn invalidate(&self, owner_id: OwnerId) -> Result<(), CacheError> {
        let mut entries = self.entries.try_lock().map_err(|_| CacheError::Busy)?;
        entries.remove(&owner_id);

        Ok(())
    }
}

/// A [ListCache] that caches nothing.
///
/// Used when caching is disabled: every lookup misses and writes are
/// discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListCache;

impl ListCache for NoopListCache {
    fn get(&self, _owner_id: OwnerId) -> Result<Option<String>, CacheError> {
        Ok(None) // Always miss
    }

    fn set(&self, _owner_id: OwnerId, _payload: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(()) // Discard
    }

    fn invalidate(&self, _owner_id: OwnerId) -> Result<(), CacheError> {
        Ok(())
    }
}
