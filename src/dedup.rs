//! Deduplication ledger for outbound message content.
//!
//! Maps a message's content fingerprint to the first message id that
//! produced it, inside a TTL window. A hit is a warning channel, not a
//! guard: duplicates are annotated on the message record and processing
//! continues.
//!
//! The cache is an injected capability so tests run against the in-memory
//! implementation and production can swap in a distributed backend.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use uuid::Uuid;

/// Default TTL for fingerprint entries: 24 hours.
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

/// Default number of fingerprints retained.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Result of a check-and-record call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOutcome {
    pub is_duplicate: bool,
    /// Id of the first message seen with this fingerprint, when duplicate.
    pub first_message_id: Option<Uuid>,
}

impl DedupOutcome {
    fn fresh() -> Self {
        Self {
            is_duplicate: false,
            first_message_id: None,
        }
    }

    fn duplicate_of(first: Uuid) -> Self {
        Self {
            is_duplicate: true,
            first_message_id: Some(first),
        }
    }
}

/// Shared fingerprint cache consulted before every dispatch.
///
/// Implementations must make `check_and_record` atomic: two workers racing
/// on the same fingerprint must not both observe "not a duplicate".
pub trait DedupCache: Send + Sync {
    fn check_and_record(&self, fingerprint: &str, message_id: Uuid) -> DedupOutcome;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    first_message_id: Uuid,
    recorded_at: DateTime<Utc>,
}

/// In-memory TTL-expiring LRU implementation of [`DedupCache`].
pub struct InMemoryDedupCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl InMemoryDedupCache {
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Check-then-set under one lock acquisition.
    ///
    /// Expired entries are replaced as if absent; a repeat call with the
    /// original message id refreshes the entry without flagging it.
    fn check_and_record_at(
        &self,
        fingerprint: &str,
        message_id: Uuid,
        now: DateTime<Utc>,
    ) -> DedupOutcome {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");

        if let Some(entry) = entries.get(fingerprint) {
            if now - entry.recorded_at < self.ttl {
                if entry.first_message_id != message_id {
                    return DedupOutcome::duplicate_of(entry.first_message_id);
                }
                return DedupOutcome::fresh();
            }
        }

        entries.put(
            fingerprint.to_string(),
            Entry {
                first_message_id: message_id,
                recorded_at: now,
            },
        );
        DedupOutcome::fresh()
    }
}

impl Default for InMemoryDedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL_SECONDS)
    }
}

impl DedupCache for InMemoryDedupCache {
    fn check_and_record(&self, fingerprint: &str, message_id: Uuid) -> DedupOutcome {
        self.check_and_record_at(fingerprint, message_id, Utc::now())
    }
}
