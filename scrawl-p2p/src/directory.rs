//! Known-peer directory.
//!
//! One record per distinct url, refreshed on every hello or gossip
//! sighting. Records are never removed: a permanently dead peer keeps
//! being retried by the gossip scheduler. That unbounded retention is a
//! known limitation of the protocol, not an oversight here.

use std::collections::HashMap;

/// A known peer endpoint and when it was last sighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub url: String,
    /// Unix timestamp in milliseconds of the last hello/gossip sighting.
    pub last_seen: u64,
}

/// Directory of known peer endpoints, owned by the node event loop.
#[derive(Debug, Default)]
pub struct PeerDirectory {
    records: HashMap<String, PeerRecord>,
}

impl PeerDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record for `url` or refresh its last-seen time.
    pub fn upsert(&mut self, url: &str, now_ms: u64) {
        self.records
            .entry(url.to_string())
            .and_modify(|record| record.last_seen = record.last_seen.max(now_ms))
            .or_insert_with(|| {
                tracing::debug!(%url, "Learned new peer");
                PeerRecord {
                    url: url.to_string(),
                    last_seen: now_ms,
                }
            });
    }

    /// All known urls.
    pub fn known_urls(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Look up a record.
    pub fn get(&self, url: &str) -> Option<&PeerRecord> {
        self.records.get(url)
    }

    /// Whether `url` is known.
    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
