//! Assembled-report cache
//!
//! Memoizes fully assembled evidence reports keyed by
//! (transaction hash, contract address, target-or-absent).
//!
//! Strategy:
//! - Entries carry their own expiry timestamp; expired entries are
//!   deleted on read.
//! - A backend that fails to open degrades to a disabled layer: reads
//!   return absent, writes are skipped, and the request proceeds
//!   without caching.

use crate::engine::EvidenceReport;
use rocksdb::{Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Default time-to-live for cached reports.
pub const DEFAULT_TTL_SECS: u64 = 3_600;

/// A cached report plus its absolute expiry.
#[derive(Serialize, Deserialize)]
struct CacheEntry {
    expires_at: u64,
    report: EvidenceReport,
}

/// RocksDB-backed TTL cache for assembled reports.
pub struct ReportCache {
    db: Option<DB>,
}

impl ReportCache {
    /// Open the cache at the given path.
    ///
    /// An open failure is not fatal: the cache degrades to a no-op
    /// layer and the condition is logged once.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        match DB::open(&opts, path.as_ref()) {
            Ok(db) => Self { db: Some(db) },
            Err(e) => {
                warn!(
                    "Cache unavailable at {:?} ({}); proceeding without caching",
                    path.as_ref(),
                    e
                );
                Self { db: None }
            }
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { db: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Look up a report; absent, undecodable, and expired entries all
    /// read as a miss.
    pub fn get(&self, key: &[u8]) -> Option<EvidenceReport> {
        self.get_at(key, unix_now())
    }

    /// Store a report with the given time-to-live. Failures are logged
    /// and swallowed; caching is advisory.
    pub fn put(&self, key: &[u8], report: &EvidenceReport, ttl_secs: u64) {
        self.put_at(key, report, ttl_secs, unix_now())
    }

    fn get_at(&self, key: &[u8], now: u64) -> Option<EvidenceReport> {
        let db = self.db.as_ref()?;

        let bytes = match db.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed: {}", e);
                return None;
            }
        };

        let entry: CacheEntry = match postcard::from_bytes(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding undecodable cache entry: {}", e);
                let _ = db.delete(key);
                return None;
            }
        };

        if entry.expires_at <= now {
            debug!("Cache entry expired at {}, now {}", entry.expires_at, now);
            let _ = db.delete(key);
            return None;
        }

        Some(entry.report)
    }

    fn put_at(&self, key: &[u8], report: &EvidenceReport, ttl_secs: u64, now: u64) {
        let Some(db) = self.db.as_ref() else {
            return;
        };

        let entry = CacheEntry {
            expires_at: now.saturating_add(ttl_secs),
            report: report.clone(),
        };
        let bytes = match postcard::to_allocvec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize cache entry: {}", e);
                return;
            }
        };

        if let Err(e) = db.put(key, bytes) {
            warn!("Cache write failed: {}", e);
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
