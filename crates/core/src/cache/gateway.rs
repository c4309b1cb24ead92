//! Cache gateway with read-triggered expiry.
//!
//! The extraction pipeline talks to the cache only through [`MetadataCache`].
//! [`CacheGateway`] implements it over [`CacheDb`]: a lookup that finds a
//! record older than the retention window deletes it and reports a miss.
//! There is no background sweep.

use super::connection::CacheDb;
use super::records::CacheRecord;
use crate::{AppConfig, Error};
use chrono::{DateTime, Utc};

/// Get/put contract for previously computed previews, keyed by URL.
#[async_trait::async_trait]
pub trait MetadataCache: Send + Sync {
    /// Return the live record for `url`, or `None` if absent or expired.
    async fn lookup(&self, url: &str) -> Result<Option<CacheRecord>, Error>;

    /// Upsert `record`, keyed by its URL.
    async fn store(&self, record: &CacheRecord) -> Result<(), Error>;
}

/// SQLite-backed [`MetadataCache`] with a fixed retention window.
#[derive(Clone, Debug)]
pub struct CacheGateway {
    db: CacheDb,
    retention: chrono::Duration,
}

impl CacheGateway {
    /// Create a gateway using the retention window from `config`.
    pub fn new(db: CacheDb, config: &AppConfig) -> Self {
        Self::with_retention(db, config.cache_retention())
    }

    /// Create a gateway with an explicit retention window.
    pub fn with_retention(db: CacheDb, retention: chrono::Duration) -> Self {
        Self { db, retention }
    }

    /// The underlying database handle.
    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Lookup evaluated at `now`.
    ///
    /// A record strictly older than the retention window, or one whose
    /// timestamp cannot be read, is deleted and reported as absent.
    pub async fn lookup_at(&self, url: &str, now: DateTime<Utc>) -> Result<Option<CacheRecord>, Error> {
        let record = match self.db.get_record(url).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(Error::InvalidRecord(reason)) => {
                tracing::warn!(url, %reason, "discarding unreadable cache record");
                self.evict(url).await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if record.age(now) > self.retention {
            tracing::debug!(url, created_at = %record.created_at, "cache record expired");
            self.evict(url).await;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn evict(&self, url: &str) {
        if let Err(e) = self.db.delete_record(url).await {
            tracing::warn!(url, error = %e, "failed to delete expired cache record");
        }
    }
}

#[async_trait::async_trait]
impl MetadataCache for CacheGateway {
    async fn lookup(&self, url: &str) -> Result<Option<CacheRecord>, Error> {
        self.lookup_at(url, Utc::now()).await
    }

    async fn store(&self, record: &CacheRecord) -> Result<(), Error> {
        self.db.upsert_record(record).await
    }
}
