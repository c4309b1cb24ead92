//! Cache record CRUD operations.
//!
//! Provides functions for creating, reading and deleting cached previews.
//! Expiry policy lives in [`super::gateway`]; this layer stores rows as-is.

use super::connection::CacheDb;
use crate::{Error, LinkPreview};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached link preview keyed by its request URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: String,
    pub hostname: String,
}

impl CacheRecord {
    /// Build a record for `url` from a freshly computed preview.
    pub fn new(url: impl Into<String>, created_at: DateTime<Utc>, preview: &LinkPreview) -> Self {
        Self {
            url: url.into(),
            created_at,
            title: preview.title.clone(),
            description: preview.description.clone(),
            image: preview.image.clone(),
            site_name: preview.site_name.clone(),
            hostname: preview.hostname.clone(),
        }
    }

    /// Age of the record relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

impl From<CacheRecord> for LinkPreview {
    fn from(record: CacheRecord) -> Self {
        LinkPreview {
            title: record.title,
            description: record.description,
            image: record.image,
            site_name: record.site_name,
            hostname: record.hostname,
        }
    }
}

/// Row as stored; `created_at` is kept as RFC 3339 text.
struct StoredRow {
    url: String,
    created_at: String,
    title: String,
    description: Option<String>,
    image: Option<String>,
    site_name: String,
    hostname: String,
}

impl StoredRow {
    fn into_record(self) -> Result<CacheRecord, Error> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| Error::InvalidRecord(format!("created_at {:?}: {e}", self.created_at)))?
            .with_timezone(&Utc);

        Ok(CacheRecord {
            url: self.url,
            created_at,
            title: self.title,
            description: self.description,
            image: self.image,
            site_name: self.site_name,
            hostname: self.hostname,
        })
    }
}

impl CacheDb {
    /// Insert or replace the record for `record.url`.
    ///
    /// Concurrent writers for the same URL resolve as last write wins.
    pub async fn upsert_record(&self, record: &CacheRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO meta_cache (
                    url, created_at, title, description, image, site_name, hostname
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(url) DO UPDATE SET
                    created_at = excluded.created_at,
                    title = excluded.title,
                    description = excluded.description,
                    image = excluded.image,
                    site_name = excluded.site_name,
                    hostname = excluded.hostname",
                    params![
                        &record.url,
                        record.created_at.to_rfc3339(),
                        &record.title,
                        &record.description,
                        &record.image,
                        &record.site_name,
                        &record.hostname,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the record stored for `url`, regardless of its age.
    ///
    /// Returns `Error::InvalidRecord` if the stored timestamp cannot be parsed.
    pub async fn get_record(&self, url: &str) -> Result<Option<CacheRecord>, Error> {
        let url = url.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, created_at, title, description, image, site_name, hostname
                FROM meta_cache WHERE url = ?1",
                )?;

                let result = stmt.query_row(params![url], |row| {
                    Ok(StoredRow {
                        url: row.get(0)?,
                        created_at: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        image: row.get(4)?,
                        site_name: row.get(5)?,
                        hostname: row.get(6)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(StoredRow::into_record).transpose()
    }

    /// Delete the record for `url`.
    ///
    /// Returns whether a row was removed.
    pub async fn delete_record(&self, url: &str) -> Result<bool, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM meta_cache WHERE url = ?1", params![url])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
