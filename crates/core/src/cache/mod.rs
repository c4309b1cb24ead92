//! SQLite-backed cache for computed link previews.
//!
//! This module provides a persistent preview cache using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Upserts keyed by the validated request URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Lazy expiry: records older than the retention window are removed when read

pub mod connection;
pub mod gateway;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::CacheDb;
pub use gateway::{CacheGateway, MetadataCache};
pub use records::CacheRecord;
