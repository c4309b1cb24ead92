//! Core types and shared functionality for linkpeek.
//!
//! This crate provides:
//! - The preview cache with a SQLite backend and lazy expiry
//! - Unified error types
//! - Configuration structures
//! - The normalized [`LinkPreview`] shape

pub mod cache;
pub mod config;
pub mod error;
pub mod preview;

pub use cache::{CacheDb, CacheGateway, CacheRecord, MetadataCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use preview::LinkPreview;
