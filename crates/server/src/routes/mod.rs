//! HTTP route handlers.

pub mod preview;
pub mod raw;

pub use preview::preview;
pub use raw::raw_metadata;
