//! Metadata caching layer
//!
//! Keeps path metadata and folder listings in memory so repeated lookups
//! skip the remote round trip until their TTL runs out.

pub mod client;
pub mod store;

pub use client::CachingClient;
pub use store::{CacheEntry, PathMetadataStore};
