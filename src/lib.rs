//! Aggregation service over the Star Wars API.
//!
//! The upstream API addresses records by `{collection}/{index}` with a
//! 1-based index space that contains holes and has no known total count.
//! This crate walks that space in fixed-width concurrent batches, counts
//! misses until a per-collection threshold says the collection is
//! exhausted, and serves the aggregated results over HTTP:
//!
//! - `GET /people?sortBy={name|height|mass}` - all people, names only
//! - `GET /planets` - all planets, resident URLs resolved to names

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod residents;
pub mod server;
pub mod sort;
