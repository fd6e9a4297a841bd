//! Quick Thesaurus lookup cache
//!
//! A disk-backed TTL cache for word lookups, the read-through helper the
//! application uses on top of it, and the pieces behind the `quickthes`
//! maintenance tool.

pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod lookup;
