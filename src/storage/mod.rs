//! Persistence for crawl resumption
//!
//! The checkpoint store persists the CrawlState snapshot and the analyzed
//! pages gathered so far. Checkpoint writes are transactional: a crash
//! can never leave a batch half-recorded.

mod checkpoint;
mod schema;

pub use checkpoint::{CheckpointError, CheckpointResult, CheckpointStore};
pub use schema::initialize_schema;
