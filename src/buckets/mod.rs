//! Bucket storage.
//!
//! Buckets hold the members of one state fragment; the arena owns them and
//! threads them into per-state chains.

mod arena;
mod bucket;

pub(crate) use arena::{BucketArena, Chain};
pub(crate) use bucket::StateBucket;
