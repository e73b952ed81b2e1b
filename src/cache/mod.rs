//! Bounded-memory page caches over the source and index files.

mod paged;
mod sharded;

pub use paged::{AccessMode, HandleGuard, PagedFileCache};
pub use sharded::ShardedReadCache;
