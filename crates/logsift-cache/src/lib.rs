//! Logsift Cache
//!
//! Memoization layer for classification outcomes:
//! - Deterministic cache-key fingerprints over (source, message)
//! - Bounded in-memory tier with LRU eviction and lazy TTL expiry
//! - Slower persistent tier behind the [`PersistentStore`] trait, with a
//!   file-backed implementation
//! - [`CacheManager`]: two-tier lookup with single-flight semantics, so a
//!   distinct input is computed at most once even under concurrent load

pub mod key;
pub mod manager;
pub mod memory;
pub mod persistent;

pub use key::CacheKey;
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use persistent::{FileStore, PersistentStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::key::CacheKey;
    pub use crate::manager::CacheManager;
    pub use crate::memory::MemoryCache;
    pub use crate::persistent::{FileStore, PersistentStore};
}
