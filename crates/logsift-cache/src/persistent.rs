//! Persistent cache tier
//!
//! Key→value storage behind the [`PersistentStore`] trait; the exact
//! storage format is an implementation detail, not a compatibility
//! surface. [`FileStore`] keeps one JSON document per key with its own
//! stored-at timestamp and TTL, removing expired or unreadable documents
//! on read.

use crate::key::CacheKey;
use logsift_core::{ClassificationOutcome, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Slow key→value tier consulted on in-memory miss
pub trait PersistentStore: Send + Sync {
    /// Fetch a stored outcome; expired entries are misses
    fn get(&self, key: &CacheKey) -> Result<Option<ClassificationOutcome>>;

    /// Store an outcome with the given TTL
    fn set(&self, key: &CacheKey, value: &ClassificationOutcome, ttl: Duration) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    outcome: ClassificationOutcome,
    stored_at_secs: u64,
    ttl_secs: u64,
}

impl StoredEntry {
    fn is_expired(&self, now_secs: u64) -> bool {
        now_secs.saturating_sub(self.stored_at_secs) > self.ttl_secs
    }
}

/// File-backed persistent tier: one JSON document per key
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Remove every stored document
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &CacheKey) -> Result<Option<ClassificationOutcome>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let entry: StoredEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "removing unreadable cache document");
                remove_quietly(&path);
                return Ok(None);
            }
        };

        if entry.is_expired(unix_now_secs()) {
            debug!(key = %key, "removing expired cache document");
            remove_quietly(&path);
            return Ok(None);
        }

        Ok(Some(entry.outcome))
    }

    fn set(&self, key: &CacheKey, value: &ClassificationOutcome, ttl: Duration) -> Result<()> {
        let entry = StoredEntry {
            outcome: value.clone(),
            stored_at_secs: unix_now_secs(),
            ttl_secs: ttl.as_secs(),
        };
        let json = serde_json::to_string(&entry)?;
        std::fs::write(self.path_for(key), json)
            .map_err(|e| Error::cache(format!("failed to write cache document: {e}")))
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove cache document");
    }
}
