//! Cache-key fingerprinting

use logsift_core::LogEntry;
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic fingerprint of a (source, message) pair.
///
/// Two distinct entries with identical source and message map to the same
/// key; there is no partial or fuzzy matching. The hex rendering doubles as
/// a safe filename for the persistent tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a log entry.
    ///
    /// A unit separator between the fields keeps ("ab", "c") and
    /// ("a", "bc") distinct.
    pub fn from_entry(entry: &LogEntry) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(entry.source.as_bytes());
        hasher.update([0x1f]);
        hasher.update(entry.message.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex rendering of the fingerprint
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
