//! Service configuration
//!
//! Loaded once before construction; `validate` surfaces defects loudly at
//! startup instead of letting them appear as per-request misbehavior.

use logsift_classifiers::{FallbackConfig, PatternRule};
use logsift_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the classification service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Closed category set; `unclassified` is appended when absent
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Sources routed straight to the fallback reasoner
    #[serde(default = "default_legacy_sources")]
    pub legacy_sources: Vec<String>,

    /// Ordered pattern rules; empty means the built-in rule set
    #[serde(default)]
    pub rules: Vec<RuleSpec>,

    /// Embedding stage settings
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Fallback reasoner settings
    #[serde(default)]
    pub fallback: FallbackSettings,

    /// Cache sizing
    #[serde(default)]
    pub cache: CacheSettings,

    /// Entries dispatched concurrently per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whole-batch deadline; entries past it degrade to `unclassified`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

/// One ordered pattern rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Case-insensitive regular expression over the message
    pub pattern: String,

    /// Category assigned on match
    pub category: String,
}

/// Embedding stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Whether the embedding stage runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the serialized linear head; `None` disables the stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,

    /// Minimum top-class probability to accept; `None` always accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            artifact: None,
            confidence_threshold: Some(default_confidence_threshold()),
        }
    }
}

/// Fallback reasoner settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// Environment variable holding the API key, read at build time
    /// when `api_key` itself is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(flatten)]
    pub config: FallbackConfig,
}

impl FallbackSettings {
    /// Resolve the effective reasoner configuration, consulting the
    /// configured environment variable for a missing key
    pub fn resolve(&self) -> FallbackConfig {
        let mut config = self.config.clone();
        if config.api_key.is_none() {
            if let Some(var) = &self.api_key_env {
                config.api_key = std::env::var(var).ok();
            }
        }
        config
    }
}

/// Cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// In-memory tier capacity
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entry time-to-live in seconds, both tiers
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Directory for the persistent tier; `None` disables it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            persistent_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject structurally invalid configuration
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::config("category set must not be empty"));
        }
        for rule in &self.rules {
            // Compilation is the validity check; the built rule is discarded
            PatternRule::regex(&rule.pattern, &rule.category)?;
        }
        if let Some(threshold) = self.embedding.confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::config(format!(
                    "confidence threshold {threshold} outside [0, 1]"
                )));
            }
        }
        if self.cache.max_entries == 0 {
            return Err(Error::config("cache max_entries must be positive"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::config("cache ttl_secs must be positive"));
        }
        if self.concurrency == 0 {
            return Err(Error::config("concurrency must be positive"));
        }
        Ok(())
    }

    /// Compiled pattern rules: the configured list, or the built-in set
    /// when none are configured
    pub fn pattern_rules(&self) -> Result<Vec<PatternRule>> {
        if self.rules.is_empty() {
            return logsift_classifiers::default_rules();
        }
        self.rules
            .iter()
            .map(|rule| PatternRule::regex(&rule.pattern, &rule.category))
            .collect()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            legacy_sources: default_legacy_sources(),
            rules: Vec::new(),
            embedding: EmbeddingSettings::default(),
            fallback: FallbackSettings::default(),
            cache: CacheSettings::default(),
            concurrency: default_concurrency(),
            deadline_secs: None,
        }
    }
}

fn default_categories() -> Vec<String> {
    [
        "user_action",
        "system_notification",
        "workflow_error",
        "deprecation_warning",
        "security_alert",
    ]
    .map(str::to_owned)
    .to_vec()
}

fn default_legacy_sources() -> Vec<String> {
    vec!["LegacyCRM".to_string()]
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_concurrency() -> usize {
    8
}

fn default_true() -> bool {
    true
}
