//! Core types for logsift

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single log line to classify, as supplied by the caller.
///
/// Immutable input unit; created by the caller, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    /// Identifier of the system that produced the message
    pub source: String,

    /// Free-text log message content
    pub message: String,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

/// A classification label from the configured category set.
///
/// Labels are normalized to lowercase snake_case on construction and on
/// deserialization, so `"Workflow Error"` and `"workflow_error"` compare
/// equal wherever the label came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// The universal fallback label; always present in every category set
    pub const UNCLASSIFIED: &'static str = "unclassified";

    /// Create a category, normalizing the label
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(normalize_label(label.as_ref()))
    }

    /// The universal fallback category
    pub fn unclassified() -> Self {
        Self(Self::UNCLASSIFIED.to_string())
    }

    /// Get the normalized label
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the universal fallback label
    pub fn is_unclassified(&self) -> bool {
        self.0 == Self::UNCLASSIFIED
    }

    /// The label with underscores replaced by spaces (`"workflow error"`),
    /// the form LLM replies frequently use
    pub fn spaced(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.0
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// The closed, configuration-supplied set of valid categories.
///
/// Construction guarantees the mandatory `unclassified` member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    /// Build a category set from configured labels.
    ///
    /// `unclassified` is appended when absent; duplicates are dropped
    /// while preserving first-seen order.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<Category> = Vec::new();
        for label in labels {
            let category = Category::new(label);
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        let unclassified = Category::unclassified();
        if !categories.contains(&unclassified) {
            categories.push(unclassified);
        }
        Self { categories }
    }

    /// The stock category set used by the default configuration
    pub fn stock() -> Self {
        Self::new([
            "user_action",
            "system_notification",
            "workflow_error",
            "deprecation_warning",
            "security_alert",
        ])
    }

    /// Iterate over all categories, `unclassified` last when appended
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Number of categories including `unclassified`
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// A category set is never empty
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Membership test
    pub fn contains(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    /// Resolve a raw label (any casing, spaces or underscores) to a member
    /// of this set, or `None` when it is not a recognized category
    pub fn resolve(&self, raw: &str) -> Option<Category> {
        let candidate = Category::new(raw);
        self.contains(&candidate).then_some(candidate)
    }

    /// Find the earliest category token mentioned in free text.
    ///
    /// Both the snake_case form and the spaced form are recognized; when
    /// several categories appear, the one occurring first in the text wins.
    pub fn find_first_in(&self, text: &str) -> Option<Category> {
        let haystack = text.to_lowercase();
        let mut best: Option<(usize, &Category)> = None;
        for category in &self.categories {
            let position = haystack
                .find(category.as_str())
                .into_iter()
                .chain(haystack.find(&category.spaced()))
                .min();
            if let Some(pos) = position {
                match best {
                    Some((best_pos, _)) if best_pos <= pos => {}
                    _ => best = Some((pos, category)),
                }
            }
        }
        best.map(|(_, category)| category.clone())
    }
}

/// Which pipeline stage produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Deterministic pattern rules
    Pattern,
    /// Embedding + linear classifier
    Embedding,
    /// External LLM fallback
    Fallback,
    /// A stage failed; the entry degraded to `unclassified`
    Error,
}

impl Stage {
    /// Stable name used in logs and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Embedding => "embedding",
            Self::Fallback => "fallback",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    /// Assigned category
    pub label: Category,

    /// Stage that produced the label
    pub stage: Stage,
}

impl ClassificationOutcome {
    /// Create a new outcome
    pub fn new(label: Category, stage: Stage) -> Self {
        Self { label, stage }
    }

    /// The degraded outcome for the given stage
    pub fn unclassified(stage: Stage) -> Self {
        Self::new(Category::unclassified(), stage)
    }
}

/// A stage's explicit verdict: a label, or "I don't know".
///
/// Miss is a normal signal to consult the next stage, not an error;
/// stage failures travel separately as `Err(Error)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage assigned a category
    Matched(Category),
    /// The stage declined to classify the entry
    Miss,
}

impl StageOutcome {
    /// Whether this outcome carries a label
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}
