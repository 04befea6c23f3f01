//! Pattern-based classification stage
//!
//! Evaluates an ordered rule list over the message text; the first matching
//! rule wins, and rule order is part of the contract. Rules are either
//! case-insensitive regular expressions or Aho-Corasick keyword lists, each
//! bound to exactly one category.

use crate::stage::StageClassifier;
use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use logsift_core::{Category, Error, LogEntry, Result, Stage, StageOutcome};
use regex::RegexBuilder;

enum RulePredicate {
    Regex(regex::Regex),
    Keywords(AhoCorasick),
}

/// A single ordered rule: one predicate bound to one category
pub struct PatternRule {
    predicate: RulePredicate,
    category: Category,
}

impl PatternRule {
    /// Build a case-insensitive regex rule
    pub fn regex(pattern: &str, category: impl AsRef<str>) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::config(format!("invalid rule pattern '{pattern}': {e}")))?;
        Ok(Self {
            predicate: RulePredicate::Regex(regex),
            category: Category::new(category),
        })
    }

    /// Build a keyword-list rule; the rule matches when any keyword occurs
    pub fn keywords<I, S>(keywords: I, category: impl AsRef<str>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(keywords)
            .map_err(|e| Error::config(format!("invalid keyword rule: {e}")))?;
        Ok(Self {
            predicate: RulePredicate::Keywords(matcher),
            category: Category::new(category),
        })
    }

    /// The category this rule assigns
    pub fn category(&self) -> &Category {
        &self.category
    }

    fn matches(&self, message: &str) -> bool {
        match &self.predicate {
            RulePredicate::Regex(regex) => regex.is_match(message),
            RulePredicate::Keywords(matcher) => matcher.is_match(message),
        }
    }
}

/// Deterministic first-match-wins pattern stage
pub struct PatternMatcher {
    name: String,
    rules: Vec<PatternRule>,
}

impl PatternMatcher {
    /// Create a matcher from an ordered rule list
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self {
            name: "pattern".to_string(),
            rules,
        }
    }

    /// Create a matcher with the stock rule set
    pub fn with_default_rules() -> Result<Self> {
        Ok(Self::new(default_rules()?))
    }

    /// Number of rules in evaluation order
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[async_trait]
impl StageClassifier for PatternMatcher {
    async fn classify(&self, entry: &LogEntry) -> Result<StageOutcome> {
        if entry.message.is_empty() {
            return Ok(StageOutcome::Miss);
        }

        for rule in &self.rules {
            if rule.matches(&entry.message) {
                return Ok(StageOutcome::Matched(rule.category.clone()));
            }
        }

        Ok(StageOutcome::Miss)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> Stage {
        Stage::Pattern
    }
}

/// The stock rule set for the default category scheme.
///
/// Failure rules come first: later families use broad predicates that would
/// otherwise swallow error-ish lines.
pub fn default_rules() -> Result<Vec<PatternRule>> {
    Ok(vec![
        // Workflow errors
        PatternRule::regex(r"database.*error|sql.*error|query.*failed", "workflow_error")?,
        PatternRule::regex(r"network.*error|connection.*timeout", "workflow_error")?,
        PatternRule::regex(r"file.*not.*found", "workflow_error")?,
        PatternRule::regex(r"process.*abort|operation.*abort", "workflow_error")?,
        PatternRule::regex(r"workflow.*fail|timeout.*error", "workflow_error")?,
        // Deprecation warnings
        PatternRule::regex(r"deprecat(ed|ion)|warning.*deprecat", "deprecation_warning")?,
        PatternRule::regex(r"feature.*removed|legacy.*feature", "deprecation_warning")?,
        PatternRule::regex(
            r"obsolete|will.*be.*removed|retire.*in.*version",
            "deprecation_warning",
        )?,
        PatternRule::regex(
            r"no.*longer.*supported|feature.*discontinued",
            "deprecation_warning",
        )?,
        // User actions
        PatternRule::regex(r"user.*log(ged|s)?\s*(in|out)", "user_action")?,
        PatternRule::regex(
            r"login.*success|logout|authentication.*success|sign.*in.*success",
            "user_action",
        )?,
        PatternRule::regex(r"user.*created|registered|account.*created", "user_action")?,
        PatternRule::regex(
            r"password.*changed|updated.*profile|profile.*updated",
            "user_action",
        )?,
        PatternRule::regex(
            r"file.*uploaded.*by.*user|document.*created.*by",
            "user_action",
        )?,
        // System notifications
        PatternRule::regex(r"backup.*completed|successfully.*backup", "system_notification")?,
        PatternRule::regex(r"system.*updated?|version.*updated?", "system_notification")?,
        PatternRule::regex(
            r"connection.*established|server.*started",
            "system_notification",
        )?,
        PatternRule::keywords(
            ["scheduled task", "cron job"],
            "system_notification",
        )?,
        PatternRule::regex(
            r"application.*start|service.*start|(listening|bound|running).*port.*\d+",
            "system_notification",
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new("WebServer", message)
    }

    #[tokio::test]
    async fn first_matching_rule_wins() {
        let matcher = PatternMatcher::with_default_rules().unwrap();

        let outcome = matcher
            .classify(&entry("User admin logged in from 10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(outcome, StageOutcome::Matched(Category::new("user_action")));

        let outcome = matcher
            .classify(&entry("Nightly backup completed successfully"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Matched(Category::new("system_notification"))
        );
    }

    #[tokio::test]
    async fn no_match_yields_miss() {
        let matcher = PatternMatcher::with_default_rules().unwrap();
        let outcome = matcher.classify(&entry("Hey Bro, chill ya!")).await.unwrap();
        assert_eq!(outcome, StageOutcome::Miss);
    }

    #[tokio::test]
    async fn empty_message_yields_miss() {
        let matcher = PatternMatcher::with_default_rules().unwrap();
        let outcome = matcher.classify(&entry("")).await.unwrap();
        assert_eq!(outcome, StageOutcome::Miss);
    }

    #[tokio::test]
    async fn rule_order_decides_ambiguous_messages() {
        // The same message matches both rules; order picks the winner.
        let ambiguous = "service start aborted";

        let matcher = PatternMatcher::new(vec![
            PatternRule::regex(r"abort", "workflow_error").unwrap(),
            PatternRule::regex(r"service.*start", "system_notification").unwrap(),
        ]);
        let outcome = matcher.classify(&entry(ambiguous)).await.unwrap();
        assert_eq!(outcome, StageOutcome::Matched(Category::new("workflow_error")));

        let matcher = PatternMatcher::new(vec![
            PatternRule::regex(r"service.*start", "system_notification").unwrap(),
            PatternRule::regex(r"abort", "workflow_error").unwrap(),
        ]);
        let outcome = matcher.classify(&entry(ambiguous)).await.unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Matched(Category::new("system_notification"))
        );
    }

    #[tokio::test]
    async fn repeated_calls_are_deterministic() {
        let matcher = PatternMatcher::with_default_rules().unwrap();
        let e = entry("Query failed: relation \"orders\" does not exist");
        let first = matcher.classify(&e).await.unwrap();
        for _ in 0..10 {
            assert_eq!(matcher.classify(&e).await.unwrap(), first);
        }
    }

    #[test]
    fn invalid_regex_is_rejected_at_construction() {
        assert!(PatternRule::regex(r"unclosed(group", "workflow_error").is_err());
    }

    #[tokio::test]
    async fn keyword_rules_are_case_insensitive() {
        let matcher = PatternMatcher::new(vec![PatternRule::keywords(
            ["cron job"],
            "system_notification",
        )
        .unwrap()]);
        let outcome = matcher
            .classify(&entry("CRON JOB finished in 12s"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Matched(Category::new("system_notification"))
        );
    }
}
