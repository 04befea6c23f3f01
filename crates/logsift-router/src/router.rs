//! Tiered classification routing
//!
//! Per-entry algorithm: legacy sources go straight to the fallback
//! reasoner; everyone else walks pattern, then embedding (when enabled),
//! then fallback. The first stage to return a match decides the outcome
//! and its stage tag. A stage error is caught at the entry boundary and
//! converted to an `unclassified`/`error` outcome, so one bad entry never
//! aborts a batch.

use crate::policy::RoutingPolicy;
use logsift_classifiers::StageClassifier;
use logsift_core::{ClassificationOutcome, LogEntry, Result, Stage, StageOutcome};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-stage usage counters, observability only
#[derive(Default)]
struct StageCounters {
    pattern: AtomicU64,
    embedding: AtomicU64,
    fallback: AtomicU64,
    error: AtomicU64,
}

impl StageCounters {
    fn bump(&self, stage: Stage) {
        let counter = match stage {
            Stage::Pattern => &self.pattern,
            Stage::Embedding => &self.embedding,
            Stage::Fallback => &self.fallback,
            Stage::Error => &self.error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the router's stage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub pattern: u64,
    pub embedding: u64,
    pub fallback: u64,
    pub error: u64,
}

impl RouterStats {
    /// Entries routed since construction (or the last counter reset)
    pub fn total(&self) -> u64 {
        self.pattern + self.embedding + self.fallback + self.error
    }

    /// Per-stage counts for one batch of outcomes
    pub fn tally(outcomes: &[ClassificationOutcome]) -> Self {
        let mut stats = Self {
            pattern: 0,
            embedding: 0,
            fallback: 0,
            error: 0,
        };
        for outcome in outcomes {
            match outcome.stage {
                Stage::Pattern => stats.pattern += 1,
                Stage::Embedding => stats.embedding += 1,
                Stage::Fallback => stats.fallback += 1,
                Stage::Error => stats.error += 1,
            }
        }
        stats
    }
}

/// Routes each entry through the stage pipeline
pub struct ClassificationRouter {
    policy: RoutingPolicy,
    pattern: Arc<dyn StageClassifier>,
    embedding: Option<Arc<dyn StageClassifier>>,
    fallback: Arc<dyn StageClassifier>,
    counters: StageCounters,
}

impl ClassificationRouter {
    /// Create a router over the three stages.
    ///
    /// `embedding` may be absent; the policy's enable flag additionally
    /// gates it when present.
    pub fn new(
        policy: RoutingPolicy,
        pattern: Arc<dyn StageClassifier>,
        embedding: Option<Arc<dyn StageClassifier>>,
        fallback: Arc<dyn StageClassifier>,
    ) -> Self {
        Self {
            policy,
            pattern,
            embedding,
            fallback,
            counters: StageCounters::default(),
        }
    }

    /// Classify a batch sequentially; output order mirrors input order
    /// and empty input yields empty output.
    pub async fn route(&self, entries: &[LogEntry]) -> Result<Vec<ClassificationOutcome>> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.route_entry(entry).await);
        }

        let batch = RouterStats::tally(&outcomes);
        info!(
            entries = entries.len(),
            pattern = batch.pattern,
            embedding = batch.embedding,
            fallback = batch.fallback,
            error = batch.error,
            "batch routed"
        );
        Ok(outcomes)
    }

    /// Classify one entry, absorbing stage errors at the boundary
    pub async fn route_entry(&self, entry: &LogEntry) -> ClassificationOutcome {
        let outcome = match self.route_entry_inner(entry).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(source = %entry.source, error = %e, "stage failed, degrading entry");
                ClassificationOutcome::unclassified(Stage::Error)
            }
        };

        self.counters.bump(outcome.stage);
        debug!(
            source = %entry.source,
            label = %outcome.label,
            stage = %outcome.stage,
            "entry classified"
        );
        outcome
    }

    async fn route_entry_inner(&self, entry: &LogEntry) -> Result<ClassificationOutcome> {
        if self.policy.forces_fallback(&entry.source) {
            return self.consult_fallback(entry).await;
        }

        if let StageOutcome::Matched(label) = self.pattern.classify(entry).await? {
            return Ok(ClassificationOutcome::new(label, Stage::Pattern));
        }

        if self.policy.embedding_enabled() {
            if let Some(embedding) = &self.embedding {
                if let StageOutcome::Matched(label) = embedding.classify(entry).await? {
                    return Ok(ClassificationOutcome::new(label, Stage::Embedding));
                }
            }
        }

        self.consult_fallback(entry).await
    }

    async fn consult_fallback(&self, entry: &LogEntry) -> Result<ClassificationOutcome> {
        let label = match self.fallback.classify(entry).await? {
            StageOutcome::Matched(label) => label,
            // The fallback contract is "never Miss"; treat a violation
            // as a degraded answer rather than a batch failure
            StageOutcome::Miss => {
                warn!(source = %entry.source, "fallback stage returned a miss");
                logsift_core::Category::unclassified()
            }
        };
        Ok(ClassificationOutcome::new(label, Stage::Fallback))
    }

    /// Snapshot the per-stage usage counters
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            pattern: self.counters.pattern.load(Ordering::Relaxed),
            embedding: self.counters.embedding.load(Ordering::Relaxed),
            fallback: self.counters.fallback.load(Ordering::Relaxed),
            error: self.counters.error.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use logsift_core::{Category, Error};

    /// Scripted stage for routing tests
    struct ScriptedStage {
        stage: Stage,
        script: Box<dyn Fn(&LogEntry) -> Result<StageOutcome> + Send + Sync>,
        calls: AtomicU64,
    }

    impl ScriptedStage {
        fn new(
            stage: Stage,
            script: impl Fn(&LogEntry) -> Result<StageOutcome> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                stage,
                script: Box::new(script),
                calls: AtomicU64::new(0),
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StageClassifier for ScriptedStage {
        async fn classify(&self, entry: &LogEntry) -> Result<StageOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.script)(entry)
        }

        fn name(&self) -> &str {
            self.stage.as_str()
        }

        fn stage(&self) -> Stage {
            self.stage
        }
    }

    fn matched(label: &str) -> Result<StageOutcome> {
        Ok(StageOutcome::Matched(Category::new(label)))
    }

    fn router(
        pattern: Arc<ScriptedStage>,
        embedding: Arc<ScriptedStage>,
        fallback: Arc<ScriptedStage>,
    ) -> ClassificationRouter {
        ClassificationRouter::new(
            RoutingPolicy::new(["LegacyCRM"], true),
            pattern,
            Some(embedding),
            fallback,
        )
    }

    #[tokio::test]
    async fn pattern_match_short_circuits() {
        let pattern = ScriptedStage::new(Stage::Pattern, |_| matched("user_action"));
        let embedding = ScriptedStage::new(Stage::Embedding, |_| Ok(StageOutcome::Miss));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("unclassified"));
        let router = router(pattern, embedding.clone(), fallback.clone());

        let outcome = router
            .route_entry(&LogEntry::new("WebServer", "User logged in"))
            .await;
        assert_eq!(outcome.label, Category::new("user_action"));
        assert_eq!(outcome.stage, Stage::Pattern);
        assert_eq!(embedding.calls(), 0);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn pattern_miss_falls_through_to_embedding() {
        let pattern = ScriptedStage::new(Stage::Pattern, |_| Ok(StageOutcome::Miss));
        let embedding = ScriptedStage::new(Stage::Embedding, |_| matched("system_notification"));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("unclassified"));
        let router = router(pattern, embedding, fallback.clone());

        let outcome = router
            .route_entry(&LogEntry::new("WebServer", "something unusual"))
            .await;
        assert_eq!(outcome.stage, Stage::Embedding);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn double_miss_reaches_fallback() {
        let pattern = ScriptedStage::new(Stage::Pattern, |_| Ok(StageOutcome::Miss));
        let embedding = ScriptedStage::new(Stage::Embedding, |_| Ok(StageOutcome::Miss));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("workflow_error"));
        let router = router(pattern, embedding, fallback);

        let outcome = router
            .route_entry(&LogEntry::new("WebServer", "something unusual"))
            .await;
        assert_eq!(outcome.label, Category::new("workflow_error"));
        assert_eq!(outcome.stage, Stage::Fallback);
    }

    #[tokio::test]
    async fn legacy_source_skips_deterministic_stages() {
        let pattern = ScriptedStage::new(Stage::Pattern, |_| matched("user_action"));
        let embedding = ScriptedStage::new(Stage::Embedding, |_| matched("user_action"));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("workflow_error"));
        let router = router(pattern.clone(), embedding.clone(), fallback);

        let outcome = router
            .route_entry(&LogEntry::new("LegacyCRM", "User logged in"))
            .await;
        assert_eq!(outcome.stage, Stage::Fallback);
        assert_eq!(pattern.calls(), 0);
        assert_eq!(embedding.calls(), 0);
    }

    #[tokio::test]
    async fn disabled_embedding_is_never_consulted() {
        let pattern = ScriptedStage::new(Stage::Pattern, |_| Ok(StageOutcome::Miss));
        let embedding = ScriptedStage::new(Stage::Embedding, |_| matched("user_action"));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("unclassified"));
        let router = ClassificationRouter::new(
            RoutingPolicy::new(Vec::<String>::new(), false),
            pattern,
            Some(embedding.clone()),
            fallback,
        );

        let outcome = router.route_entry(&LogEntry::new("WebServer", "x")).await;
        assert_eq!(outcome.stage, Stage::Fallback);
        assert_eq!(embedding.calls(), 0);
    }

    #[tokio::test]
    async fn stage_error_degrades_only_that_entry() {
        let pattern = ScriptedStage::new(Stage::Pattern, |entry| {
            if entry.message == "poison" {
                Err(Error::stage("rule evaluation blew up"))
            } else {
                matched("user_action")
            }
        });
        let embedding = ScriptedStage::new(Stage::Embedding, |_| Ok(StageOutcome::Miss));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("unclassified"));
        let router = router(pattern, embedding, fallback);

        let entries = vec![
            LogEntry::new("WebServer", "User logged in"),
            LogEntry::new("WebServer", "poison"),
            LogEntry::new("WebServer", "User logged out"),
        ];
        let outcomes = router.route(&entries).await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].stage, Stage::Pattern);
        assert_eq!(outcomes[1], ClassificationOutcome::unclassified(Stage::Error));
        assert_eq!(outcomes[2].stage, Stage::Pattern);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_output() {
        let pattern = ScriptedStage::new(Stage::Pattern, |_| matched("user_action"));
        let embedding = ScriptedStage::new(Stage::Embedding, |_| Ok(StageOutcome::Miss));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("unclassified"));
        let router = router(pattern, embedding, fallback);

        assert!(router.route(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn tally_counts_one_batch_only() {
        let outcomes = vec![
            ClassificationOutcome::new(Category::new("user_action"), Stage::Pattern),
            ClassificationOutcome::new(Category::new("workflow_error"), Stage::Fallback),
            ClassificationOutcome::unclassified(Stage::Error),
            ClassificationOutcome::new(Category::new("user_action"), Stage::Pattern),
        ];
        let stats = RouterStats::tally(&outcomes);
        assert_eq!(stats.pattern, 2);
        assert_eq!(stats.embedding, 0);
        assert_eq!(stats.fallback, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.total(), 4);
    }

    #[tokio::test]
    async fn counters_track_the_deciding_stage() {
        let pattern = ScriptedStage::new(Stage::Pattern, |entry| {
            if entry.message.contains("login") {
                matched("user_action")
            } else {
                Ok(StageOutcome::Miss)
            }
        });
        let embedding = ScriptedStage::new(Stage::Embedding, |_| Ok(StageOutcome::Miss));
        let fallback = ScriptedStage::new(Stage::Fallback, |_| matched("unclassified"));
        let router = router(pattern, embedding, fallback);

        let entries = vec![
            LogEntry::new("WebServer", "login ok"),
            LogEntry::new("WebServer", "mystery"),
            LogEntry::new("LegacyCRM", "legacy thing"),
        ];
        router.route(&entries).await.unwrap();

        let stats = router.stats();
        assert_eq!(stats.pattern, 1);
        assert_eq!(stats.fallback, 2);
        assert_eq!(stats.total(), 3);
    }
}
