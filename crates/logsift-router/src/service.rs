//! Classification service façade
//!
//! Composes the cache around the router and the monitor around both.
//! Batches are dispatched with bounded concurrency so network-bound
//! fallback calls overlap, while output order always mirrors input order.

use crate::config::ServiceConfig;
use crate::policy::RoutingPolicy;
use crate::router::{ClassificationRouter, RouterStats};
use futures::StreamExt;
use logsift_cache::{CacheKey, CacheManager, FileStore, MemoryCache, PersistentStore};
use logsift_classifiers::{
    EmbeddingClassifier, FallbackReasoner, HashingEmbedder, LinearHead, PatternMatcher,
};
use logsift_core::{Category, CategorySet, ClassificationOutcome, LogEntry, Result, Stage};
use logsift_telemetry::{PerformanceMonitor, SampleOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Batch classification entry point
#[derive(Clone)]
pub struct ClassificationService {
    router: Arc<ClassificationRouter>,
    cache: CacheManager,
    monitor: PerformanceMonitor,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl ClassificationService {
    /// Compose a service from already-built parts
    pub fn new(router: ClassificationRouter, cache: CacheManager, monitor: PerformanceMonitor) -> Self {
        Self {
            router: Arc::new(router),
            cache,
            monitor,
            concurrency: 8,
            deadline: None,
        }
    }

    /// Build the whole stack from configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let categories = CategorySet::new(&config.categories);
        let pattern = Arc::new(PatternMatcher::new(config.pattern_rules()?));

        let embedding = match (&config.embedding.artifact, config.embedding.enabled) {
            (Some(artifact), true) => {
                let head = LinearHead::from_file(artifact)?;
                let embedder = Arc::new(HashingEmbedder::default());
                Some(Arc::new(EmbeddingClassifier::new(
                    embedder,
                    head,
                    config.embedding.confidence_threshold,
                )?) as Arc<dyn logsift_classifiers::StageClassifier>)
            }
            _ => None,
        };

        let fallback = Arc::new(FallbackReasoner::new(
            config.fallback.resolve(),
            categories,
        )?);

        let policy = RoutingPolicy::new(
            config.legacy_sources.iter().cloned(),
            config.embedding.enabled,
        );
        let router = ClassificationRouter::new(policy, pattern, embedding, fallback);

        let ttl = Duration::from_secs(config.cache.ttl_secs);
        let memory = MemoryCache::new(config.cache.max_entries, ttl)?;
        let persistent: Option<Arc<dyn PersistentStore>> = match &config.cache.persistent_dir {
            Some(dir) => Some(Arc::new(FileStore::new(dir.clone())?)),
            None => None,
        };
        let cache = CacheManager::new(memory, persistent, ttl);

        let mut service = Self::new(router, cache, PerformanceMonitor::new());
        service.concurrency = config.concurrency;
        service.deadline = config.deadline_secs.map(Duration::from_secs);
        Ok(service)
    }

    /// Cap the number of entries dispatched concurrently
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Apply a whole-batch deadline; entries past it degrade to
    /// `unclassified` instead of blocking the batch
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Classify a batch; `output[i]` corresponds to `entries[i]`
    pub async fn classify_outcomes(&self, entries: &[LogEntry]) -> Vec<ClassificationOutcome> {
        if entries.is_empty() {
            return Vec::new();
        }

        let deadline = self.deadline.map(|d| tokio::time::Instant::now() + d);
        let mut results = futures::stream::iter(entries.iter().cloned().enumerate().map(
            |(index, entry)| {
                let router = Arc::clone(&self.router);
                let cache = self.cache.clone();
                let monitor = self.monitor.clone();
                async move {
                    let key = CacheKey::from_entry(&entry);
                    let source = entry.source.clone();
                    let work = cache.get_or_compute(key, move || async move {
                        Ok(router.route_entry(&entry).await)
                    });

                    let started = Instant::now();
                    let outcome = match deadline {
                        Some(at) => match tokio::time::timeout_at(at, work).await {
                            Ok(result) => result,
                            Err(_) => {
                                warn!(source = %source, "batch deadline expired");
                                Ok(ClassificationOutcome::unclassified(Stage::Error))
                            }
                        },
                        None => work.await,
                    };
                    let outcome = outcome.unwrap_or_else(|e| {
                        warn!(source = %source, error = %e, "entry degraded");
                        ClassificationOutcome::unclassified(Stage::Error)
                    });

                    // Stage failures are absorbed into error-stage
                    // outcomes upstream, so the sample outcome derives
                    // from the stage tag rather than a Result.
                    let sample = if outcome.stage == Stage::Error {
                        SampleOutcome::Failure
                    } else {
                        SampleOutcome::Success
                    };
                    monitor.record("classify_entry", started.elapsed(), sample);
                    (index, outcome)
                }
            },
        ))
        .buffer_unordered(self.concurrency);

        // Completion order is arbitrary under concurrent dispatch; the
        // index carried with each result restores input order.
        let mut outcomes =
            vec![ClassificationOutcome::unclassified(Stage::Error); entries.len()];
        while let Some((index, outcome)) = results.next().await {
            outcomes[index] = outcome;
        }

        let batch = RouterStats::tally(&outcomes);
        info!(
            entries = outcomes.len(),
            pattern = batch.pattern,
            embedding = batch.embedding,
            fallback = batch.fallback,
            error = batch.error,
            "batch classified"
        );
        outcomes
    }

    /// Classify a batch, returning labels only
    pub async fn classify(&self, entries: &[LogEntry]) -> Vec<Category> {
        self.classify_outcomes(entries)
            .await
            .into_iter()
            .map(|outcome| outcome.label)
            .collect()
    }

    /// The monitor observing this service
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Per-stage usage counters of the underlying router
    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }
}
