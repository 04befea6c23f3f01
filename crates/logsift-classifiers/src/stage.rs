//! Stage trait shared by all classifiers

use async_trait::async_trait;
use logsift_core::{LogEntry, Result, Stage, StageOutcome};

/// Trait for a single classification stage.
///
/// A stage inspects one entry and returns a tagged verdict: `Matched` with
/// a category, or `Miss` to let the router consult the next stage. Errors
/// are reserved for defects inside the stage itself; the router converts
/// them to an `unclassified`/`error` outcome at the entry boundary.
#[async_trait]
pub trait StageClassifier: Send + Sync {
    /// Classify the given entry
    async fn classify(&self, entry: &LogEntry) -> Result<StageOutcome>;

    /// Get the stage name (used in logs and metrics)
    fn name(&self) -> &str;

    /// Which pipeline stage this classifier implements
    fn stage(&self) -> Stage;
}
