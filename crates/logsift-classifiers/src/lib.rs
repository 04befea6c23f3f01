//! Logsift Classifiers
//!
//! The three classification stages consulted by the router:
//! - Pattern matcher: deterministic ordered rules, first match wins (<1ms)
//! - Embedding classifier: text embedding + linear decision boundary
//! - Fallback reasoner: external LLM completion with defensive reply parsing
//!
//! Every stage implements [`StageClassifier`] and signals "I don't know"
//! with [`StageOutcome::Miss`](logsift_core::StageOutcome) rather than an
//! error; the fallback reasoner is terminal and never misses.

pub mod embedding;
pub mod fallback;
pub mod pattern;
pub mod reply;
pub mod stage;

pub use embedding::{Embedder, EmbeddingClassifier, HashingEmbedder, LinearHead};
pub use fallback::{FallbackConfig, FallbackReasoner};
pub use pattern::{default_rules, PatternMatcher, PatternRule};
pub use reply::ReplyParser;
pub use stage::StageClassifier;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::embedding::{Embedder, EmbeddingClassifier, HashingEmbedder, LinearHead};
    pub use crate::fallback::{FallbackConfig, FallbackReasoner};
    pub use crate::pattern::{PatternMatcher, PatternRule};
    pub use crate::stage::StageClassifier;
}
