//! Logsift Router
//!
//! The decision layer of the pipeline:
//! - [`RoutingPolicy`]: per-source overrides and stage enablement
//! - [`ClassificationRouter`]: walks pattern, embedding, and fallback
//!   stages per entry, degrading stage errors at the entry boundary
//! - [`ClassificationService`]: batch façade composing the cache around
//!   the router and the performance monitor around both
//! - [`ServiceConfig`]: YAML configuration with startup validation

pub mod config;
pub mod policy;
pub mod router;
pub mod service;

pub use config::{CacheSettings, EmbeddingSettings, FallbackSettings, RuleSpec, ServiceConfig};
pub use policy::RoutingPolicy;
pub use router::{ClassificationRouter, RouterStats};
pub use service::ClassificationService;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ServiceConfig;
    pub use crate::policy::RoutingPolicy;
    pub use crate::router::{ClassificationRouter, RouterStats};
    pub use crate::service::ClassificationService;
}
