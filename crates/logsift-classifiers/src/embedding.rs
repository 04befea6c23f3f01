//! Embedding classification stage
//!
//! Computes a vector embedding of the message and applies a linear decision
//! boundary over the category set. The encoder sits behind the [`Embedder`]
//! trait; [`HashingEmbedder`] is the model-free default used when no
//! external encoder is wired in.
//!
//! Confidence gating is explicit configuration: with a threshold set, a top
//! probability below it yields `Miss` so the router falls through to the
//! fallback stage; without one the top class always wins. A top class of
//! `unclassified` is reported as `Miss` either way.

use crate::stage::StageClassifier;
use async_trait::async_trait;
use logsift_core::{Category, Error, LogEntry, Result, Stage, StageOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Produces a fixed-dimension vector embedding of a message
pub trait Embedder: Send + Sync {
    /// Embed the given text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension of this encoder
    fn dimension(&self) -> usize;
}

/// Feature-hashing encoder: tokens are hashed into a fixed number of
/// buckets and the resulting count vector is L2-normalized.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Default embedding dimension
    pub const DEFAULT_DIMENSION: usize = 256;

    /// Create an encoder with the given number of hash buckets
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token.to_lowercase().as_bytes()) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a: stable across processes, unlike the std hasher, so trained
/// heads keep matching the encoder between runs.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Linear decision boundary trained offline and loaded from a JSON artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearHead {
    /// One label per output row
    pub labels: Vec<Category>,

    /// Row-major weight matrix, one row per label
    pub weights: Vec<Vec<f32>>,

    /// One bias term per label
    pub bias: Vec<f32>,
}

impl LinearHead {
    /// Load a head from a JSON artifact
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let head: Self = serde_json::from_str(&content)?;
        Ok(head)
    }

    /// Check internal consistency against an encoder dimension
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.labels.is_empty() {
            return Err(Error::config("linear head has no labels"));
        }
        if self.weights.len() != self.labels.len() || self.bias.len() != self.labels.len() {
            return Err(Error::config(format!(
                "linear head shape mismatch: {} labels, {} weight rows, {} bias terms",
                self.labels.len(),
                self.weights.len(),
                self.bias.len()
            )));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != dimension) {
            return Err(Error::config(format!(
                "weight row has dimension {}, encoder produces {}",
                row.len(),
                dimension
            )));
        }
        Ok(())
    }

    /// Softmax probabilities over all labels for one embedding
    fn probabilities(&self, embedding: &[f32]) -> Vec<f32> {
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                row.iter()
                    .zip(embedding)
                    .map(|(w, x)| w * x)
                    .sum::<f32>()
                    + bias
            })
            .collect();

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}

/// Embedding + linear-head classification stage
pub struct EmbeddingClassifier {
    name: String,
    embedder: Arc<dyn Embedder>,
    head: LinearHead,
    confidence_threshold: Option<f32>,
}

impl EmbeddingClassifier {
    /// Create a classifier; validates the head against the encoder
    pub fn new(
        embedder: Arc<dyn Embedder>,
        head: LinearHead,
        confidence_threshold: Option<f32>,
    ) -> Result<Self> {
        head.validate(embedder.dimension())?;
        if let Some(threshold) = confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::config(format!(
                    "confidence threshold {threshold} outside [0, 1]"
                )));
            }
        }
        Ok(Self {
            name: "embedding".to_string(),
            embedder,
            head,
            confidence_threshold,
        })
    }
}

#[async_trait]
impl StageClassifier for EmbeddingClassifier {
    async fn classify(&self, entry: &LogEntry) -> Result<StageOutcome> {
        if entry.message.is_empty() {
            return Ok(StageOutcome::Miss);
        }

        let embedding = self.embedder.embed(&entry.message)?;
        let probabilities = self.head.probabilities(&embedding);

        let (top_index, top_probability) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| Error::stage("linear head produced no probabilities"))?;

        if let Some(threshold) = self.confidence_threshold {
            if top_probability < threshold {
                tracing::debug!(
                    probability = top_probability,
                    threshold,
                    "embedding confidence below threshold"
                );
                return Ok(StageOutcome::Miss);
            }
        }

        let label = &self.head.labels[top_index];
        if label.is_unclassified() {
            return Ok(StageOutcome::Miss);
        }

        Ok(StageOutcome::Matched(label.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> Stage {
        Stage::Embedding
    }
}
