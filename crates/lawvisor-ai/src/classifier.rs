//! Centroid-based clause classification.
//!
//! Segments the document, embeds each segment, and scores it against one
//! centroid per [`ClauseType`] (the normalised mean of that type's exemplar
//! embeddings). Confidence is the softmax probability of the winning type.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use lawvisor_core::{Clause, ClauseType, FailureKind};
use serde::Serialize;
use tracing::debug;

use crate::embedder::{Embed, EmbedError, cosine_sim, normalize};
use crate::labels::exemplars;
use crate::segment::{Segment, segment};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifyError {
    /// The classification mechanism could not be reached. Retrying may help.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),
}

impl ClassifyError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::Recoverable
    }
}

impl From<EmbedError> for ClassifyError {
    fn from(e: EmbedError) -> Self {
        Self::ClassificationFailed(e.to_string())
    }
}

/// Turns document text into typed clauses in source order.
#[async_trait]
pub trait ClauseClassifier: Send + Sync {
    /// Every segment is emitted; clauses below the configured minimum
    /// confidence carry `low_confidence` rather than being dropped.
    async fn classify(&self, document_text: &str) -> Result<Vec<Clause>, ClassifyError>;
}

/// Centroid classifier over a pluggable embedder.
pub struct CentroidClassifier {
    embedder: Arc<dyn Embed>,
    /// In [`ClauseType::ALL`] order so ties resolve deterministically.
    centroids: Vec<(ClauseType, Vec<f32>)>,
    min_confidence: f64,
    temperature: f64,
}

impl CentroidClassifier {
    pub const DEFAULT_TEMPERATURE: f64 = 0.05;

    /// Compute one centroid per clause type from the built-in exemplars.
    pub fn build(embedder: Arc<dyn Embed>, min_confidence: f64) -> Result<Self, ClassifyError> {
        let dim = embedder.dim();
        let mut centroids = Vec::with_capacity(ClauseType::ALL.len());
        for clause_type in ClauseType::ALL {
            let vectors = embedder.embed_batch(exemplars(clause_type))?;
            let mut sum = vec![0.0f32; dim];
            for v in &vectors {
                for (acc, &val) in sum.iter_mut().zip(v) {
                    *acc += val;
                }
            }
            normalize(&mut sum);
            centroids.push((clause_type, sum));
        }
        debug!(dim, centroids = centroids.len(), "built clause centroids");
        Ok(Self {
            embedder,
            centroids,
            min_confidence,
            temperature: Self::DEFAULT_TEMPERATURE,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.max(1e-6);
        self
    }

    pub fn dim(&self) -> usize {
        self.embedder.dim()
    }

    /// Softmax probability per clause type, in [`ClauseType::ALL`] order.
    pub fn scores(&self, embedding: &[f32]) -> Vec<(ClauseType, f64)> {
        let sims: Vec<f64> = self
            .centroids
            .iter()
            .map(|(_, c)| cosine_sim(embedding, c) as f64)
            .collect();
        let max = sims.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = sims
            .iter()
            .map(|s| ((s - max) / self.temperature).exp())
            .collect();
        let total: f64 = exps.iter().sum();
        self.centroids
            .iter()
            .zip(exps)
            .map(|((ty, _), e)| (*ty, e / total))
            .collect()
    }

    fn best(&self, embedding: &[f32]) -> (ClauseType, f64) {
        // A vector with no signal (every token a stopword) matches nothing.
        if embedding.iter().all(|x| *x == 0.0) {
            return (ClauseType::Other, 1.0 / self.centroids.len() as f64);
        }
        let mut best = (ClauseType::Other, f64::NEG_INFINITY);
        for (ty, p) in self.scores(embedding) {
            if p > best.1 {
                best = (ty, p);
            }
        }
        best
    }

    /// Classify pre-segmented text.
    pub fn classify_segments(&self, segments: Vec<Segment>) -> Result<Vec<Clause>, ClassifyError> {
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != segments.len() {
            return Err(ClassifyError::ClassificationFailed(format!(
                "embedder returned {} vectors for {} segments",
                embeddings.len(),
                segments.len()
            )));
        }

        Ok(segments
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (seg, emb))| {
                let (clause_type, confidence) = self.best(&emb);
                Clause {
                    id: Clause::clause_id(ordinal),
                    ordinal,
                    clause_type,
                    title: seg.title,
                    text: seg.text,
                    span: seg.span,
                    confidence,
                    low_confidence: confidence < self.min_confidence,
                }
            })
            .collect())
    }
}

#[async_trait]
impl ClauseClassifier for CentroidClassifier {
    async fn classify(&self, document_text: &str) -> Result<Vec<Clause>, ClassifyError> {
        self.classify_segments(segment(document_text))
    }
}

/// Extraction statistics for a classified document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub total: usize,
    pub by_type: BTreeMap<ClauseType, usize>,
    pub average_confidence: f64,
    pub low_confidence: usize,
}

impl ClassificationSummary {
    pub fn from_clauses(clauses: &[Clause]) -> Self {
        let mut by_type = BTreeMap::new();
        for clause in clauses {
            *by_type.entry(clause.clause_type).or_insert(0) += 1;
        }
        let average_confidence = if clauses.is_empty() {
            0.0
        } else {
            clauses.iter().map(|c| c.confidence).sum::<f64>() / clauses.len() as f64
        };
        Self {
            total: clauses.len(),
            by_type,
            average_confidence,
            low_confidence: clauses.iter().filter(|c| c.low_confidence).count(),
        }
    }
}
