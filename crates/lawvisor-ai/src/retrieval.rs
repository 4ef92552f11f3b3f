//! Regulation retrieval by embedding similarity.

use std::sync::Arc;

use async_trait::async_trait;
use lawvisor_core::{ArticleId, FailureKind, RegulationArticle, RetrievedPassage};
use tracing::debug;

use crate::embedder::{Embed, EmbedError, cosine_sim};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval backend failed: {0}")]
    Backend(String),
}

impl RetrievalError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::Recoverable
    }
}

impl From<EmbedError> for RetrievalError {
    fn from(e: EmbedError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Finds the regulation passages most relevant to a clause.
///
/// Results are ranked by descending similarity, ties by ascending article
/// id. Passages scoring at least `min_similarity` are kept, zero included;
/// none qualifying yields an empty result, not an error.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn retrieve(
        &self,
        clause_id: &str,
        clause_text: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError>;
}

struct IndexedArticle {
    article: Arc<RegulationArticle>,
    embedding: Vec<f32>,
}

/// Brute-force cosine index over whole articles.
pub struct VectorIndex {
    embedder: Arc<dyn Embed>,
    entries: Vec<IndexedArticle>,
}

impl VectorIndex {
    /// Embed `articles` (title and text). Later duplicates of an id replace
    /// earlier ones.
    pub fn build(
        embedder: Arc<dyn Embed>,
        articles: &[Arc<RegulationArticle>],
    ) -> Result<Self, RetrievalError> {
        let mut sorted: Vec<Arc<RegulationArticle>> = Vec::with_capacity(articles.len());
        for article in articles {
            match sorted.iter_mut().find(|a| a.id == article.id) {
                Some(slot) => *slot = Arc::clone(article),
                None => sorted.push(Arc::clone(article)),
            }
        }
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let docs: Vec<String> = sorted
            .iter()
            .map(|a| format!("{}. {}", a.title, a.text))
            .collect();
        let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
        let embeddings = embedder.embed_batch(&refs)?;

        let entries = sorted
            .into_iter()
            .zip(embeddings)
            .map(|(article, embedding)| IndexedArticle { article, embedding })
            .collect::<Vec<_>>();
        debug!(articles = entries.len(), dim = embedder.dim(), "built regulation index");
        Ok(Self { embedder, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indexed `(id, version)` pairs in id order.
    pub fn versions(&self) -> Vec<(ArticleId, String)> {
        self.entries
            .iter()
            .map(|e| (e.article.id.clone(), e.article.version.clone()))
            .collect()
    }

    fn rank(&self, clause_id: &str, query: &[f32], top_k: usize, min_similarity: f64) -> Vec<RetrievedPassage> {
        let mut hits: Vec<(f64, &RegulationArticle)> = self
            .entries
            .iter()
            .map(|e| {
                let sim = (cosine_sim(query, &e.embedding) as f64).clamp(0.0, 1.0);
                (sim, e.article.as_ref())
            })
            .filter(|(sim, _)| *sim >= min_similarity)
            .collect();

        hits.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(top_k);

        hits.into_iter()
            .enumerate()
            .map(|(i, (similarity, article))| RetrievedPassage {
                clause_id: clause_id.to_string(),
                article_id: article.id.clone(),
                version: article.version.clone(),
                title: article.title.clone(),
                passage_text: article.text.clone(),
                similarity,
                rank: i + 1,
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalIndex for VectorIndex {
    async fn retrieve(
        &self,
        clause_id: &str,
        clause_text: &str,
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(clause_text)?;
        let passages = self.rank(clause_id, &query, top_k, min_similarity);
        debug!(clause_id, hits = passages.len(), "retrieved passages");
        Ok(passages)
    }
}
