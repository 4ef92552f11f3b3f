//! Text embedding.
//!
//! Retrieval and classification only depend on cosine similarity between
//! unit vectors, so the embedding technique is swappable behind [`Embed`].
//! [`HashingEmbedder`] is deterministic and dependency-free; the ONNX
//! sentence-transformers pipeline lives behind the `onnx` feature.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding backend failed: {0}")]
    Backend(String),

    #[error("embedding has dimension {got}, expected {expected}")]
    Dimension { expected: usize, got: usize },
}

/// Produces L2-normalised embeddings.
pub trait Embed: Send + Sync {
    fn dim(&self) -> usize;

    /// One normalised vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbedError::Backend("empty batch result".into()))
    }
}

// ── Feature hashing ──

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9']*|\d+").unwrap());

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in",
    "is", "it", "its", "of", "on", "or", "such", "that", "the", "their", "this", "to", "which",
    "with", "will", "shall", "may", "all", "other", "under", "upon", "into", "than", "these",
    "those", "been", "being", "not", "no", "if", "so", "we", "our", "you", "your",
];

/// Bag-of-words feature hashing (FNV-1a, signed buckets, sublinear term
/// frequency), L2-normalised.
///
/// Deterministic across runs and platforms, which makes it the default for
/// tests and offline analysis.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIM: usize = 1024;

    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut counts: Vec<(u64, u32)> = Vec::new();
        for token in tokens(text) {
            let h = fnv1a(token.as_bytes());
            match counts.iter_mut().find(|(k, _)| *k == h) {
                Some((_, n)) => *n += 1,
                None => counts.push((h, 1)),
            }
        }

        let mut v = vec![0.0f32; self.dim];
        for (h, n) in counts {
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) & 1 == 1 { -1.0 } else { 1.0 };
            v[idx] += sign * (1.0 + (n as f32).ln());
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIM)
    }
}

impl Embed for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Lower-cased, stopword-free, lightly stemmed tokens.
pub(crate) fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(&t.as_str()))
        .map(stem)
}

fn stem(token: String) -> String {
    let trimmed = token.trim_end_matches('\'');
    let mut token = trimmed.strip_suffix("'s").unwrap_or(trimmed).to_string();
    if token.len() > 4 {
        if let Some(base) = token.strip_suffix("ies") {
            return format!("{base}y");
        }
        if token.ends_with('s') && !token.ends_with("ss") && !token.ends_with("us") {
            token.pop();
        }
    }
    token
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// L2-normalize a vector in place.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two unit vectors.
pub(crate) fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_are_unit_length() {
        let e = HashingEmbedder::default();
        let v = e.embed("The processor shall encrypt personal data at rest.").unwrap();
        assert_eq!(v.len(), HashingEmbedder::DEFAULT_DIM);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "expected unit norm, got {norm}");
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(64);
        let v = e.embed("the of and").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn deterministic() {
        let e = HashingEmbedder::default();
        let a = e.embed("Governing law and jurisdiction").unwrap();
        let b = e.embed("Governing law and jurisdiction").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn similar_texts_closer() {
        let e = HashingEmbedder::default();
        let breach = e
            .embed("notify the controller of a personal data breach within 72 hours")
            .unwrap();
        let article = e
            .embed("the controller shall notify the supervisory authority of a personal data breach not later than 72 hours")
            .unwrap();
        let venue = e
            .embed("the courts of Delaware have exclusive jurisdiction over disputes")
            .unwrap();
        assert!(cosine_sim(&breach, &article) > cosine_sim(&breach, &venue));
    }

    #[test]
    fn stemming_merges_plurals() {
        assert_eq!(stem("processors".into()), "processor");
        assert_eq!(stem("parties".into()), "party");
        assert_eq!(stem("process".into()), "process");
        assert_eq!(stem("controller's".into()), "controller");
        let collected: Vec<String> = tokens("The Data Subjects' rights").collect();
        assert_eq!(collected, ["data", "subject", "right"]);
    }

    #[test]
    fn batch_preserves_order() {
        let e = HashingEmbedder::new(128);
        let batch = e.embed_batch(&["alpha clause", "beta clause"]).unwrap();
        assert_eq!(batch[0], e.embed("alpha clause").unwrap());
        assert_eq!(batch[1], e.embed("beta clause").unwrap());
    }
}
