//! Retrieval results and per-clause compliance judgments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clause::ClauseType;
use crate::regulation::ArticleId;

// ── Risk buckets ──

/// Fixed, non-overlapping score buckets shared by clause, category and
/// overall scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        Self::Minimal,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
    ];

    /// Bucket a score in `[0, 100]`. Out-of-range input is clamped first.
    pub fn from_score(score: f64) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
        if score >= 80.0 {
            Self::Critical
        } else if score >= 60.0 {
            Self::High
        } else if score >= 40.0 {
            Self::Medium
        } else if score >= 20.0 {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Critical => "requires immediate attention",
            Self::High => "needs careful review before signing",
            Self::Medium => "has some areas that may need attention",
            Self::Low => "appears to be generally compliant",
            Self::Minimal => "shows minimal regulatory concerns",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Retrieval ──

/// A regulation passage retrieved for one clause.
///
/// Ephemeral: produced per retrieval request and consumed by the reasoner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub clause_id: String,
    pub article_id: ArticleId,
    /// Version of the article text that was indexed.
    pub version: String,
    pub title: String,
    pub passage_text: String,
    /// Cosine similarity clamped to `[0, 1]`.
    pub similarity: f64,
    /// 1-based position in the ranked result.
    pub rank: usize,
}

// ── Assessments ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssessmentStatus {
    Assessed,
    /// No passage cleared the similarity threshold; no risk is claimed.
    InsufficientEvidence,
}

/// A grounded reference to the exact article version an assessment relied on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Citation {
    pub article_id: ArticleId,
    pub version: String,
}

/// The reasoner's judgment for one clause. Never edited after creation;
/// re-analysis produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseRiskAssessment {
    pub clause_id: String,
    pub clause_type: ClauseType,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Subset of the passages retrieved for this clause.
    pub citations: Vec<Citation>,
    pub issues: Vec<String>,
    /// Step-by-step reasoning behind the score.
    pub reasoning: Vec<String>,
    pub explanation: String,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub status: AssessmentStatus,
}

impl ClauseRiskAssessment {
    /// The zero-risk, zero-citation answer for a clause nothing was retrieved for.
    pub fn insufficient_evidence(clause_id: impl Into<String>, clause_type: ClauseType) -> Self {
        Self {
            clause_id: clause_id.into(),
            clause_type,
            risk_score: 0.0,
            risk_level: RiskLevel::Minimal,
            citations: Vec::new(),
            issues: Vec::new(),
            reasoning: vec!["No retrieved passage cleared the similarity threshold.".to_string()],
            explanation: "No regulation passage was sufficiently similar to this clause; \
                          no compliance judgment was made."
                .to_string(),
            confidence: 0.0,
            recommendations: vec!["Have this clause reviewed manually by counsel.".to_string()],
            status: AssessmentStatus::InsufficientEvidence,
        }
    }

    pub fn is_assessed(&self) -> bool {
        self.status == AssessmentStatus::Assessed
    }

    pub fn cites(&self, article_id: &ArticleId) -> bool {
        self.citations.iter().any(|c| &c.article_id == article_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(19.99), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Critical);
    }

    #[test]
    fn out_of_range_scores_clamp() {
        assert_eq!(RiskLevel::from_score(-5.0), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(250.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(f64::NAN), RiskLevel::Minimal);
    }

    #[test]
    fn insufficient_evidence_claims_nothing() {
        let a = ClauseRiskAssessment::insufficient_evidence("C001", ClauseType::Liability);
        assert_eq!(a.risk_score, 0.0);
        assert_eq!(a.confidence, 0.0);
        assert!(a.citations.is_empty());
        assert!(!a.is_assessed());
        assert_eq!(
            serde_json::to_string(&a.status).unwrap(),
            "\"insufficient-evidence\""
        );
    }
}
