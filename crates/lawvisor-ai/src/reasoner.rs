//! Grounded compliance assessment of a single clause.
//!
//! The reasoner owns the no-hallucination contract: a clause with no
//! retrieved passages gets an insufficient-evidence assessment without
//! consulting the judge, and every citation the judge returns must resolve to
//! one of the passages retrieved for that clause.

use std::collections::BTreeSet;
use std::sync::Arc;

use lawvisor_core::{
    ArticleId, AssessmentStatus, Citation, Clause, ClauseRiskAssessment, FailureKind,
    RetrievedPassage, RiskLevel,
};
use tracing::{debug, warn};

use crate::judge::{Judge, JudgeError, Judgment};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReasonError {
    #[error("reasoning unavailable for clause {clause_id}: {reason}")]
    ReasoningUnavailable { clause_id: String, reason: String },

    #[error("clause {clause_id} cites material that was not retrieved for it: {}", .cited.join(", "))]
    EvidenceViolation { clause_id: String, cited: Vec<String> },

    #[error("clause {clause_id} claims risk {risk_score} without citing any retrieved passage")]
    UncitedRisk { clause_id: String, risk_score: f64 },
}

impl ReasonError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ReasoningUnavailable { .. } => FailureKind::Recoverable,
            Self::EvidenceViolation { .. } | Self::UncitedRisk { .. } => FailureKind::EvidenceViolation,
        }
    }

    pub fn clause_id(&self) -> &str {
        match self {
            Self::ReasoningUnavailable { clause_id, .. }
            | Self::EvidenceViolation { clause_id, .. }
            | Self::UncitedRisk { clause_id, .. } => clause_id,
        }
    }
}

/// Compares a clause against its retrieved passages through a [`Judge`] and
/// validates the result.
#[derive(Clone)]
pub struct ComplianceReasoner {
    judge: Arc<dyn Judge>,
}

impl ComplianceReasoner {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    pub fn judge_name(&self) -> &str {
        self.judge.name()
    }

    pub async fn assess(
        &self,
        clause: &Clause,
        passages: &[RetrievedPassage],
    ) -> Result<ClauseRiskAssessment, ReasonError> {
        let passages: Vec<RetrievedPassage> = passages
            .iter()
            .filter(|p| p.clause_id == clause.id)
            .cloned()
            .collect();
        if passages.is_empty() {
            debug!(clause_id = %clause.id, "no evidence; skipping judge");
            return Ok(ClauseRiskAssessment::insufficient_evidence(&clause.id, clause.clause_type));
        }

        let judgment = self.judge.judge(clause, &passages).await.map_err(|e| match e {
            JudgeError::Unavailable(reason) | JudgeError::Malformed(reason) => {
                ReasonError::ReasoningUnavailable {
                    clause_id: clause.id.clone(),
                    reason,
                }
            }
        })?;

        ground(clause, &passages, judgment)
    }
}

/// Resolve the judge's citations against the supplied passages and build the
/// assessment.
fn ground(
    clause: &Clause,
    passages: &[RetrievedPassage],
    judgment: Judgment,
) -> Result<ClauseRiskAssessment, ReasonError> {
    let mut cited: BTreeSet<ArticleId> = BTreeSet::new();
    let mut ungrounded = Vec::new();
    for raw in &judgment.cited {
        match parse_citation(raw) {
            Some(id) if passages.iter().any(|p| p.article_id == id) => {
                cited.insert(id);
            }
            _ => ungrounded.push(raw.clone()),
        }
    }
    if !ungrounded.is_empty() {
        warn!(clause_id = %clause.id, judge_cited = ?ungrounded, "rejecting ungrounded citation");
        return Err(ReasonError::EvidenceViolation {
            clause_id: clause.id.clone(),
            cited: ungrounded,
        });
    }

    let risk_score = if judgment.risk_score.is_nan() {
        0.0
    } else {
        judgment.risk_score.clamp(0.0, 100.0)
    };
    if risk_score > 0.0 && cited.is_empty() {
        warn!(clause_id = %clause.id, risk_score, "rejecting uncited risk claim");
        return Err(ReasonError::UncitedRisk {
            clause_id: clause.id.clone(),
            risk_score,
        });
    }

    let citations: Vec<Citation> = cited
        .iter()
        .filter_map(|id| {
            passages.iter().find(|p| &p.article_id == id).map(|p| Citation {
                article_id: id.clone(),
                version: p.version.clone(),
            })
        })
        .collect();

    let support = if citations.is_empty() {
        passages.iter().map(|p| p.similarity).fold(0.0, f64::max)
    } else {
        let sims: Vec<f64> = citations
            .iter()
            .filter_map(|c| passages.iter().find(|p| p.article_id == c.article_id))
            .map(|p| p.similarity)
            .collect();
        sims.iter().sum::<f64>() / sims.len() as f64
    };
    let confidence = (clause.confidence * support).clamp(0.0, 1.0);

    Ok(ClauseRiskAssessment {
        clause_id: clause.id.clone(),
        clause_type: clause.clause_type,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        citations,
        issues: judgment.issues,
        reasoning: judgment.reasoning,
        explanation: judgment.explanation,
        confidence,
        recommendations: judgment.recommendations,
        status: AssessmentStatus::Assessed,
    })
}

/// Parse a citation as a judge might write it, ignoring paragraph markers:
/// `GDPR Article 5(1)(c)` resolves to `GDPR-Art-5`.
pub fn parse_citation(raw: &str) -> Option<ArticleId> {
    let head = raw.split('(').next().unwrap_or(raw).trim();
    ArticleId::parse(head).ok()
}
