//! The finished, immutable risk report for one document.

use serde::{Deserialize, Serialize};

use crate::assessment::{ClauseRiskAssessment, RiskLevel};
use crate::clause::ClauseType;
use crate::regulation::ArticleId;

/// Aggregate over every scored assessment sharing a clause type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRisk {
    pub clause_type: ClauseType,
    pub score: f64,
    pub level: RiskLevel,
    /// Criticality weight applied to this category in the overall average.
    pub weight: f64,
    pub clause_count: usize,
    pub clause_ids: Vec<String>,
    pub top_issues: Vec<String>,
}

/// Every term of the overall-score formula together with its inputs.
///
/// `overall` can always be re-derived from the stored fields with
/// [`ScoringBreakdown::rederive`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    pub weighted_average: f64,
    pub average_weight: f64,
    pub weighted_component: f64,

    pub max_clause_score: f64,
    pub penalty_threshold: f64,
    pub penalty_slope: f64,
    pub max_penalty: f64,
    pub max_risk_penalty: f64,

    pub high_risk_threshold: f64,
    pub high_risk_count: usize,
    pub scored_clause_count: usize,
    pub density_scale: f64,
    pub max_density: f64,
    pub density_adjustment: f64,

    /// Sum of the three terms before clamping.
    pub raw_total: f64,
    pub overall: f64,
    pub formula: String,
}

impl ScoringBreakdown {
    /// Recompute the overall score from the stored inputs.
    pub fn rederive(&self) -> f64 {
        let weighted = self.weighted_average * self.average_weight;
        let excess = (self.max_clause_score - self.penalty_threshold).max(0.0);
        let penalty = (self.penalty_slope * excess).min(self.max_penalty);
        let density = if self.scored_clause_count == 0 {
            0.0
        } else {
            (self.density_scale * self.high_risk_count as f64 / self.scored_clause_count as f64)
                .min(self.max_density)
        };
        (weighted + penalty + density).clamp(0.0, 100.0)
    }
}

/// A cited article, deduplicated across the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationRecord {
    pub article_id: ArticleId,
    pub version: String,
    pub title: String,
    pub source_url: String,
    /// Clause ids whose assessments cite this article version.
    pub cited_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighRiskClause {
    pub clause_id: String,
    pub clause_type: ClauseType,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedClause {
    pub clause_id: String,
    pub reason: String,
}

/// Clause counts per risk bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub minimal: usize,
}

impl LevelCounts {
    pub fn add(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Critical => self.critical += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
            RiskLevel::Minimal => self.minimal += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.minimal
    }
}

/// Result of one successful analysis run. Superseded, never edited, by
/// later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub document_id: String,
    pub overall_score: f64,
    pub overall_level: RiskLevel,
    /// Sorted by score descending, ties by clause type order.
    pub categories: Vec<CategoryRisk>,
    pub high_risk_clauses: Vec<HighRiskClause>,
    pub citations: Vec<CitationRecord>,
    pub breakdown: ScoringBreakdown,
    pub level_counts: LevelCounts,
    pub average_confidence: f64,
    pub summary: String,
    /// Assessments in clause order.
    pub assessments: Vec<ClauseRiskAssessment>,
    /// Clauses that came back with insufficient evidence.
    pub unassessed_clauses: Vec<String>,
    pub excluded_clauses: Vec<ExcludedClause>,
    /// Set when any clause was unassessed or excluded.
    pub degraded: bool,
}

impl RiskReport {
    pub fn category(&self, clause_type: ClauseType) -> Option<&CategoryRisk> {
        self.categories.iter().find(|c| c.clause_type == clause_type)
    }

    pub fn assessment(&self, clause_id: &str) -> Option<&ClauseRiskAssessment> {
        self.assessments.iter().find(|a| a.clause_id == clause_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(max: f64, high: usize, total: usize, avg: f64) -> ScoringBreakdown {
        ScoringBreakdown {
            weighted_average: avg,
            average_weight: 0.6,
            weighted_component: 0.0,
            max_clause_score: max,
            penalty_threshold: 80.0,
            penalty_slope: 1.0,
            max_penalty: 20.0,
            max_risk_penalty: 0.0,
            high_risk_threshold: 60.0,
            high_risk_count: high,
            scored_clause_count: total,
            density_scale: 15.0,
            max_density: 15.0,
            density_adjustment: 0.0,
            raw_total: 0.0,
            overall: 0.0,
            formula: String::new(),
        }
    }

    #[test]
    fn rederive_reproduces_reference_case() {
        let b = breakdown(90.0, 1, 3, 160.0 / 3.0);
        assert!((b.rederive() - 47.0).abs() < 1e-9);
    }

    #[test]
    fn rederive_clamps() {
        assert_eq!(breakdown(100.0, 5, 5, 100.0).rederive(), 95.0);
        let mut b = breakdown(100.0, 5, 5, 100.0);
        b.average_weight = 1.0;
        assert_eq!(b.rederive(), 100.0);
        assert_eq!(breakdown(0.0, 0, 0, 0.0).rederive(), 0.0);
    }

    #[test]
    fn level_counts_total() {
        let mut counts = LevelCounts::default();
        for level in RiskLevel::ALL {
            counts.add(level);
        }
        counts.add(RiskLevel::High);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.total(), 6);
    }
}
