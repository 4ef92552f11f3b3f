//! Deterministic aggregation of clause assessments into a risk report.
//!
//! Pure: no I/O and no clock. The same inputs always produce the same report,
//! down to the bytes of the serialized breakdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use lawvisor_core::{
    AnalysisConfig, ArticleId, CategoryRisk, CitationRecord, Clause, ClauseRiskAssessment,
    ClauseType, CriticalityWeights, ExcludedClause, HighRiskClause, LevelCounts,
    RegulationArticle, RiskLevel, RiskReport, ScoringBreakdown, ScoringConfig,
};

const TOP_ISSUES: usize = 3;
const PREVIEW_CHARS: usize = 150;

/// Everything the scorer reads.
pub struct ScoringInput<'a> {
    pub document_id: &'a str,
    /// Classified clauses, used for previews.
    pub clauses: &'a [Clause],
    /// One assessment per non-excluded clause, in clause order. Includes
    /// insufficient-evidence assessments, which are listed but not scored.
    pub assessments: &'a [ClauseRiskAssessment],
    pub excluded: &'a [ExcludedClause],
    /// Article metadata for citation records.
    pub articles: &'a [Arc<RegulationArticle>],
}

#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: CriticalityWeights,
    scoring: ScoringConfig,
}

impl RiskScorer {
    pub fn new(weights: CriticalityWeights, scoring: ScoringConfig) -> Self {
        Self { weights, scoring }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.criticality.clone(), config.scoring.clone())
    }

    pub fn score(&self, input: &ScoringInput<'_>) -> RiskReport {
        let scored: Vec<&ClauseRiskAssessment> =
            input.assessments.iter().filter(|a| a.is_assessed()).collect();
        let unassessed_clauses: Vec<String> = input
            .assessments
            .iter()
            .filter(|a| !a.is_assessed())
            .map(|a| a.clause_id.clone())
            .collect();

        let categories = self.categories(&scored);
        let breakdown = self.breakdown(&scored, &categories);
        let overall_score = breakdown.overall;
        let overall_level = RiskLevel::from_score(overall_score);

        let mut level_counts = LevelCounts::default();
        for a in &scored {
            level_counts.add(a.risk_level);
        }
        let average_confidence = mean(scored.iter().map(|a| a.confidence));

        let high_risk_clauses = self.high_risk_clauses(&scored, input.clauses);
        let citations = citation_records(&scored, input.articles);
        let summary = summary(overall_score, overall_level, &categories, &citations);
        let degraded = !unassessed_clauses.is_empty() || !input.excluded.is_empty();

        RiskReport {
            document_id: input.document_id.to_string(),
            overall_score,
            overall_level,
            categories,
            high_risk_clauses,
            citations,
            breakdown,
            level_counts,
            average_confidence,
            summary,
            assessments: input.assessments.to_vec(),
            unassessed_clauses,
            excluded_clauses: input.excluded.to_vec(),
            degraded,
        }
    }

    /// Weighted mean per clause type, sorted by score descending then type order.
    fn categories(&self, scored: &[&ClauseRiskAssessment]) -> Vec<CategoryRisk> {
        let mut groups: BTreeMap<ClauseType, Vec<&ClauseRiskAssessment>> = BTreeMap::new();
        for a in scored {
            groups.entry(a.clause_type).or_default().push(a);
        }

        let mut categories: Vec<CategoryRisk> = groups
            .into_iter()
            .map(|(clause_type, members)| {
                let weight = self.weights.weight(clause_type);
                let total_weight = weight * members.len() as f64;
                let score = if total_weight > 0.0 {
                    members.iter().map(|a| a.risk_score * weight).sum::<f64>() / total_weight
                } else {
                    mean(members.iter().map(|a| a.risk_score))
                };

                let mut by_risk = members.clone();
                by_risk.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score).then_with(|| a.clause_id.cmp(&b.clause_id)));
                let mut top_issues: Vec<String> = Vec::new();
                for issue in by_risk.iter().flat_map(|a| a.issues.iter()) {
                    if top_issues.len() == TOP_ISSUES {
                        break;
                    }
                    if !top_issues.contains(issue) {
                        top_issues.push(issue.clone());
                    }
                }

                CategoryRisk {
                    clause_type,
                    score,
                    level: RiskLevel::from_score(score),
                    weight,
                    clause_count: members.len(),
                    clause_ids: members.iter().map(|a| a.clause_id.clone()).collect(),
                    top_issues,
                }
            })
            .collect();

        categories.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.clause_type.cmp(&b.clause_type)));
        categories
    }

    fn breakdown(&self, scored: &[&ClauseRiskAssessment], categories: &[CategoryRisk]) -> ScoringBreakdown {
        let s = &self.scoring;

        // Sum in type order so float rounding does not depend on sort order.
        let mut by_type: Vec<&CategoryRisk> = categories.iter().collect();
        by_type.sort_by_key(|c| c.clause_type);
        let weight_sum: f64 = by_type.iter().map(|c| c.weight).sum();
        let weighted_average = if weight_sum > 0.0 {
            by_type.iter().map(|c| c.score * c.weight).sum::<f64>() / weight_sum
        } else {
            mean(by_type.iter().map(|c| c.score))
        };
        let weighted_component = weighted_average * s.average_weight;

        let max_clause_score = scored.iter().map(|a| a.risk_score).fold(0.0, f64::max);
        let max_risk_penalty =
            (s.penalty_slope * (max_clause_score - s.penalty_threshold).max(0.0)).min(s.max_penalty);

        let high_risk_count = scored
            .iter()
            .filter(|a| a.risk_score >= s.high_risk_threshold)
            .count();
        let density_adjustment = if scored.is_empty() {
            0.0
        } else {
            (s.density_scale * high_risk_count as f64 / scored.len() as f64).min(s.max_density)
        };

        let raw_total = weighted_component + max_risk_penalty + density_adjustment;
        let overall = raw_total.clamp(0.0, 100.0);
        let formula = format!(
            "overall = clamp(0, 100, {weighted_average:.2} x {} + {max_risk_penalty:.2} + {density_adjustment:.2}) = {overall:.2}",
            s.average_weight
        );

        ScoringBreakdown {
            weighted_average,
            average_weight: s.average_weight,
            weighted_component,
            max_clause_score,
            penalty_threshold: s.penalty_threshold,
            penalty_slope: s.penalty_slope,
            max_penalty: s.max_penalty,
            max_risk_penalty,
            high_risk_threshold: s.high_risk_threshold,
            high_risk_count,
            scored_clause_count: scored.len(),
            density_scale: s.density_scale,
            max_density: s.max_density,
            density_adjustment,
            raw_total,
            overall,
            formula,
        }
    }

    fn high_risk_clauses(&self, scored: &[&ClauseRiskAssessment], clauses: &[Clause]) -> Vec<HighRiskClause> {
        let mut high: Vec<HighRiskClause> = scored
            .iter()
            .filter(|a| a.risk_score >= self.scoring.high_risk_threshold)
            .map(|a| HighRiskClause {
                clause_id: a.clause_id.clone(),
                clause_type: a.clause_type,
                risk_score: a.risk_score,
                risk_level: a.risk_level,
                preview: clauses
                    .iter()
                    .find(|c| c.id == a.clause_id)
                    .map(|c| c.preview(PREVIEW_CHARS))
                    .unwrap_or_default(),
            })
            .collect();
        high.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score).then_with(|| a.clause_id.cmp(&b.clause_id)));
        high
    }
}

/// One record per cited `(article, version)`, in article order.
fn citation_records(scored: &[&ClauseRiskAssessment], articles: &[Arc<RegulationArticle>]) -> Vec<CitationRecord> {
    let mut cited: BTreeMap<(ArticleId, String), Vec<String>> = BTreeMap::new();
    for a in scored {
        for c in &a.citations {
            let by = cited.entry((c.article_id.clone(), c.version.clone())).or_default();
            if !by.contains(&a.clause_id) {
                by.push(a.clause_id.clone());
            }
        }
    }

    cited
        .into_iter()
        .map(|((article_id, version), cited_by)| {
            let known = articles
                .iter()
                .find(|art| art.id == article_id && art.version == version)
                .or_else(|| articles.iter().find(|art| art.id == article_id));
            CitationRecord {
                title: known.map_or_else(|| article_id.to_string(), |art| art.title.clone()),
                source_url: known.map(|art| art.source_url.clone()).unwrap_or_default(),
                article_id,
                version,
                cited_by,
            }
        })
        .collect()
}

fn summary(score: f64, level: RiskLevel, categories: &[CategoryRisk], citations: &[CitationRecord]) -> String {
    let mut parts = vec![format!(
        "This contract has an overall risk score of {score:.0}/100 ({}) and {}.",
        level.as_str().to_ascii_uppercase(),
        level.description()
    )];

    let concerns: Vec<&str> = categories
        .iter()
        .filter(|c| c.level >= RiskLevel::High)
        .take(3)
        .map(|c| c.clause_type.display_name())
        .collect();
    if !concerns.is_empty() {
        parts.push(format!("Key areas of concern include: {}.", concerns.join(", ")));
    }

    let mut cited: Vec<String> = citations.iter().map(|c| c.article_id.to_string()).collect();
    cited.dedup();
    if !cited.is_empty() {
        cited.truncate(3);
        parts.push(format!("Cited regulations include: {}.", cited.join(", ")));
    }
    parts.join(" ")
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use lawvisor_core::{AssessmentStatus, Citation};

    use super::*;

    fn assessment(id: &str, clause_type: ClauseType, score: f64, cites: &[&str]) -> ClauseRiskAssessment {
        ClauseRiskAssessment {
            clause_id: id.into(),
            clause_type,
            risk_score: score,
            risk_level: RiskLevel::from_score(score),
            citations: cites
                .iter()
                .map(|c| Citation {
                    article_id: ArticleId::parse(c).unwrap(),
                    version: "v1".into(),
                })
                .collect(),
            issues: vec![format!("issue in {id}")],
            reasoning: vec![],
            explanation: String::new(),
            confidence: 0.5,
            recommendations: vec![],
            status: AssessmentStatus::Assessed,
        }
    }

    fn article(id: &str) -> Arc<RegulationArticle> {
        Arc::new(RegulationArticle {
            id: ArticleId::parse(id).unwrap(),
            title: format!("Title of {id}"),
            text: String::new(),
            key_requirements: vec![],
            penalties: vec![],
            source_url: format!("https://gdpr-info.eu/{id}"),
            last_verified: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            version: "v1".into(),
        })
    }

    fn input<'a>(assessments: &'a [ClauseRiskAssessment], excluded: &'a [ExcludedClause]) -> ScoringInput<'a> {
        ScoringInput {
            document_id: "doc-1",
            clauses: &[],
            assessments,
            excluded,
            articles: &[],
        }
    }

    fn uniform() -> RiskScorer {
        RiskScorer::new(CriticalityWeights::uniform(1.0), ScoringConfig::default())
    }

    #[test]
    fn reference_case_scores_47() {
        let assessments = [
            assessment("C001", ClauseType::DataProtection, 90.0, &["GDPR-Art-5"]),
            assessment("C002", ClauseType::Liability, 40.0, &["SEC-10b-5"]),
            assessment("C003", ClauseType::Termination, 30.0, &["GDPR-Art-17"]),
        ];
        let report = uniform().score(&input(&assessments, &[]));
        let b = &report.breakdown;
        assert!((b.weighted_average - 53.333_333).abs() < 1e-4);
        assert!((b.max_risk_penalty - 10.0).abs() < 1e-9);
        assert!((b.density_adjustment - 5.0).abs() < 1e-9);
        assert!((report.overall_score - 47.0).abs() < 1e-9);
        assert_eq!(report.overall_level, RiskLevel::Medium);
        assert!((b.rederive() - b.overall).abs() < 1e-12);
        assert_eq!(b.high_risk_count, 1);
    }

    #[test]
    fn same_category_gives_same_reference_score() {
        let assessments = [
            assessment("C001", ClauseType::Other, 90.0, &["GDPR-Art-5"]),
            assessment("C002", ClauseType::Other, 40.0, &["GDPR-Art-5"]),
            assessment("C003", ClauseType::Other, 30.0, &["GDPR-Art-5"]),
        ];
        let report = uniform().score(&input(&assessments, &[]));
        assert!((report.overall_score - 47.0).abs() < 1e-9);
    }

    #[test]
    fn rescoring_is_byte_identical() {
        let assessments = [
            assessment("C001", ClauseType::DataProtection, 73.0, &["GDPR-Art-5"]),
            assessment("C002", ClauseType::Jurisdiction, 12.5, &["GDPR-Art-44"]),
            assessment("C003", ClauseType::DataProtection, 88.0, &["GDPR-Art-32"]),
        ];
        let scorer = RiskScorer::new(CriticalityWeights::default(), ScoringConfig::default());
        let a = scorer.score(&input(&assessments, &[]));
        let b = scorer.score(&input(&assessments, &[]));
        assert_eq!(
            serde_json::to_string(&a.breakdown).unwrap(),
            serde_json::to_string(&b.breakdown).unwrap()
        );
        assert_eq!(a.overall_score.to_bits(), b.overall_score.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn overall_stays_in_range() {
        let all_max: Vec<_> = (0..10)
            .map(|i| assessment(&format!("C{i:03}"), ClauseType::DataProtection, 100.0, &["GDPR-Art-5"]))
            .collect();
        let mut aggressive = ScoringConfig::default();
        aggressive.average_weight = 1.0;
        let scorer = RiskScorer::new(CriticalityWeights::default(), aggressive);
        let report = scorer.score(&input(&all_max, &[]));
        assert_eq!(report.overall_score, 100.0);
        assert!(report.breakdown.raw_total > 100.0);

        let calm: Vec<_> = (0..4)
            .map(|i| assessment(&format!("C{i:03}"), ClauseType::Other, 5.0, &["GDPR-Art-5"]))
            .collect();
        let report = uniform().score(&input(&calm, &[]));
        assert!((report.overall_score - 3.0).abs() < 1e-9);
        assert_eq!(report.breakdown.max_risk_penalty, 0.0);
        assert_eq!(report.breakdown.density_adjustment, 0.0);

        let empty = uniform().score(&input(&[], &[]));
        assert_eq!(empty.overall_score, 0.0);
        assert_eq!(empty.overall_level, RiskLevel::Minimal);
    }

    #[test]
    fn categories_sorted_by_score_then_type() {
        let assessments = [
            assessment("C001", ClauseType::Other, 50.0, &["GDPR-Art-5"]),
            assessment("C002", ClauseType::Liability, 50.0, &["SEC-10b-5"]),
            assessment("C003", ClauseType::Jurisdiction, 70.0, &["GDPR-Art-44"]),
        ];
        let report = uniform().score(&input(&assessments, &[]));
        let order: Vec<ClauseType> = report.categories.iter().map(|c| c.clause_type).collect();
        assert_eq!(order, [ClauseType::Jurisdiction, ClauseType::Liability, ClauseType::Other]);
    }

    #[test]
    fn criticality_weights_shift_the_average() {
        let assessments = [
            assessment("C001", ClauseType::DataProtection, 80.0, &["GDPR-Art-5"]),
            assessment("C002", ClauseType::Other, 20.0, &["GDPR-Art-5"]),
        ];
        let mut weights = CriticalityWeights::uniform(1.0);
        weights.data_protection = 3.0;
        let report = RiskScorer::new(weights, ScoringConfig::default()).score(&input(&assessments, &[]));
        assert!((report.breakdown.weighted_average - 65.0).abs() < 1e-9);
    }

    #[test]
    fn unassessed_and_excluded_are_listed_not_scored() {
        let assessments = [
            assessment("C001", ClauseType::Liability, 60.0, &["SEC-10b-5"]),
            ClauseRiskAssessment::insufficient_evidence("C002", ClauseType::Other),
        ];
        let excluded = [ExcludedClause {
            clause_id: "C003".into(),
            reason: "evidence violation".into(),
        }];
        let report = uniform().score(&input(&assessments, &excluded));
        assert!(report.degraded);
        assert_eq!(report.unassessed_clauses, ["C002"]);
        assert_eq!(report.breakdown.scored_clause_count, 1);
        assert_eq!(report.level_counts.total(), 1);
        assert_eq!(report.assessments.len(), 2);
        assert!(report.category(ClauseType::Other).is_none());
    }

    #[test]
    fn citations_are_deduplicated_with_metadata() {
        let assessments = [
            assessment("C001", ClauseType::DataProtection, 70.0, &["GDPR-Art-32", "GDPR-Art-5"]),
            assessment("C002", ClauseType::DataProtection, 65.0, &["GDPR-Art-5"]),
        ];
        let articles = [article("GDPR-Art-5"), article("GDPR-Art-32")];
        let report = uniform().score(&ScoringInput {
            document_id: "doc-1",
            clauses: &[],
            assessments: &assessments,
            excluded: &[],
            articles: &articles,
        });
        let ids: Vec<String> = report.citations.iter().map(|c| c.article_id.to_string()).collect();
        assert_eq!(ids, ["GDPR-Art-5", "GDPR-Art-32"]);
        assert_eq!(report.citations[0].cited_by, ["C001", "C002"]);
        assert_eq!(report.citations[0].title, "Title of GDPR-Art-5");
        assert!(report.summary.contains("GDPR-Art-5"));
        assert_eq!(report.high_risk_clauses.len(), 2);
        assert_eq!(report.high_risk_clauses[0].clause_id, "C001");
    }

    #[test]
    fn summary_names_level_and_concerns() {
        let assessments = [assessment("C001", ClauseType::DataProtection, 95.0, &["GDPR-Art-5"])];
        let report = uniform().score(&input(&assessments, &[]));
        assert!(report.summary.starts_with("This contract has an overall risk score of"));
        assert!(report.summary.contains("Data Protection & Privacy"));
    }
}
