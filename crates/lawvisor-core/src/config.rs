//! Analysis configuration.
//!
//! Every threshold the pipeline consults lives here so halt conditions can be
//! audited as data. Loading is layered with `figment`:
//! defaults -> optional TOML file -> `LAWVISOR_*` environment variables
//! (nested keys split on `__`, e.g. `LAWVISOR_RETRIEVAL__TOP_K=8`).

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::clause::ClauseType;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration consumed by the orchestrator's transition guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Documents whose mean extraction confidence is below this halt at
    /// `extracting`.
    pub ocr_confidence_threshold: f64,
    pub classification: ClassificationConfig,
    pub retrieval: RetrievalConfig,
    pub criticality: CriticalityWeights,
    pub scoring: ScoringConfig,
    pub timeouts: StageTimeouts,
    pub retry: RetryPolicy,
    pub regulations: RegulationCacheConfig,
    /// Re-assessments allowed after an evidence violation before the clause
    /// is excluded.
    pub evidence_retry_limit: u32,
    /// Clauses processed concurrently within a stage.
    pub max_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ocr_confidence_threshold: 0.70,
            classification: ClassificationConfig::default(),
            retrieval: RetrievalConfig::default(),
            criticality: CriticalityWeights::default(),
            scoring: ScoringConfig::default(),
            timeouts: StageTimeouts::default(),
            retry: RetryPolicy::default(),
            regulations: RegulationCacheConfig::default(),
            evidence_retry_limit: 1,
            max_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Clauses below this confidence are flagged `low_confidence`.
    pub min_confidence: f64,
    /// Leave flagged clauses out of scoring (they are listed as excluded).
    pub exclude_low_confidence: bool,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.40,
            exclude_low_confidence: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_similarity: f64,
    /// Halt when more than this share of clauses has no passage above
    /// `min_similarity`.
    pub max_unassessable_ratio: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.10,
            max_unassessable_ratio: 0.5,
        }
    }
}

/// Criticality weight per clause type. One field per variant so that adding a
/// [`ClauseType`] fails to compile until its weight is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalityWeights {
    pub data_protection: f64,
    pub liability: f64,
    pub termination: f64,
    pub intellectual_property: f64,
    pub jurisdiction: f64,
    pub other: f64,
}

impl CriticalityWeights {
    pub fn weight(&self, clause_type: ClauseType) -> f64 {
        match clause_type {
            ClauseType::DataProtection => self.data_protection,
            ClauseType::Liability => self.liability,
            ClauseType::Termination => self.termination,
            ClauseType::IntellectualProperty => self.intellectual_property,
            ClauseType::Jurisdiction => self.jurisdiction,
            ClauseType::Other => self.other,
        }
    }

    /// All weights set to the same value.
    pub fn uniform(weight: f64) -> Self {
        Self {
            data_protection: weight,
            liability: weight,
            termination: weight,
            intellectual_property: weight,
            jurisdiction: weight,
            other: weight,
        }
    }
}

impl Default for CriticalityWeights {
    fn default() -> Self {
        Self {
            data_protection: 1.5,
            liability: 1.4,
            termination: 1.2,
            intellectual_property: 1.3,
            jurisdiction: 1.2,
            other: 1.0,
        }
    }
}

/// Constants of the overall-score formula:
///
/// ```text
/// overall = clamp(0, 100, weighted_average * average_weight
///                         + min(max_penalty, penalty_slope * max(0, max_clause - penalty_threshold))
///                         + min(max_density, density_scale * high_risk / scored))
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub average_weight: f64,
    /// Clauses scoring at or above this count as high-risk.
    pub high_risk_threshold: f64,
    pub penalty_threshold: f64,
    pub penalty_slope: f64,
    pub max_penalty: f64,
    pub density_scale: f64,
    pub max_density: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            average_weight: 0.6,
            high_risk_threshold: 60.0,
            penalty_threshold: 80.0,
            penalty_slope: 1.0,
            max_penalty: 20.0,
            density_scale: 15.0,
            max_density: 15.0,
        }
    }
}

/// Per-stage timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub classifying_secs: u64,
    pub retrieving_secs: u64,
    pub reasoning_secs: u64,
}

impl StageTimeouts {
    pub fn classifying(&self) -> Duration {
        Duration::from_secs(self.classifying_secs)
    }

    pub fn retrieving(&self) -> Duration {
        Duration::from_secs(self.retrieving_secs)
    }

    pub fn reasoning(&self) -> Duration {
        Duration::from_secs(self.reasoning_secs)
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            classifying_secs: 60,
            retrieving_secs: 120,
            reasoning_secs: 300,
        }
    }
}

/// Exponential backoff for recoverable failures: `base_delay_ms * 2^attempt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulationCacheConfig {
    /// Cached articles older than this are re-fetched on access.
    pub refresh_after_secs: u64,
    /// A failed re-fetch falls back to the cached copy only while it is
    /// younger than this.
    pub stale_limit_secs: u64,
    /// URL prefixes regulation text may be fetched from.
    pub allowed_sources: Vec<String>,
}

impl Default for RegulationCacheConfig {
    fn default() -> Self {
        Self {
            refresh_after_secs: 24 * 60 * 60,
            stale_limit_secs: 7 * 24 * 60 * 60,
            allowed_sources: vec![
                "https://gdpr-info.eu/".to_string(),
                "https://www.sec.gov/".to_string(),
            ],
        }
    }
}

impl AnalysisConfig {
    /// Load defaults, then `path` if given, then `LAWVISOR_*` environment
    /// variables, and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AnalysisConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("LAWVISOR_").split("__"));

        let config: AnalysisConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        tracing::debug!(path = ?path, "configuration loaded");
        Ok(config)
    }

    /// Reject values outside their meaningful range, naming the field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit("ocr_confidence_threshold", self.ocr_confidence_threshold)?;
        unit("classification.min_confidence", self.classification.min_confidence)?;
        unit("retrieval.min_similarity", self.retrieval.min_similarity)?;
        unit(
            "retrieval.max_unassessable_ratio",
            self.retrieval.max_unassessable_ratio,
        )?;
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k", "must be at least 1");
        }

        for clause_type in ClauseType::ALL {
            let w = self.criticality.weight(clause_type);
            if !w.is_finite() || w <= 0.0 {
                return invalid("criticality", format!("weight for {clause_type} must be positive, got {w}"));
            }
        }

        let s = &self.scoring;
        non_negative("scoring.average_weight", s.average_weight)?;
        non_negative("scoring.penalty_slope", s.penalty_slope)?;
        non_negative("scoring.max_penalty", s.max_penalty)?;
        non_negative("scoring.density_scale", s.density_scale)?;
        non_negative("scoring.max_density", s.max_density)?;
        percent("scoring.high_risk_threshold", s.high_risk_threshold)?;
        percent("scoring.penalty_threshold", s.penalty_threshold)?;

        let t = &self.timeouts;
        if t.classifying_secs == 0 || t.retrieving_secs == 0 || t.reasoning_secs == 0 {
            return invalid("timeouts", "every stage timeout must be at least 1 second");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "must be at least 1");
        }
        if self.max_concurrency == 0 {
            return invalid("max_concurrency", "must be at least 1");
        }

        let r = &self.regulations;
        if r.stale_limit_secs < r.refresh_after_secs {
            return invalid(
                "regulations.stale_limit_secs",
                "must not be shorter than refresh_after_secs",
            );
        }
        if r.allowed_sources.is_empty() {
            return invalid("regulations.allowed_sources", "must name at least one source");
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        field,
        reason: reason.into(),
    })
}

fn unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(field, format!("must be within [0, 1], got {value}"))
    }
}

fn percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        invalid(field, format!("must be within [0, 100], got {value}"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        invalid(field, format!("must be non-negative, got {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn data_protection_outweighs_boilerplate() {
        let w = CriticalityWeights::default();
        assert!(w.weight(ClauseType::DataProtection) > w.weight(ClauseType::Other));
        assert_eq!(w.weight(ClauseType::Liability), 1.4);
    }

    #[test]
    fn validate_names_offending_field() {
        let mut config = AnalysisConfig::default();
        config.ocr_confidence_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ocr_confidence_threshold"));

        let mut config = AnalysisConfig::default();
        config.criticality.jurisdiction = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jurisdiction"));

        let mut config = AnalysisConfig::default();
        config.regulations.stale_limit_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(200));
        assert_eq!(policy.delay(1), Duration::from_millis(400));
        assert_eq!(policy.delay(2), Duration::from_millis(800));
    }

    #[test]
    fn layered_load_from_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "lawvisor.toml",
                r#"
                ocr_confidence_threshold = 0.85

                [retrieval]
                top_k = 3

                [criticality]
                liability = 2.0
                "#,
            )?;
            jail.set_env("LAWVISOR_RETRIEVAL__TOP_K", "7");

            let config = AnalysisConfig::load(Some(Path::new("lawvisor.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.ocr_confidence_threshold, 0.85);
            assert_eq!(config.retrieval.top_k, 7);
            assert_eq!(config.criticality.liability, 2.0);
            assert_eq!(config.criticality.data_protection, 1.5);
            assert_eq!(config.retrieval.min_similarity, 0.10);
            Ok(())
        });
    }

    #[test]
    fn load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LAWVISOR_RETRIEVAL__TOP_K", "0");
            let err = AnalysisConfig::load(None).unwrap_err();
            assert!(err.to_string().contains("retrieval.top_k"));
            Ok(())
        });
    }
}
