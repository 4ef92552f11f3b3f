//! Data model, configuration and failure taxonomy shared by every LawVisor crate.

pub mod assessment;
pub mod citation;
pub mod clause;
pub mod config;
pub mod document;
pub mod failure;
pub mod regulation;
pub mod report;

pub use assessment::{AssessmentStatus, Citation, ClauseRiskAssessment, RetrievedPassage, RiskLevel};
pub use citation::{article_sort_key, normalize_article_number, normalize_text};
pub use clause::{Clause, ClauseType};
pub use config::{
    AnalysisConfig, ClassificationConfig, ConfigError, CriticalityWeights, RegulationCacheConfig,
    RetrievalConfig, RetryPolicy, ScoringConfig, StageTimeouts,
};
pub use document::{Document, DocumentState, ExtractedText, Transition, TransitionError};
pub use failure::{FailureKind, PipelineFailure, ReasonCode, ThresholdBreach};
pub use regulation::{ArticleId, RegulationArticle, RegulationFamily, implicated_articles};
pub use report::{
    CategoryRisk, CitationRecord, ExcludedClause, HighRiskClause, LevelCounts, RiskReport,
    ScoringBreakdown,
};
