//! Failure taxonomy and the structured halt returned instead of a report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentState;

/// How a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient mechanism failure; retried with backoff, then escalated.
    Recoverable,
    /// An assessment cited material it was not given. Fatal to that clause.
    EvidenceViolation,
    /// No verifiable source text. Fatal to the document.
    RegulationUnavailable,
    /// OCR or retrieval confidence below threshold. Fatal to the document.
    InsufficientConfidence,
    Timeout,
}

impl FailureKind {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::EvidenceViolation => "evidence_violation",
            Self::RegulationUnavailable => "regulation_unavailable",
            Self::InsufficientConfidence => "insufficient_confidence",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a document halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    OcrConfidenceBelowThreshold,
    EmptyDocument,
    NoClausesFound,
    RegulationUnavailable,
    RetrievalCoverageBelowThreshold,
    StageTimeout,
    RetriesExhausted,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OcrConfidenceBelowThreshold => "OCR_CONFIDENCE_BELOW_THRESHOLD",
            Self::EmptyDocument => "EMPTY_DOCUMENT",
            Self::NoClausesFound => "NO_CLAUSES_FOUND",
            Self::RegulationUnavailable => "REGULATION_UNAVAILABLE",
            Self::RetrievalCoverageBelowThreshold => "RETRIEVAL_COVERAGE_BELOW_THRESHOLD",
            Self::StageTimeout => "STAGE_TIMEOUT",
            Self::RetriesExhausted => "RETRIES_EXHAUSTED",
        }
    }

    /// The taxonomy bucket a halt with this reason belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::OcrConfidenceBelowThreshold
            | Self::EmptyDocument
            | Self::NoClausesFound
            | Self::RetrievalCoverageBelowThreshold => FailureKind::InsufficientConfidence,
            Self::RegulationUnavailable => FailureKind::RegulationUnavailable,
            Self::StageTimeout => FailureKind::Timeout,
            Self::RetriesExhausted => FailureKind::Recoverable,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The threshold a halt violated and the value that violated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub metric: String,
    pub observed: f64,
    pub threshold: f64,
}

/// A document-level halt: a single reason code plus the progress reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("document {document_id} failed at {failed_at} ({reason}): {message}")]
pub struct PipelineFailure {
    pub document_id: String,
    /// Stage that was running when the halt fired.
    pub failed_at: DocumentState,
    /// Last stage that completed before the halt.
    pub reached: DocumentState,
    pub reason: ReasonCode,
    pub kind: FailureKind,
    pub message: String,
    pub breach: Option<ThresholdBreach>,
}

impl PipelineFailure {
    pub fn new(
        document_id: impl Into<String>,
        failed_at: DocumentState,
        reached: DocumentState,
        reason: ReasonCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            failed_at,
            reached,
            reason,
            kind: reason.kind(),
            message: message.into(),
            breach: None,
        }
    }

    pub fn with_breach(mut self, metric: impl Into<String>, observed: f64, threshold: f64) -> Self {
        self.breach = Some(ThresholdBreach {
            metric: metric.into(),
            observed,
            threshold,
        });
        self
    }

    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = kind;
        self
    }
}
