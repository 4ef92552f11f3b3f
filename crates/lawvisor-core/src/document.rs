//! Documents under analysis and their lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output of the intake/OCR collaborator: plain text plus confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub document_id: String,
    pub text: String,
    /// Text-extraction confidence per page or section, each in `[0, 1]`.
    pub section_confidence: Vec<f64>,
}

impl ExtractedText {
    /// Single-confidence input, as produced by native-text extraction.
    pub fn new(document_id: impl Into<String>, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
            section_confidence: vec![confidence],
        }
    }

    /// Mean of the per-section confidences; zero when no section reported one.
    pub fn overall_confidence(&self) -> f64 {
        mean_confidence(&self.section_confidence)
    }
}

/// Values are not range-checked here; a NaN or out-of-range section carries
/// through to the mean for the extraction guard to reject.
fn mean_confidence(sections: &[f64]) -> f64 {
    if sections.is_empty() {
        return 0.0;
    }
    sections.iter().sum::<f64>() / sections.len() as f64
}

/// Lifecycle state of a document in the analysis pipeline.
///
/// `pending → extracting → classifying → retrieving → reasoning → scoring →
/// completed`, with `failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Extracting,
    Classifying,
    Retrieving,
    Reasoning,
    Scoring,
    Completed,
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::Classifying => "classifying",
            Self::Retrieving => "retrieving",
            Self::Reasoning => "reasoning",
            Self::Scoring => "scoring",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The state that follows on success, if any.
    pub fn next(&self) -> Option<DocumentState> {
        match self {
            Self::Pending => Some(Self::Extracting),
            Self::Extracting => Some(Self::Classifying),
            Self::Classifying => Some(Self::Retrieving),
            Self::Retrieving => Some(Self::Reasoning),
            Self::Reasoning => Some(Self::Scoring),
            Self::Scoring => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: DocumentState,
    pub to: DocumentState,
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: DocumentState,
    pub at: DateTime<Utc>,
}

/// A document under analysis.
///
/// The text is fixed at construction; only the orchestrator advances `state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: String,
    text: String,
    section_confidence: Vec<f64>,
    state: DocumentState,
    history: Vec<Transition>,
}

impl Document {
    pub fn new(input: ExtractedText) -> Self {
        Self {
            id: input.document_id,
            text: input.text,
            section_confidence: input.section_confidence,
            state: DocumentState::Pending,
            history: vec![Transition {
                state: DocumentState::Pending,
                at: Utc::now(),
            }],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn section_confidence(&self) -> &[f64] {
        &self.section_confidence
    }

    pub fn overall_confidence(&self) -> f64 {
        mean_confidence(&self.section_confidence)
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Last non-failed state the document reached.
    pub fn progress(&self) -> DocumentState {
        self.history
            .iter()
            .rev()
            .map(|t| t.state)
            .find(|s| *s != DocumentState::Failed)
            .unwrap_or(DocumentState::Pending)
    }

    /// Move to the next stage in order.
    pub fn advance(&mut self) -> Result<DocumentState, TransitionError> {
        let next = self.state.next().ok_or(TransitionError {
            from: self.state,
            to: self.state,
        })?;
        self.record(next);
        Ok(next)
    }

    /// Halt the document. Allowed from every non-terminal state.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError {
                from: self.state,
                to: DocumentState::Failed,
            });
        }
        self.record(DocumentState::Failed);
        Ok(())
    }

    fn record(&mut self, state: DocumentState) {
        self.state = state;
        self.history.push(Transition {
            state,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(ExtractedText::new("doc-1", "Some contract text.", 0.95))
    }

    #[test]
    fn advances_through_every_stage() {
        let mut d = doc();
        let mut seen = vec![d.state()];
        while !d.state().is_terminal() {
            seen.push(d.advance().unwrap());
        }
        assert_eq!(
            seen,
            [
                DocumentState::Pending,
                DocumentState::Extracting,
                DocumentState::Classifying,
                DocumentState::Retrieving,
                DocumentState::Reasoning,
                DocumentState::Scoring,
                DocumentState::Completed,
            ]
        );
        assert!(d.advance().is_err());
        assert!(d.fail().is_err());
    }

    #[test]
    fn fail_reachable_from_any_stage_and_keeps_progress() {
        let mut d = doc();
        d.advance().unwrap();
        d.advance().unwrap();
        d.fail().unwrap();
        assert_eq!(d.state(), DocumentState::Failed);
        assert_eq!(d.progress(), DocumentState::Classifying);
        assert!(d.advance().is_err());
    }

    #[test]
    fn overall_confidence_is_mean() {
        let input = ExtractedText {
            document_id: "d".into(),
            text: "t".into(),
            section_confidence: vec![0.9, 0.7],
        };
        assert!((input.overall_confidence() - 0.8).abs() < 1e-12);
        assert!((Document::new(input).overall_confidence() - 0.8).abs() < 1e-12);

        let empty = ExtractedText {
            section_confidence: vec![],
            ..ExtractedText::new("d", "t", 1.0)
        };
        assert_eq!(empty.overall_confidence(), 0.0);
    }

    #[test]
    fn nan_section_confidence_is_not_masked() {
        let input = ExtractedText {
            section_confidence: vec![0.9, f64::NAN],
            ..ExtractedText::new("d", "t", 1.0)
        };
        assert!(input.overall_confidence().is_nan());
        assert!(Document::new(input).overall_confidence().is_nan());
    }
}
