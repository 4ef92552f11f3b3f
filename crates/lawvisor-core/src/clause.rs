//! Classified contract clauses.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Legal category of a clause.
///
/// Closed set: adding a variant requires a matching field in
/// [`CriticalityWeights`](crate::config::CriticalityWeights) and an entry in
/// [`implicated_articles`](crate::implicated_articles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClauseType {
    DataProtection,
    Liability,
    Termination,
    IntellectualProperty,
    Jurisdiction,
    Other,
}

impl ClauseType {
    pub const ALL: [ClauseType; 6] = [
        Self::DataProtection,
        Self::Liability,
        Self::Termination,
        Self::IntellectualProperty,
        Self::Jurisdiction,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataProtection => "data-protection",
            Self::Liability => "liability",
            Self::Termination => "termination",
            Self::IntellectualProperty => "intellectual-property",
            Self::Jurisdiction => "jurisdiction",
            Self::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DataProtection => "Data Protection & Privacy",
            Self::Liability => "Liability & Risk Allocation",
            Self::Termination => "Termination Rights",
            Self::IntellectualProperty => "Intellectual Property",
            Self::Jurisdiction => "Jurisdiction & Venue",
            Self::Other => "Other Provisions",
        }
    }
}

impl fmt::Display for ClauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified span of contract text.
///
/// Produced by the clause classifier in document order and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Unique within a document (`C001`, `C002`, ...).
    pub id: String,
    /// Zero-based position in document order.
    pub ordinal: usize,
    pub clause_type: ClauseType,
    /// Heading line when the clause starts with one.
    pub title: Option<String>,
    pub text: String,
    /// Byte range of `text` in the source document.
    pub span: Range<usize>,
    /// Classification confidence in `[0, 1]`.
    pub confidence: f64,
    /// Set when `confidence` is below the configured minimum. Flagged clauses
    /// are still emitted; the caller decides whether to score them.
    pub low_confidence: bool,
}

impl Clause {
    pub fn clause_id(ordinal: usize) -> String {
        format!("C{:03}", ordinal + 1)
    }

    /// Short preview of the clause text for reports.
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            return self.text.clone();
        }
        let cut: String = self.text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_ids_follow_document_order() {
        assert_eq!(Clause::clause_id(0), "C001");
        assert_eq!(Clause::clause_id(41), "C042");
        assert!(Clause::clause_id(8) < Clause::clause_id(9));
    }

    #[test]
    fn clause_type_serde_is_kebab_case() {
        let json = serde_json::to_string(&ClauseType::IntellectualProperty).unwrap();
        assert_eq!(json, "\"intellectual-property\"");
        for ty in ClauseType::ALL {
            assert_eq!(serde_json::to_string(&ty).unwrap(), format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let clause = Clause {
            id: "C001".into(),
            ordinal: 0,
            clause_type: ClauseType::Other,
            title: None,
            text: "Données personnelles traitées".into(),
            span: 0..30,
            confidence: 0.9,
            low_confidence: false,
        };
        assert_eq!(clause.preview(7), "Données...");
        assert_eq!(clause.preview(100), clause.text);
    }
}
