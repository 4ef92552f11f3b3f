//! Clause classification, regulation retrieval and grounded compliance reasoning.
//!
//! Every collaborator sits behind a narrow trait ([`Embed`],
//! [`ClauseClassifier`], [`RetrievalIndex`], [`Judge`]) so the pipeline can
//! run against deterministic fakes. The ONNX embedder is gated behind the
//! `onnx` feature.

pub mod classifier;
pub mod embedder;
pub mod judge;
pub mod labels;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod reasoner;
pub mod retrieval;
pub mod segment;

pub use classifier::{CentroidClassifier, ClassificationSummary, ClassifyError, ClauseClassifier};
pub use embedder::{Embed, EmbedError, HashingEmbedder};
pub use judge::{Judge, JudgeError, Judgment, RuleJudge};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
pub use reasoner::{ComplianceReasoner, ReasonError, parse_citation};
pub use retrieval::{RetrievalError, RetrievalIndex, VectorIndex};
pub use segment::{Segment, segment};
