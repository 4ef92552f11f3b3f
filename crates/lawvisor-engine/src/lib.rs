//! Analysis pipeline: document state machine, stage guards and risk scoring.

pub mod orchestrator;
pub mod retry;
pub mod scorer;

pub use orchestrator::{AnalysisRun, Pipeline, SetupError};
pub use retry::{Attempted, retry};
pub use scorer::{RiskScorer, ScoringInput};
