//! Per-document analysis state machine.
//!
//! `pending → extracting → classifying → retrieving → reasoning → scoring →
//! completed`. Each guard reads its threshold from [`AnalysisConfig`] and
//! halts the document with a single [`ReasonCode`]. Nothing is published
//! until every stage has succeeded, so re-running a failed document is safe.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use lawvisor_ai::{
    CentroidClassifier, ClassificationSummary, ClassifyError, ClauseClassifier,
    ComplianceReasoner, Embed, Judge, ReasonError, RetrievalError, RetrievalIndex, VectorIndex,
};
use lawvisor_core::{
    AnalysisConfig, ArticleId, Clause, ClauseRiskAssessment, ConfigError, Document,
    DocumentState, ExcludedClause, ExtractedText, FailureKind, PipelineFailure, ReasonCode,
    RegulationArticle, RetrievedPassage, RiskReport, implicated_articles,
};
use lawvisor_store::{RegulationSource, RegulationStore, StoreError};
use tracing::{error, info, warn};

use crate::retry::{Attempted, retry};
use crate::scorer::{RiskScorer, ScoringInput};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("building retrieval index: {0}")]
    Index(#[from] RetrievalError),
    #[error("building classifier: {0}")]
    Classifier(#[from] ClassifyError),
}

/// Everything one analysis run produced, including partial progress on halt.
#[derive(Debug)]
pub struct AnalysisRun {
    pub document: Document,
    pub clauses: Vec<Clause>,
    pub classification: Option<ClassificationSummary>,
    pub outcome: Result<RiskReport, PipelineFailure>,
}

/// Why a stage stopped before producing its output.
enum StageHalt {
    Unavailable(StoreError),
    Exhausted {
        operation: &'static str,
        attempts: u32,
        error: String,
    },
}

impl<E: std::fmt::Display> From<(&'static str, Attempted<E>)> for StageHalt {
    fn from((operation, attempted): (&'static str, Attempted<E>)) -> Self {
        Self::Exhausted {
            operation,
            attempts: attempted.attempts,
            error: attempted.error.to_string(),
        }
    }
}

enum ClauseOutcome {
    Assessed(ClauseRiskAssessment),
    Excluded(ExcludedClause),
}

pub struct Pipeline {
    config: AnalysisConfig,
    store: Arc<RegulationStore>,
    classifier: Arc<dyn ClauseClassifier>,
    index: Arc<dyn RetrievalIndex>,
    reasoner: ComplianceReasoner,
    scorer: RiskScorer,
}

impl Pipeline {
    pub fn new(
        config: AnalysisConfig,
        store: Arc<RegulationStore>,
        classifier: Arc<dyn ClauseClassifier>,
        index: Arc<dyn RetrievalIndex>,
        judge: Arc<dyn Judge>,
    ) -> Self {
        let scorer = RiskScorer::from_config(&config);
        Self {
            config,
            store,
            classifier,
            index,
            reasoner: ComplianceReasoner::new(judge),
            scorer,
        }
    }

    /// Wire the default collaborators: a store over `source`, a vector index
    /// over every article the source publishes, and a centroid classifier.
    ///
    /// Articles that cannot be loaded are left out of the index; the
    /// regulation guard still halts any document that implicates them.
    pub async fn standard(
        config: AnalysisConfig,
        source: Arc<dyn RegulationSource>,
        embedder: Arc<dyn Embed>,
        judge: Arc<dyn Judge>,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let store = Arc::new(RegulationStore::from_config(source, &config.regulations));

        let mut articles = Vec::new();
        for id in store.catalogue(None) {
            match store.get(&id).await {
                Ok(article) => articles.push(article),
                Err(e) => warn!(article = %id, error = %e, "leaving article out of the index"),
            }
        }
        info!(articles = articles.len(), source = store.source_name(), "regulations loaded");

        let index = VectorIndex::build(Arc::clone(&embedder), &articles)?;
        let classifier = CentroidClassifier::build(embedder, config.classification.min_confidence)?;
        Ok(Self::new(config, store, Arc::new(classifier), Arc::new(index), judge))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RegulationStore> {
        &self.store
    }

    pub fn judge_name(&self) -> &str {
        self.reasoner.judge_name()
    }

    /// Analyze one document, returning the report or the halt.
    pub async fn analyze(&self, input: ExtractedText) -> Result<RiskReport, PipelineFailure> {
        self.run(input).await.outcome
    }

    /// Analyze one document and keep the document history and clauses.
    pub async fn run(&self, input: ExtractedText) -> AnalysisRun {
        let mut document = Document::new(input);
        let mut clauses = Vec::new();
        let outcome = self.execute(&mut document, &mut clauses).await;
        let classification = (!clauses.is_empty()).then(|| ClassificationSummary::from_clauses(&clauses));
        AnalysisRun {
            document,
            clauses,
            classification,
            outcome,
        }
    }

    async fn execute(
        &self,
        doc: &mut Document,
        clauses_out: &mut Vec<Clause>,
    ) -> Result<RiskReport, PipelineFailure> {
        let cfg = &self.config;

        // ── Extracting ──
        enter(doc);
        let ocr = doc.overall_confidence();
        let ocr_in_range = ocr.is_finite() && (0.0..=1.0).contains(&ocr);
        if !ocr_in_range || ocr < cfg.ocr_confidence_threshold {
            let message = if ocr_in_range {
                format!(
                    "text-extraction confidence {ocr:.2} is below the required {:.2}",
                    cfg.ocr_confidence_threshold
                )
            } else {
                format!("text-extraction confidence {ocr} is outside [0, 1]")
            };
            return Err(halt(doc, ReasonCode::OcrConfidenceBelowThreshold, message).with_breach(
                "ocr_confidence",
                ocr,
                cfg.ocr_confidence_threshold,
            ));
        }
        if doc.text().trim().is_empty() {
            return Err(halt(doc, ReasonCode::EmptyDocument, "document contains no extractable text"));
        }

        // ── Classifying ──
        enter(doc);
        let text = doc.text().to_string();
        let clauses = match tokio::time::timeout(cfg.timeouts.classifying(), self.classify(&text)).await {
            Err(_) => return Err(timed_out(doc, cfg.timeouts.classifying())),
            Ok(Err(h)) => return Err(halt_stage(doc, h)),
            Ok(Ok(clauses)) => clauses,
        };
        if clauses.is_empty() {
            return Err(halt(doc, ReasonCode::NoClausesFound, "no clauses could be segmented from the text"));
        }
        *clauses_out = clauses.clone();

        let mut excluded = Vec::new();
        let mut included = Vec::with_capacity(clauses.len());
        for clause in clauses {
            if cfg.classification.exclude_low_confidence && clause.low_confidence {
                excluded.push(ExcludedClause {
                    reason: format!(
                        "classification confidence {:.2} is below {:.2}",
                        clause.confidence, cfg.classification.min_confidence
                    ),
                    clause_id: clause.id,
                });
            } else {
                included.push(clause);
            }
        }
        if included.is_empty() {
            return Err(halt(
                doc,
                ReasonCode::NoClausesFound,
                "every clause was excluded for low classification confidence",
            )
            .with_breach("classification_confidence", 0.0, cfg.classification.min_confidence));
        }

        // ── Retrieving ──
        enter(doc);
        let passages = match tokio::time::timeout(cfg.timeouts.retrieving(), self.retrieve(&included)).await {
            Err(_) => return Err(timed_out(doc, cfg.timeouts.retrieving())),
            Ok(Err(h)) => return Err(halt_stage(doc, h)),
            Ok(Ok(p)) => p,
        };
        let unassessable = passages.iter().filter(|p| p.is_empty()).count();
        let ratio = unassessable as f64 / included.len() as f64;
        if ratio > cfg.retrieval.max_unassessable_ratio {
            return Err(halt(
                doc,
                ReasonCode::RetrievalCoverageBelowThreshold,
                format!(
                    "{unassessable} of {} clauses have no regulation passage with similarity of at least {:.2}",
                    included.len(),
                    cfg.retrieval.min_similarity
                ),
            )
            .with_breach("unassessable_clause_ratio", ratio, cfg.retrieval.max_unassessable_ratio));
        }

        // ── Reasoning ──
        enter(doc);
        let outcomes = match tokio::time::timeout(cfg.timeouts.reasoning(), self.reason(&included, &passages)).await {
            Err(_) => return Err(timed_out(doc, cfg.timeouts.reasoning())),
            Ok(Err(h)) => return Err(halt_stage(doc, h)),
            Ok(Ok(o)) => o,
        };
        let mut assessments = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                ClauseOutcome::Assessed(a) => assessments.push(a),
                ClauseOutcome::Excluded(x) => excluded.push(x),
            }
        }

        // ── Scoring ──
        enter(doc);
        let articles = self.cited_articles(&assessments).await;
        let report = self.scorer.score(&ScoringInput {
            document_id: doc.id(),
            clauses: clauses_out.as_slice(),
            assessments: &assessments,
            excluded: &excluded,
            articles: &articles,
        });

        enter(doc);
        info!(
            document_id = %doc.id(),
            overall = report.overall_score,
            level = %report.overall_level,
            degraded = report.degraded,
            "analysis completed"
        );
        Ok(report)
    }

    async fn classify(&self, text: &str) -> Result<Vec<Clause>, StageHalt> {
        let classifier = &self.classifier;
        retry(
            &self.config.retry,
            "classification",
            |e: &ClassifyError| e.kind().is_recoverable(),
            move || classifier.classify(text),
        )
        .await
        .map_err(|a| StageHalt::from(("classification", a)))
    }

    /// Check every implicated regulation is available, then retrieve
    /// passages per clause concurrently. Output is in clause order.
    async fn retrieve(&self, clauses: &[Clause]) -> Result<Vec<Vec<RetrievedPassage>>, StageHalt> {
        let implicated: BTreeSet<ArticleId> = clauses
            .iter()
            .flat_map(|c| implicated_articles(c.clause_type))
            .collect();
        let implicated: Vec<ArticleId> = implicated.into_iter().collect();
        self.store.get_all(&implicated).await.map_err(StageHalt::Unavailable)?;

        let retrieval = &self.config.retrieval;
        let results: Vec<Result<Vec<RetrievedPassage>, StageHalt>> = stream::iter(clauses)
            .map(|clause| async move {
                let index = &self.index;
                retry(
                    &self.config.retry,
                    "retrieval",
                    |e: &RetrievalError| e.kind().is_recoverable(),
                    move || index.retrieve(&clause.id, &clause.text, retrieval.top_k, retrieval.min_similarity),
                )
                .await
                .map_err(|a| StageHalt::from(("retrieval", a)))
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        results.into_iter().collect()
    }

    async fn reason(
        &self,
        clauses: &[Clause],
        passages: &[Vec<RetrievedPassage>],
    ) -> Result<Vec<ClauseOutcome>, StageHalt> {
        let results: Vec<Result<ClauseOutcome, StageHalt>> = stream::iter(clauses.iter().zip(passages))
            .map(|(clause, passages)| self.assess_clause(clause, passages))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;
        results.into_iter().collect()
    }

    /// Assess one clause, retrying recoverable failures with backoff and
    /// re-assessing after an evidence violation up to the configured limit.
    async fn assess_clause(&self, clause: &Clause, passages: &[RetrievedPassage]) -> Result<ClauseOutcome, StageHalt> {
        let reasoner = &self.reasoner;
        let mut violations = 0;
        loop {
            let attempt = retry(
                &self.config.retry,
                "reasoning",
                |e: &ReasonError| e.kind().is_recoverable(),
                move || reasoner.assess(clause, passages),
            )
            .await;
            match attempt {
                Ok(assessment) => return Ok(ClauseOutcome::Assessed(assessment)),
                Err(a) if a.error.kind() == FailureKind::EvidenceViolation => {
                    violations += 1;
                    if violations > self.config.evidence_retry_limit {
                        warn!(clause_id = %clause.id, error = %a.error, "excluding clause after repeated evidence violations");
                        return Ok(ClauseOutcome::Excluded(ExcludedClause {
                            clause_id: clause.id.clone(),
                            reason: a.error.to_string(),
                        }));
                    }
                    warn!(clause_id = %clause.id, error = %a.error, attempt = violations, "re-assessing after evidence violation");
                }
                Err(a) => return Err(StageHalt::from(("reasoning", a))),
            }
        }
    }

    /// Article versions cited by the assessments, as archived by the store.
    async fn cited_articles(&self, assessments: &[ClauseRiskAssessment]) -> Vec<Arc<RegulationArticle>> {
        let cited: BTreeSet<(ArticleId, String)> = assessments
            .iter()
            .flat_map(|a| a.citations.iter())
            .map(|c| (c.article_id.clone(), c.version.clone()))
            .collect();
        let mut articles = Vec::with_capacity(cited.len());
        for (id, version) in cited {
            match self.store.get_version(&id, &version).await {
                Ok(article) => articles.push(article),
                Err(e) => warn!(article = %id, error = %e, "cited version not archived"),
            }
        }
        articles
    }
}

fn enter(doc: &mut Document) {
    match doc.advance() {
        Ok(state) => info!(document_id = %doc.id(), state = %state, "entered stage"),
        Err(e) => error!(document_id = %doc.id(), error = %e, "invalid stage transition"),
    }
}

/// Move the document to `failed` and describe why.
fn halt(doc: &mut Document, reason: ReasonCode, message: impl Into<String>) -> PipelineFailure {
    let failed_at = doc.state();
    let reached = doc
        .history()
        .iter()
        .rev()
        .nth(1)
        .map_or(DocumentState::Pending, |t| t.state);
    if let Err(e) = doc.fail() {
        error!(document_id = %doc.id(), error = %e, "invalid stage transition");
    }
    let failure = PipelineFailure::new(doc.id(), failed_at, reached, reason, message);
    warn!(
        document_id = %failure.document_id,
        state = %failed_at,
        reason = %reason,
        message = %failure.message,
        "document halted"
    );
    failure
}

fn halt_stage(doc: &mut Document, h: StageHalt) -> PipelineFailure {
    match h {
        StageHalt::Unavailable(e) => halt(
            doc,
            ReasonCode::RegulationUnavailable,
            format!("regulation {} has no verifiable text: {e}", e.article_id()),
        ),
        StageHalt::Exhausted {
            operation,
            attempts,
            error,
        } => halt(
            doc,
            ReasonCode::RetriesExhausted,
            format!("{operation} failed after {attempts} attempt(s): {error}"),
        ),
    }
}

fn timed_out(doc: &mut Document, limit: Duration) -> PipelineFailure {
    let stage = doc.state();
    let secs = limit.as_secs_f64();
    halt(
        doc,
        ReasonCode::StageTimeout,
        format!("{stage} did not finish within {secs}s"),
    )
    .with_breach("stage_seconds", secs, secs)
}
