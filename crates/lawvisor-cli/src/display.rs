//! Human-readable cards for reports, halts and regulations.
//!
//! Everything here writes to stdout; logs go to stderr.

use std::sync::Arc;

use lawvisor_ai::ClassificationSummary;
use lawvisor_core::{Document, PipelineFailure, RegulationArticle, RiskReport};

const MAX_LIST_ITEMS: usize = 10;
const SUMMARY_CHARS: usize = 200;

// ── Public API ──

/// Print a finished report as a vertical card grouped by section.
pub fn print_report(report: &RiskReport, classification: Option<&ClassificationSummary>) {
    println!("=== {} ===", report.document_id);
    println!("{}", report.summary);
    println!();

    println!("Overall");
    row("score", format!("{:.1} / 100", report.overall_score));
    row("level", format!("{} ({})", report.overall_level, report.overall_level.description()));
    row("average confidence", format!("{:.2}", report.average_confidence));
    if report.degraded {
        row("degraded", "yes: some clauses were not scored");
    }
    println!();

    if let Some(summary) = classification {
        print_classification(summary);
    }

    println!("Scoring");
    let b = &report.breakdown;
    row("weighted component", format!("{:.2}", b.weighted_component));
    row("max-risk penalty", format!("{:.2}", b.max_risk_penalty));
    row("density adjustment", format!("{:.2}", b.density_adjustment));
    row("formula", &b.formula);
    println!();

    println!("Risk by level");
    let c = &report.level_counts;
    row("critical / high", format!("{} / {}", c.critical, c.high));
    row("medium / low / minimal", format!("{} / {} / {}", c.medium, c.low, c.minimal));
    println!();

    if !report.categories.is_empty() {
        println!("Categories");
        for cat in &report.categories {
            println!(
                "  {:<26} {:>5.1}  {:<8}  {} clause(s), weight {:.2}",
                cat.clause_type.display_name(),
                cat.score,
                cat.level.to_string(),
                cat.clause_count,
                cat.weight
            );
            for issue in &cat.top_issues {
                println!("      - {issue}");
            }
        }
        println!();
    }

    if !report.high_risk_clauses.is_empty() {
        println!("High-risk clauses ({}):", report.high_risk_clauses.len());
        for h in &report.high_risk_clauses {
            println!("  {:<6} {:>5.1}  {}", h.clause_id, h.risk_score, h.clause_type.display_name());
            println!("      {}", h.preview);
        }
        println!();
    }

    print_assessments(report);

    if !report.citations.is_empty() {
        println!("Citations ({}):", report.citations.len());
        for c in report.citations.iter().take(MAX_LIST_ITEMS) {
            println!("  {:<14} {}", c.article_id.to_string(), c.title);
            println!("      {}  version {}", c.source_url, short_version(&c.version));
            println!("      cited by {}", c.cited_by.join(", "));
        }
        if report.citations.len() > MAX_LIST_ITEMS {
            println!("  ... and {} more", report.citations.len() - MAX_LIST_ITEMS);
        }
        println!();
    }

    if !report.unassessed_clauses.is_empty() {
        println!("Unassessed (no matching regulation text)");
        row("clauses", report.unassessed_clauses.join(", "));
        println!();
    }
    if !report.excluded_clauses.is_empty() {
        println!("Excluded");
        for x in &report.excluded_clauses {
            row(&x.clause_id, &x.reason);
        }
        println!();
    }
}

/// Print a document halt, with the stage history that led to it.
pub fn print_failure(failure: &PipelineFailure, document: &Document) {
    println!("=== {} HALTED ===", failure.document_id);
    println!("{}", failure.message);
    println!();

    println!("Halt");
    row("reason", failure.reason.as_str());
    row("kind", failure.kind.as_str());
    row("failed at", failure.failed_at.as_str());
    row("last completed stage", failure.reached.as_str());
    if let Some(breach) = &failure.breach {
        row(
            "threshold",
            format!("{} = {:.2} (limit {:.2})", breach.metric, breach.observed, breach.threshold),
        );
    }
    println!();

    println!("History");
    for t in document.history() {
        row(t.state.as_str(), t.at.to_rfc3339());
    }
    println!();
}

/// Print one line per article, with its first sentences.
pub fn print_regulations(articles: &[Arc<RegulationArticle>]) {
    for article in articles {
        println!("{:<14} {}", article.id.to_string(), article.title);
        println!("    {}", article.summary(SUMMARY_CHARS));
        println!("    {}  version {}", article.source_url, short_version(&article.version));
        if !article.penalties.is_empty() {
            println!("    penalties: {}", article.penalties.join("; "));
        }
    }
    println!();
    println!("{} article(s)", articles.len());
}

// ── Sections ──

fn print_classification(summary: &ClassificationSummary) {
    println!("Clauses");
    row("total", summary.total.to_string());
    for (clause_type, count) in &summary.by_type {
        row(clause_type.display_name(), count.to_string());
    }
    row("average confidence", format!("{:.2}", summary.average_confidence));
    if summary.low_confidence > 0 {
        row("low confidence", summary.low_confidence.to_string());
    }
    println!();
}

fn print_assessments(report: &RiskReport) {
    let assessed: Vec<_> = report.assessments.iter().filter(|a| a.is_assessed()).collect();
    if assessed.is_empty() {
        return;
    }
    println!("Assessments ({}):", assessed.len());
    for a in assessed {
        let cited: Vec<String> = a.citations.iter().map(|c| c.article_id.to_string()).collect();
        println!(
            "  {:<6} {:>5.1}  {:<8}  {}  [{}]",
            a.clause_id,
            a.risk_score,
            a.risk_level.to_string(),
            a.clause_type.display_name(),
            cited.join(", ")
        );
        if !a.explanation.is_empty() {
            println!("      {}", a.explanation);
        }
        for r in &a.recommendations {
            println!("      -> {r}");
        }
    }
    println!();
}

// ── Helpers ──

fn row(label: &str, value: impl AsRef<str>) {
    println!("  {:<26} {}", label, value.as_ref());
}

fn short_version(version: &str) -> &str {
    version.get(..12).unwrap_or(version)
}
