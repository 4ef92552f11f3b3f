//! Clause judgments against retrieved regulation passages.
//!
//! A [`Judge`] produces the raw verdict for one clause. It may cite anything
//! it likes; [`ComplianceReasoner`](crate::ComplianceReasoner) rejects
//! citations that were not among the supplied passages.

use std::sync::LazyLock;

use async_trait::async_trait;
use lawvisor_core::{Clause, ClauseType, RetrievedPassage};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error)]
pub enum JudgeError {
    /// Transport or backend failure. Retrying may help.
    #[error("judge unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the answer could not be interpreted.
    #[error("judge returned a malformed verdict: {0}")]
    Malformed(String),
}

/// Raw verdict for one clause, before grounding validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub risk_score: f64,
    /// Article references as the judge wrote them (`GDPR-Art-5`,
    /// `GDPR Article 5(1)(c)`, `SEC Rule 10b-5`).
    pub cited: Vec<String>,
    pub issues: Vec<String>,
    pub reasoning: Vec<String>,
    pub explanation: String,
    pub recommendations: Vec<String>,
}

#[async_trait]
pub trait Judge: Send + Sync {
    fn name(&self) -> &str;

    /// `passages` is never empty; the reasoner short-circuits that case.
    async fn judge(&self, clause: &Clause, passages: &[RetrievedPassage]) -> Result<Judgment, JudgeError>;
}

// ── Rule judge ──

#[derive(Clone, Copy)]
enum Trigger {
    /// The pattern occurs in the clause.
    Present,
    /// The pattern does not occur in the clause.
    Absent,
}

struct Rule {
    applies_to: ClauseType,
    trigger: Trigger,
    pattern: &'static str,
    /// Positive for risk indicators, negative for mitigators.
    delta: f64,
    finding: &'static str,
    recommendation: Option<&'static str>,
    /// Articles the finding relates to, in preference order.
    articles: &'static [&'static str],
}

const BASE_SCORE: f64 = 10.0;

static RULES: &[Rule] = &[
    // Data protection
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:sell|sold|share|shared|disclose)\b[^.]{0,80}\b(?:data|information)\b|\b(?:data|information)\b[^.]{0,80}\b(?:sell|sold|shared|disclosed)\b",
        delta: 35.0,
        finding: "Personal data may be sold or shared with third parties without a stated lawful basis.",
        recommendation: Some("Limit disclosure of personal data to named processors and state the lawful basis for each purpose."),
        articles: &["GDPR-Art-6", "GDPR-Art-5"],
    },
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:indefinitely|perpetual(?:ly)?|forever|unlimited period)\b",
        delta: 25.0,
        finding: "Retention of personal data is not limited in time.",
        recommendation: Some("Set a retention period tied to the processing purpose, then delete or anonymise the data."),
        articles: &["GDPR-Art-5"],
    },
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:marketing|advertising|analytics|profiling)\b",
        delta: 15.0,
        finding: "Data is used for secondary purposes such as marketing or profiling.",
        recommendation: Some("Obtain separate, withdrawable consent for marketing and profiling."),
        articles: &["GDPR-Art-6", "GDPR-Art-7", "GDPR-Art-5"],
    },
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Absent,
        pattern: r"(?i)\bbreach",
        delta: 10.0,
        finding: "No personal data breach notification duty is stated.",
        recommendation: Some("Require notification of personal data breaches without undue delay and within 72 hours."),
        articles: &["GDPR-Art-33"],
    },
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Absent,
        pattern: r"(?i)\b(?:secur\w*|encrypt\w*|pseudonymi[sz]\w*)",
        delta: 10.0,
        finding: "No technical or organisational security measures are specified.",
        recommendation: Some("Specify security measures such as encryption, access control and regular testing."),
        articles: &["GDPR-Art-32"],
    },
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:documented instructions|lawful basis|data processing agreement)\b",
        delta: -10.0,
        finding: "Processing is bound to documented instructions or a stated lawful basis.",
        recommendation: None,
        articles: &["GDPR-Art-28", "GDPR-Art-6"],
    },
    Rule {
        applies_to: ClauseType::DataProtection,
        trigger: Trigger::Present,
        pattern: r"(?i)\bwithout undue delay\b|\b72 hours\b",
        delta: -5.0,
        finding: "Breach notification is time-bound.",
        recommendation: None,
        articles: &["GDPR-Art-33"],
    },
    // Liability
    Rule {
        applies_to: ClauseType::Liability,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:unlimited|uncapped)\s+liability\b|\bliability\b[^.]{0,40}\bshall not be limited\b",
        delta: 35.0,
        finding: "Liability is unlimited.",
        recommendation: Some("Cap aggregate liability, for example at the fees paid in the preceding twelve months."),
        articles: &["SEC-10b-5"],
    },
    Rule {
        applies_to: ClauseType::Liability,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:indemnify|indemnification|hold harmless)\b",
        delta: 20.0,
        finding: "The clause imposes an indemnity that may be one-sided.",
        recommendation: Some("Make the indemnity mutual and subject it to the liability cap."),
        articles: &["SEC-10b-5"],
    },
    Rule {
        applies_to: ClauseType::Liability,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:disclaims?|excludes?)\b[^.]{0,40}\b(?:all|any)\s+(?:warrant\w*|liabilit\w*)",
        delta: 20.0,
        finding: "Warranties or liability are disclaimed wholesale.",
        recommendation: Some("Keep warranties that the services will perform as described and exclude only specific heads of loss."),
        articles: &["SEC-10b-5"],
    },
    Rule {
        applies_to: ClauseType::Liability,
        trigger: Trigger::Present,
        pattern: r"(?i)\bnothing\b[^.]{0,60}\blimits?\b[^.]{0,40}\bfraud",
        delta: -10.0,
        finding: "Liability for fraud is preserved.",
        recommendation: None,
        articles: &["SEC-10b-5"],
    },
    Rule {
        applies_to: ClauseType::Liability,
        trigger: Trigger::Present,
        pattern: r"(?i)\bshall not exceed\b|\baggregate liability\b",
        delta: -5.0,
        finding: "Aggregate liability is capped.",
        recommendation: None,
        articles: &["SEC-10b-5"],
    },
    // Termination
    Rule {
        applies_to: ClauseType::Termination,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:immediately|without (?:prior )?notice|at any time|for any reason|sole discretion)\b",
        delta: 30.0,
        finding: "One party may terminate at will or without notice.",
        recommendation: Some("Require written notice and a cure period before termination for breach."),
        articles: &["GDPR-Art-17"],
    },
    Rule {
        applies_to: ClauseType::Termination,
        trigger: Trigger::Absent,
        pattern: r"(?i)\b(?:return|delete|deletion|destroy|erase|erasure)\b",
        delta: 15.0,
        finding: "No return or deletion of data on termination is required.",
        recommendation: Some("Require return or deletion of customer data on termination, with written certification."),
        articles: &["GDPR-Art-17"],
    },
    Rule {
        applies_to: ClauseType::Termination,
        trigger: Trigger::Present,
        pattern: r"(?i)\bautomatic(?:ally)?\s+renew",
        delta: 10.0,
        finding: "The agreement renews automatically.",
        recommendation: Some("Add a reminder obligation or an easy opt-out before each renewal."),
        articles: &[],
    },
    Rule {
        applies_to: ClauseType::Termination,
        trigger: Trigger::Present,
        pattern: r"(?i)\bdays'?\s+(?:prior\s+)?written notice\b",
        delta: -5.0,
        finding: "Termination requires advance written notice.",
        recommendation: None,
        articles: &[],
    },
    // Intellectual property
    Rule {
        applies_to: ClauseType::IntellectualProperty,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:perpetual|irrevocable)\b",
        delta: 25.0,
        finding: "A perpetual or irrevocable licence is granted.",
        recommendation: Some("Limit the licence to the term of the agreement and to the stated purpose."),
        articles: &["GDPR-Art-5"],
    },
    Rule {
        applies_to: ClauseType::IntellectualProperty,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:customer|user)\s+(?:data|content)\b",
        delta: 15.0,
        finding: "The licence extends to customer data or content.",
        recommendation: Some("Exclude personal data from the licence or restrict use to providing the services."),
        articles: &["GDPR-Art-5", "GDPR-Art-6"],
    },
    Rule {
        applies_to: ClauseType::IntellectualProperty,
        trigger: Trigger::Present,
        pattern: r"(?i)\bassigns?\b[^.]{0,60}\ball\s+rights?\b",
        delta: 15.0,
        finding: "All rights are assigned, possibly including pre-existing work.",
        recommendation: Some("Carve out background intellectual property from the assignment."),
        articles: &[],
    },
    Rule {
        applies_to: ClauseType::IntellectualProperty,
        trigger: Trigger::Present,
        pattern: r"(?i)\bretains?\s+(?:all\s+)?ownership\b",
        delta: -5.0,
        finding: "Each party keeps its pre-existing intellectual property.",
        recommendation: None,
        articles: &[],
    },
    // Jurisdiction
    Rule {
        applies_to: ClauseType::Jurisdiction,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:outside|third countr\w*|any country|servers located)\b",
        delta: 30.0,
        finding: "Personal data may be transferred outside the European Economic Area.",
        recommendation: Some("Name the destination countries and the safeguard, such as standard contractual clauses, for each transfer."),
        articles: &["GDPR-Art-44", "GDPR-Art-46"],
    },
    Rule {
        applies_to: ClauseType::Jurisdiction,
        trigger: Trigger::Present,
        pattern: r"(?i)\b(?:standard contractual clauses|adequacy decision|binding corporate rules)\b",
        delta: -20.0,
        finding: "Transfers rely on a recognised safeguard.",
        recommendation: None,
        articles: &["GDPR-Art-46"],
    },
    Rule {
        applies_to: ClauseType::Jurisdiction,
        trigger: Trigger::Present,
        pattern: r"(?i)\barbitration\b",
        delta: 5.0,
        finding: "Disputes go to mandatory arbitration.",
        recommendation: Some("Confirm the arbitral seat and rules are acceptable and costs are shared."),
        articles: &[],
    },
];

static COMPILED: LazyLock<Vec<(Regex, &'static Rule)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|rule| (Regex::new(rule.pattern).unwrap(), rule))
        .collect()
});

/// Deterministic judge built from pattern indicators and mitigators per
/// clause type. Cites only passages it was handed.
#[derive(Debug, Clone, Default)]
pub struct RuleJudge;

impl RuleJudge {
    pub fn new() -> Self {
        Self
    }

    fn evaluate(&self, clause: &Clause, passages: &[RetrievedPassage]) -> Judgment {
        let mut score = BASE_SCORE;
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();
        let mut preferred: Vec<&str> = Vec::new();
        let mut reasoning = vec![
            format!(
                "Step 1: Clause classified as {} with confidence {:.2}.",
                clause.clause_type.display_name(),
                clause.confidence
            ),
            format!(
                "Step 2: Compared against {} retrieved passage(s): {}.",
                passages.len(),
                passages
                    .iter()
                    .map(|p| p.article_id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ];

        for (regex, rule) in COMPILED.iter() {
            if rule.applies_to != clause.clause_type {
                continue;
            }
            let fired = match rule.trigger {
                Trigger::Present => regex.is_match(&clause.text),
                Trigger::Absent => !regex.is_match(&clause.text),
            };
            if !fired {
                continue;
            }
            score += rule.delta;
            let step = reasoning.len() + 1;
            if rule.delta > 0.0 {
                issues.push(rule.finding.to_string());
                preferred.extend(rule.articles.iter().copied());
                reasoning.push(format!("Step {step}: Risk indicator (+{}): {}", rule.delta, rule.finding));
            } else {
                reasoning.push(format!("Step {step}: Mitigating factor ({}): {}", rule.delta, rule.finding));
            }
            if let Some(rec) = rule.recommendation {
                recommendations.push(rec.to_string());
            }
        }

        let score = score.clamp(0.0, 100.0);
        let cited = select_citations(&preferred, passages);
        reasoning.push(format!(
            "Step {}: Risk score {score:.0} grounded in {}.",
            reasoning.len() + 1,
            cited.join(", ")
        ));

        let explanation = if issues.is_empty() {
            format!(
                "No risk indicators were found in this {} clause when compared against {}.",
                clause.clause_type.display_name(),
                cited.join(", ")
            )
        } else {
            format!(
                "This {} clause raises {} concern(s): {} Relevant regulation: {}.",
                clause.clause_type.display_name(),
                issues.len(),
                issues.join(" "),
                cited.join(", ")
            )
        };
        if recommendations.is_empty() {
            recommendations.push("No changes required; confirm the clause during routine review.".to_string());
        }

        Judgment {
            risk_score: score,
            cited,
            issues,
            reasoning,
            explanation,
            recommendations,
        }
    }
}

/// Preferred articles that were retrieved, in passage rank order; otherwise
/// the top-ranked passage.
fn select_citations(preferred: &[&str], passages: &[RetrievedPassage]) -> Vec<String> {
    let mut cited: Vec<String> = passages
        .iter()
        .map(|p| p.article_id.to_string())
        .filter(|id| preferred.contains(&id.as_str()))
        .collect();
    cited.dedup();
    if cited.is_empty()
        && let Some(top) = passages.iter().min_by_key(|p| p.rank)
    {
        cited.push(top.article_id.to_string());
    }
    cited
}

#[async_trait]
impl Judge for RuleJudge {
    fn name(&self) -> &str {
        "rules"
    }

    async fn judge(&self, clause: &Clause, passages: &[RetrievedPassage]) -> Result<Judgment, JudgeError> {
        Ok(self.evaluate(clause, passages))
    }
}
