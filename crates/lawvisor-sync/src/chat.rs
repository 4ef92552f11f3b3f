//! Judge backed by an OpenAI-compatible chat-completions endpoint.
//!
//! The model sees the clause and only the passages retrieved for it, and must
//! answer with a JSON object. Its citations are validated by the reasoner
//! like any other judge's.

use std::time::Duration;

use async_trait::async_trait;
use lawvisor_ai::{Judge, JudgeError, Judgment};
use lawvisor_core::{Clause, RetrievedPassage};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::http::{self, SyncError};

const SYSTEM_PROMPT: &str = "\
You are a legal compliance analyst. Compare one contract clause against the regulation passages \
supplied with it and judge its regulatory risk.

Rules:
1. Cite only regulation identifiers that appear in the supplied passages, written exactly as given \
(for example GDPR-Art-5). Never cite anything else.
2. Reason step by step and be specific about which requirement is relevant.
3. Recommendations must be concrete and actionable.

Risk scale: critical 80-100 (clear violation of a mandatory requirement), high 60-79 (likely \
violation or significant gap), medium 40-59 (partial compliance), low 20-39 (minor gaps), \
minimal 0-19 (appears compliant).

Answer with a JSON object:
{
  \"risk_score\": 45,
  \"violated_regulations\": [\"GDPR-Art-5\"],
  \"supporting_regulations\": [\"GDPR-Art-32\"],
  \"issues\": [\"...\"],
  \"reasoning_chain\": [\"Step 1: ...\", \"Step 2: ...\"],
  \"explanation\": \"Plain-language explanation for a non-lawyer.\",
  \"recommendations\": [\"...\"]
}
List every passage your judgment relies on in violated_regulations or supporting_regulations.";

const PASSAGE_CHARS: usize = 1000;

pub struct ChatJudge {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Verdict {
    risk_score: f64,
    #[serde(default)]
    violated_regulations: Vec<String>,
    #[serde(default)]
    supporting_regulations: Vec<String>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    reasoning_chain: Vec<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

impl ChatJudge {
    /// `endpoint` is the API base, like `https://api.openai.com/v1`.
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            client: http::client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn request_body(&self, clause: &Clause, passages: &[RetrievedPassage]) -> Value {
        let context = passages
            .iter()
            .map(|p| {
                let text: String = p.passage_text.chars().take(PASSAGE_CHARS).collect();
                format!(
                    "### {}: {}\nVersion: {}\nRelevance: {:.2}\nText: {}",
                    p.article_id, p.title, p.version, p.similarity, text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!(
            "Analyze the following contract clause for regulatory compliance.\n\n\
             ## CLAUSE\nType: {}\nText: {}\n\n## REGULATION PASSAGES\n{}\n\n\
             Provide your analysis as JSON.",
            clause.clause_type, clause.text, context
        );

        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.1,
            "max_tokens": 2000,
        })
    }
}

/// Extract the verdict from a chat-completions response body.
fn parse_response(body: &str) -> Result<Judgment, SyncError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| SyncError::Unexpected("response has no message content".into()))?;
    let verdict: Verdict = serde_json::from_str(&content)?;

    let mut cited = verdict.violated_regulations;
    for id in verdict.supporting_regulations {
        if !cited.contains(&id) {
            cited.push(id);
        }
    }
    Ok(Judgment {
        risk_score: verdict.risk_score,
        cited,
        issues: verdict.issues,
        reasoning: verdict.reasoning_chain,
        explanation: verdict.explanation,
        recommendations: verdict.recommendations,
    })
}

#[async_trait]
impl Judge for ChatJudge {
    fn name(&self) -> &str {
        &self.model
    }

    async fn judge(&self, clause: &Clause, passages: &[RetrievedPassage]) -> Result<Judgment, JudgeError> {
        let url = format!("{}/chat/completions", self.endpoint);
        info!(clause_id = %clause.id, model = %self.model, "requesting chat judgment");

        let mut request = self.client.post(&url).json(&self.request_body(clause, passages));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await.map_err(SyncError::from)?;
        let body = http::check_status(resp)
            .await?
            .text()
            .await
            .map_err(SyncError::from)?;
        let judgment = parse_response(&body)?;
        debug!(clause_id = %clause.id, risk_score = judgment.risk_score, cited = judgment.cited.len(), "chat judgment received");
        Ok(judgment)
    }
}

#[cfg(test)]
mod tests {
    use lawvisor_core::{ArticleId, ClauseType};

    use super::*;

    fn clause() -> Clause {
        Clause {
            id: "C003".into(),
            ordinal: 2,
            clause_type: ClauseType::DataProtection,
            title: None,
            text: "We may share user data with partners.".into(),
            span: 0..38,
            confidence: 0.9,
            low_confidence: false,
        }
    }

    fn passage() -> RetrievedPassage {
        RetrievedPassage {
            clause_id: "C003".into(),
            article_id: ArticleId::gdpr("6"),
            version: "abc123".into(),
            title: "Lawfulness of processing".into(),
            passage_text: "Processing shall be lawful only if ...".into(),
            similarity: 0.42,
            rank: 1,
        }
    }

    fn wrap(content: &str) -> String {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
    }

    #[test]
    fn request_carries_only_supplied_passages() {
        let judge = ChatJudge::new("http://localhost:8080/v1/", "test-model", Duration::from_secs(5)).unwrap();
        assert_eq!(judge.endpoint, "http://localhost:8080/v1");
        let body = judge.request_body(&clause(), &[passage()]);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("### GDPR-Art-6: Lawfulness of processing"));
        assert!(user.contains("Type: data-protection"));
        assert!(!user.contains("GDPR-Art-5"));
    }

    #[test]
    fn parses_verdict_and_merges_citations() {
        let content = r#"{
            "risk_score": 72,
            "violated_regulations": ["GDPR-Art-6"],
            "supporting_regulations": ["GDPR-Art-6", "GDPR-Art-5"],
            "issues": ["No lawful basis"],
            "reasoning_chain": ["Step 1: sharing", "Step 2: no basis"],
            "explanation": "Sharing needs a lawful basis.",
            "recommendations": ["State the lawful basis."]
        }"#;
        let j = parse_response(&wrap(content)).unwrap();
        assert_eq!(j.risk_score, 72.0);
        assert_eq!(j.cited, ["GDPR-Art-6", "GDPR-Art-5"]);
        assert_eq!(j.reasoning.len(), 2);
    }

    #[test]
    fn optional_fields_default() {
        let j = parse_response(&wrap(r#"{"risk_score": 5}"#)).unwrap();
        assert!(j.cited.is_empty());
        assert!(j.explanation.is_empty());
    }

    #[test]
    fn malformed_content_maps_to_malformed() {
        let err = parse_response(&wrap("not json")).unwrap_err();
        assert!(matches!(JudgeError::from(err), JudgeError::Malformed(_)));

        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, SyncError::Unexpected(_)));
    }
}
