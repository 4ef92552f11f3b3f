//! Shared HTTP plumbing for the live collaborators.

use std::time::Duration;

use lawvisor_ai::JudgeError;
use lawvisor_store::SourceError;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("LawVisor/", env!("CARGO_PKG_VERSION"), " Legal Compliance Analyzer");

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl From<SyncError> for SourceError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Json(_) | SyncError::Unexpected(_) => SourceError::Parse(e.to_string()),
            SyncError::Http(_) | SyncError::Server { .. } => SourceError::Fetch(e.to_string()),
        }
    }
}

impl From<SyncError> for JudgeError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Json(_) | SyncError::Unexpected(_) => JudgeError::Malformed(e.to_string()),
            SyncError::Http(_) | SyncError::Server { .. } => JudgeError::Unavailable(e.to_string()),
        }
    }
}

/// Client with the LawVisor user agent and a whole-request timeout.
pub fn client(timeout: Duration) -> Result<reqwest::Client, SyncError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// Turn a non-success status into [`SyncError::Server`] carrying the body.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Server {
        status: status.as_u16(),
        body,
    })
}
