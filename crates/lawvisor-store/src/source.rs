//! Regulation sources, the allow-list they are checked against, and the clock
//! the staleness policy reads.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use lawvisor_core::{ArticleId, RegulationFamily};

use crate::SourceError;

/// Raw article as returned by a source, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedArticle {
    pub id: ArticleId,
    pub title: String,
    pub text: String,
    pub key_requirements: Vec<String>,
    pub penalties: Vec<String>,
    pub source_url: String,
    pub retrieved_at: DateTime<Utc>,
}

/// Somewhere authoritative regulation text can be fetched from.
#[async_trait]
pub trait RegulationSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// URL the article would be fetched from; checked against the allow-list
    /// before any fetch.
    fn url_for(&self, id: &ArticleId) -> String;

    /// Articles this source publishes, optionally limited to one family.
    fn catalogue(&self, family: Option<RegulationFamily>) -> Vec<ArticleId>;

    async fn fetch(&self, id: &ArticleId) -> Result<FetchedArticle, SourceError>;
}

/// URL prefixes regulation text may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, url: &str) -> bool {
        self.prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }

    pub fn check(&self, url: &str) -> Result<(), SourceError> {
        if self.permits(url) {
            Ok(())
        } else {
            Err(SourceError::NotAllowed(url.to_string()))
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
