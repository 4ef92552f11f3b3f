use lawvisor_core::{ArticleId, FailureKind};
use thiserror::Error;

/// Failure of a single fetch from a regulation source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("{0} is not published by this source")]
    NotFound(ArticleId),

    #[error("source url {0} is not on the allow-list")]
    NotAllowed(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("could not parse source document: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No verifiable text and no cached copy within the staleness limit.
    #[error("regulation {id} unavailable: {source}")]
    RegulationUnavailable {
        id: ArticleId,
        #[source]
        source: SourceError,
    },

    #[error("no archived text for {id} at version {version}")]
    VersionNotFound { id: ArticleId, version: String },
}

impl StoreError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::RegulationUnavailable
    }

    pub fn article_id(&self) -> &ArticleId {
        match self {
            Self::RegulationUnavailable { id, .. } | Self::VersionNotFound { id, .. } => id,
        }
    }
}
