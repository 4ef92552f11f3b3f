//! Regulation store: allow-listed sources, normalisation, versioned caching.

mod cache;
mod corpus;
mod error;
mod source;
mod store;

pub use cache::{CacheEntry, Freshness, StalenessPolicy};
pub use corpus::{StaticCorpusSource, official_url};
pub use error::{SourceError, StoreError};
pub use source::{AllowList, Clock, FetchedArticle, ManualClock, RegulationSource, SystemClock};
pub use store::{RegulationStore, content_version};
