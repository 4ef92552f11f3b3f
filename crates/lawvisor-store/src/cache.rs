//! Cache entries and the staleness policy applied to them.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use lawvisor_core::RegulationArticle;
use lawvisor_core::config::RegulationCacheConfig;

/// One cached article together with when and from which text version it was
/// fetched. Replaced whole, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub article: Arc<RegulationArticle>,
    pub fetched_at: DateTime<Utc>,
    pub source_version: String,
    /// Bumped on every successful fetch of this id.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Young enough to serve without re-fetching.
    Fresh,
    /// Due for refresh; may still be served if the refresh fails.
    Stale,
    /// Too old to serve under any circumstances.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub refresh_after: TimeDelta,
    pub stale_limit: TimeDelta,
}

impl StalenessPolicy {
    pub fn new(refresh_after: TimeDelta, stale_limit: TimeDelta) -> Self {
        Self {
            refresh_after,
            stale_limit,
        }
    }

    pub fn from_config(config: &RegulationCacheConfig) -> Self {
        Self::new(
            TimeDelta::seconds(config.refresh_after_secs as i64),
            TimeDelta::seconds(config.stale_limit_secs as i64),
        )
    }

    pub fn classify(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> Freshness {
        let age = now - fetched_at;
        if age < self.refresh_after {
            Freshness::Fresh
        } else if age < self.stale_limit {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::from_config(&RegulationCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_bands() {
        let policy = StalenessPolicy::new(TimeDelta::hours(24), TimeDelta::days(7));
        let t0 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(policy.classify(t0, t0), Freshness::Fresh);
        assert_eq!(
            policy.classify(t0, t0 + TimeDelta::hours(23)),
            Freshness::Fresh
        );
        assert_eq!(
            policy.classify(t0, t0 + TimeDelta::hours(24)),
            Freshness::Stale
        );
        assert_eq!(policy.classify(t0, t0 + TimeDelta::days(6)), Freshness::Stale);
        assert_eq!(
            policy.classify(t0, t0 + TimeDelta::days(7)),
            Freshness::Expired
        );
    }

    #[test]
    fn default_policy_matches_config_defaults() {
        let policy = StalenessPolicy::default();
        assert_eq!(policy.refresh_after, TimeDelta::days(1));
        assert_eq!(policy.stale_limit, TimeDelta::days(7));
    }
}
