//! The regulation store: allow-listed fetching, normalisation, versioned
//! caching, and the staleness fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::try_join_all;
use lawvisor_core::config::RegulationCacheConfig;
use lawvisor_core::{ArticleId, RegulationArticle, RegulationFamily, normalize_text};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, Freshness, StalenessPolicy};
use crate::source::{AllowList, Clock, RegulationSource, SystemClock};
use crate::{SourceError, StoreError};

/// Content digest used as an article's version.
pub fn content_version(normalized_text: &str) -> String {
    format!("{:x}", Sha256::digest(normalized_text.as_bytes()))
}

/// Read-mostly cache of regulation articles shared by every analysis.
///
/// Cache entries are swapped whole under a write lock, so readers never see a
/// partially updated article. Concurrent fetches of the same id collapse onto
/// one in-flight request. Every version ever served stays in an archive so
/// older assessments can be reproduced.
pub struct RegulationStore {
    source: Arc<dyn RegulationSource>,
    allow: AllowList,
    policy: StalenessPolicy,
    clock: Arc<dyn Clock>,
    cache: RwLock<HashMap<ArticleId, Arc<CacheEntry>>>,
    archive: RwLock<HashMap<(ArticleId, String), Arc<RegulationArticle>>>,
    gates: Mutex<HashMap<ArticleId, Arc<FetchGate>>>,
}

/// Serialises fetches of one id and remembers how the last one ended, so
/// callers that queued behind it share its outcome instead of repeating it.
#[derive(Default)]
struct FetchGate {
    /// Fetches finished through this gate; read before queuing.
    completed: AtomicU64,
    last_failure: Mutex<Option<SourceError>>,
}

impl RegulationStore {
    pub fn new(source: Arc<dyn RegulationSource>, allow: AllowList, policy: StalenessPolicy) -> Self {
        Self {
            source,
            allow,
            policy,
            clock: Arc::new(SystemClock),
            cache: RwLock::new(HashMap::new()),
            archive: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(source: Arc<dyn RegulationSource>, config: &RegulationCacheConfig) -> Self {
        Self::new(
            source,
            AllowList::new(config.allowed_sources.iter().cloned()),
            StalenessPolicy::from_config(config),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Serve an article, fetching it when missing or due for refresh.
    pub async fn get(&self, id: &ArticleId) -> Result<Arc<RegulationArticle>, StoreError> {
        let now = self.clock.now();
        let seen = match self.cached(id).await {
            Some(entry) if self.policy.classify(entry.fetched_at, now) == Freshness::Fresh => {
                debug!(article = %id, "regulation cache hit");
                return Ok(entry.article.clone());
            }
            Some(entry) => Some(entry.generation),
            None => None,
        };
        self.fetch_collapsed(id, seen).await
    }

    /// Re-fetch an article regardless of its age.
    ///
    /// On failure the cached copy is served while it is within the staleness
    /// limit; assessments that cited an older version keep resolving through
    /// [`RegulationStore::get_version`].
    pub async fn refresh(&self, id: &ArticleId) -> Result<Arc<RegulationArticle>, StoreError> {
        let seen = self.cached(id).await.map(|e| e.generation);
        self.fetch_collapsed(id, seen).await
    }

    /// Fetch several articles concurrently; fails on the first unavailable one.
    pub async fn get_all(&self, ids: &[ArticleId]) -> Result<Vec<Arc<RegulationArticle>>, StoreError> {
        try_join_all(ids.iter().map(|id| self.get(id))).await
    }

    /// Every article the source publishes for `family` (or all families).
    pub async fn load_family(
        &self,
        family: Option<RegulationFamily>,
    ) -> Result<Vec<Arc<RegulationArticle>>, StoreError> {
        let mut ids = self.source.catalogue(family);
        ids.sort();
        self.get_all(&ids).await
    }

    pub fn catalogue(&self, family: Option<RegulationFamily>) -> Vec<ArticleId> {
        let mut ids = self.source.catalogue(family);
        ids.sort();
        ids
    }

    pub async fn cached(&self, id: &ArticleId) -> Option<Arc<CacheEntry>> {
        self.cache.read().await.get(id).cloned()
    }

    /// The exact text of `id` at `version`, if this store ever served it.
    pub async fn get_version(
        &self,
        id: &ArticleId,
        version: &str,
    ) -> Result<Arc<RegulationArticle>, StoreError> {
        self.archive
            .read()
            .await
            .get(&(id.clone(), version.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound {
                id: id.clone(),
                version: version.to_string(),
            })
    }

    async fn gate(&self, id: &ArticleId) -> Arc<FetchGate> {
        self.gates
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    /// `seen` is the cache generation the caller observed before queuing; a
    /// different generation after the gate opens means another caller already
    /// fetched on its behalf. A fetch that finished while this caller waited
    /// is shared whether it succeeded or failed.
    async fn fetch_collapsed(
        &self,
        id: &ArticleId,
        seen: Option<u64>,
    ) -> Result<Arc<RegulationArticle>, StoreError> {
        let gate = self.gate(id).await;
        let ticket = gate.completed.load(Ordering::Acquire);
        let mut last_failure = gate.last_failure.lock().await;

        let current = self.cached(id).await;
        if gate.completed.load(Ordering::Acquire) != ticket
            && let Some(err) = last_failure.as_ref()
        {
            debug!(article = %id, "joined failed regulation fetch");
            return self.fallback(id, current, err.clone());
        }
        if let Some(entry) = &current
            && Some(entry.generation) != seen
        {
            debug!(article = %id, "joined in-flight regulation fetch");
            return Ok(entry.article.clone());
        }

        let outcome = self.fetch_and_install(id, current.as_deref()).await;
        *last_failure = outcome.as_ref().err().cloned();
        gate.completed.fetch_add(1, Ordering::Release);

        match outcome {
            Ok(article) => Ok(article),
            Err(err) => self.fallback(id, current, err),
        }
    }

    async fn fetch_and_install(
        &self,
        id: &ArticleId,
        previous: Option<&CacheEntry>,
    ) -> Result<Arc<RegulationArticle>, SourceError> {
        self.allow.check(&self.source.url_for(id))?;
        let fetched = self.source.fetch(id).await?;
        self.allow.check(&fetched.source_url)?;
        if &fetched.id != id {
            return Err(SourceError::Parse(format!(
                "source returned {} when asked for {id}",
                fetched.id
            )));
        }

        let text = normalize_text(&fetched.text);
        if text.is_empty() {
            return Err(SourceError::Parse(format!("empty text for {id}")));
        }
        let version = content_version(&text);
        let now = self.clock.now();

        let article = Arc::new(RegulationArticle {
            id: id.clone(),
            title: normalize_text(&fetched.title),
            text,
            key_requirements: fetched.key_requirements,
            penalties: fetched.penalties,
            source_url: fetched.source_url,
            last_verified: now,
            version: version.clone(),
        });

        let generation = previous.map_or(1, |e| e.generation + 1);
        if let Some(prev) = previous
            && prev.source_version != version
        {
            info!(article = %id, from = %short(&prev.source_version), to = %short(&version), "regulation text changed");
        }

        self.archive
            .write()
            .await
            .entry((id.clone(), version.clone()))
            .or_insert_with(|| article.clone());
        self.cache.write().await.insert(
            id.clone(),
            Arc::new(CacheEntry {
                article: article.clone(),
                fetched_at: now,
                source_version: version.clone(),
                generation,
            }),
        );

        info!(article = %id, source = self.source.name(), version = %short(&version), "regulation fetched");
        Ok(article)
    }

    fn fallback(
        &self,
        id: &ArticleId,
        current: Option<Arc<CacheEntry>>,
        err: SourceError,
    ) -> Result<Arc<RegulationArticle>, StoreError> {
        let now = self.clock.now();
        match current {
            Some(entry) if self.policy.classify(entry.fetched_at, now) != Freshness::Expired => {
                let age_hours = (now - entry.fetched_at).num_hours();
                warn!(article = %id, age_hours, error = %err, "regulation fetch failed, serving cached copy");
                Ok(entry.article.clone())
            }
            Some(entry) => {
                warn!(
                    article = %id,
                    fetched_at = %entry.fetched_at,
                    error = %err,
                    "regulation fetch failed and cached copy is past the staleness limit"
                );
                Err(StoreError::RegulationUnavailable {
                    id: id.clone(),
                    source: err,
                })
            }
            None => {
                warn!(article = %id, error = %err, "regulation fetch failed with nothing cached");
                Err(StoreError::RegulationUnavailable {
                    id: id.clone(),
                    source: err,
                })
            }
        }
    }
}

fn short(version: &str) -> &str {
    version.get(..12).unwrap_or(version)
}

impl std::fmt::Debug for RegulationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegulationStore")
            .field("source", &self.source.name())
            .field("allow", &self.allow)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::source::{FetchedArticle, ManualClock};

    struct FakeSource {
        fetches: AtomicUsize,
        failing: AtomicBool,
        text: StdMutex<String>,
        base_url: String,
        delay: Duration,
    }

    impl FakeSource {
        fn new(text: &str) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                text: StdMutex::new(text.to_string()),
                base_url: "https://gdpr-info.eu/".to_string(),
                delay: Duration::ZERO,
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn set_text(&self, text: &str) {
            *self.text.lock().unwrap() = text.to_string();
        }
    }

    #[async_trait]
    impl RegulationSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn url_for(&self, id: &ArticleId) -> String {
            format!("{}art-{}-gdpr/", self.base_url, id.number())
        }

        fn catalogue(&self, _family: Option<RegulationFamily>) -> Vec<ArticleId> {
            vec![ArticleId::gdpr("32"), ArticleId::gdpr("5")]
        }

        async fn fetch(&self, id: &ArticleId) -> Result<FetchedArticle, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(SourceError::Fetch("connection refused".into()));
            }
            Ok(FetchedArticle {
                id: id.clone(),
                title: format!("Article {}", id.number()),
                text: self.text.lock().unwrap().clone(),
                key_requirements: vec![],
                penalties: vec![],
                source_url: self.url_for(id),
                retrieved_at: Utc::now(),
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn store_with(source: Arc<FakeSource>, clock: Arc<ManualClock>) -> RegulationStore {
        RegulationStore::from_config(source, &RegulationCacheConfig::default()).with_clock(clock)
    }

    #[tokio::test]
    async fn get_caches_fresh_articles() {
        let source = Arc::new(FakeSource::new("The controller shall implement measures."));
        let clock = Arc::new(ManualClock::new(t0()));
        let store = store_with(source.clone(), clock.clone());
        let id = ArticleId::gdpr("32");

        let a = store.get(&id).await.unwrap();
        let b = store.get(&id).await.unwrap();
        assert_eq!(source.fetches(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.last_verified, t0());

        clock.advance(TimeDelta::hours(25));
        store.get(&id).await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn text_is_normalised_before_versioning() {
        let clock = Arc::new(ManualClock::new(t0()));
        let typographic = Arc::new(FakeSource::new("See  Art. 5 ( 1 ) \u{2014} \u{201C}lawful\u{201D}"));
        let plain = Arc::new(FakeSource::new("See Article 5(1) - \"lawful\""));
        let id = ArticleId::gdpr("6");

        let a = store_with(typographic, clock.clone()).get(&id).await.unwrap();
        let b = store_with(plain, clock).get(&id).await.unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.version, b.version);
        assert_eq!(a.version, content_version(&a.text));
    }

    #[tokio::test]
    async fn refresh_keeps_prior_versions_resolvable() {
        let source = Arc::new(FakeSource::new("Original wording."));
        let clock = Arc::new(ManualClock::new(t0()));
        let store = store_with(source.clone(), clock);
        let id = ArticleId::gdpr("17");

        let old = store.get(&id).await.unwrap();
        source.set_text("Amended wording.");
        let new = store.refresh(&id).await.unwrap();

        assert_ne!(old.version, new.version);
        assert_eq!(store.get(&id).await.unwrap().version, new.version);
        let archived = store.get_version(&id, &old.version).await.unwrap();
        assert_eq!(archived.text, "Original wording.");
        assert!(matches!(
            store.get_version(&id, "deadbeef").await,
            Err(StoreError::VersionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stale_copy_served_until_limit() {
        let source = Arc::new(FakeSource::new("Security of processing."));
        let clock = Arc::new(ManualClock::new(t0()));
        let store = store_with(source.clone(), clock.clone());
        let id = ArticleId::gdpr("32");

        let original = store.get(&id).await.unwrap();
        source.set_failing(true);

        clock.advance(TimeDelta::days(2));
        let served = store.get(&id).await.unwrap();
        assert!(Arc::ptr_eq(&original, &served));

        clock.advance(TimeDelta::days(6));
        let err = store.get(&id).await.unwrap_err();
        assert!(matches!(err, StoreError::RegulationUnavailable { .. }));
        assert_eq!(err.article_id(), &id);
    }

    #[tokio::test]
    async fn unavailable_without_cache() {
        let source = Arc::new(FakeSource::new("x"));
        source.set_failing(true);
        let store = store_with(source, Arc::new(ManualClock::new(t0())));
        let err = store.get(&ArticleId::gdpr("44")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::RegulationUnavailable {
                source: SourceError::Fetch(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn sources_off_the_allow_list_are_never_fetched() {
        let mut fake = FakeSource::new("Unverified summary.");
        fake.base_url = "https://legal-blog.example.com/".into();
        let source = Arc::new(fake);
        let store = store_with(source.clone(), Arc::new(ManualClock::new(t0())));

        let err = store.get(&ArticleId::gdpr("5")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::RegulationUnavailable {
                source: SourceError::NotAllowed(_),
                ..
            }
        ));
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn concurrent_requests_collapse_to_one_fetch() {
        let mut fake = FakeSource::new("Transfers to third countries.");
        fake.delay = Duration::from_millis(50);
        let source = Arc::new(fake);
        let store = store_with(source.clone(), Arc::new(ManualClock::new(t0())));
        let id = ArticleId::gdpr("44");

        let results = futures::future::join_all((0..8).map(|_| store.get(&id))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(source.fetches(), 1);

        let results = futures::future::join_all((0..4).map(|_| store.refresh(&id))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_shared_by_concurrent_callers() {
        let mut fake = FakeSource::new("Transfers to third countries.");
        fake.delay = Duration::from_millis(50);
        fake.set_failing(true);
        let source = Arc::new(fake);
        let store = store_with(source.clone(), Arc::new(ManualClock::new(t0())));
        let id = ArticleId::gdpr("44");

        let results = futures::future::join_all((0..8).map(|_| store.get(&id))).await;
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Err(StoreError::RegulationUnavailable { .. })))
        );
        assert_eq!(source.fetches(), 1);

        // A later caller is not bound to the earlier failure.
        source.set_failing(false);
        assert!(store.get(&id).await.is_ok());
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn load_family_returns_sorted_articles() {
        let source = Arc::new(FakeSource::new("Body."));
        let store = store_with(source, Arc::new(ManualClock::new(t0())));
        let articles = store.load_family(None).await.unwrap();
        let ids: Vec<String> = articles.iter().map(|a| a.id.to_string()).collect();
        assert_eq!(ids, ["GDPR-Art-5", "GDPR-Art-32"]);
    }
}
