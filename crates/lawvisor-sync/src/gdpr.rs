//! Live GDPR article source scraping gdpr-info.eu.
//!
//! Only the article body is taken from the page. Key requirements and
//! penalties come from the built-in corpus, and SEC rules (which have no
//! stable HTML source) are served from it directly.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lawvisor_core::{ArticleId, RegulationFamily};
use lawvisor_store::{FetchedArticle, RegulationSource, SourceError, StaticCorpusSource};
use regex::Regex;
use tracing::{debug, info};

use crate::http::{self, SyncError};

pub const DEFAULT_BASE_URL: &str = "https://gdpr-info.eu";

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<h1[^>]*>Art\.\s*\d+\s*GDPR\s*[–-]\s*([^<]+)</h1>").unwrap());
static BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div class="entry-content"[^>]*>(.*?)</div>"#).unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

pub struct GdprInfoSource {
    client: reqwest::Client,
    base_url: String,
    corpus: StaticCorpusSource,
}

impl GdprInfoSource {
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    /// `base_url` should be like `https://gdpr-info.eu` (no trailing slash).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            client: http::client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            corpus: StaticCorpusSource,
        })
    }

    async fn scrape(&self, id: &ArticleId) -> Result<FetchedArticle, SourceError> {
        let url = self.url_for(id);
        info!(url = %url, "fetching GDPR article");
        let resp = self.client.get(&url).send().await.map_err(SyncError::from)?;
        let html = http::check_status(resp)
            .await?
            .text()
            .await
            .map_err(SyncError::from)?;
        let (title, text) = parse_article_html(&html)?;
        debug!(id = %id, chars = text.len(), "parsed GDPR article");

        // Requirements and penalties are editorial; take them from the corpus
        // when it has the article.
        let (key_requirements, penalties) = match self.corpus.fetch(id).await {
            Ok(known) => (known.key_requirements, known.penalties),
            Err(_) => (Vec::new(), Vec::new()),
        };

        Ok(FetchedArticle {
            id: id.clone(),
            title: title.unwrap_or_else(|| format!("Article {}", id.number())),
            text,
            key_requirements,
            penalties,
            source_url: url,
            retrieved_at: Utc::now(),
        })
    }
}

#[async_trait]
impl RegulationSource for GdprInfoSource {
    fn name(&self) -> &str {
        "gdpr-info.eu"
    }

    fn url_for(&self, id: &ArticleId) -> String {
        match id.family() {
            RegulationFamily::Gdpr => format!("{}/art-{}-gdpr/", self.base_url, id.number()),
            RegulationFamily::Sec => self.corpus.url_for(id),
        }
    }

    fn catalogue(&self, family: Option<RegulationFamily>) -> Vec<ArticleId> {
        self.corpus.catalogue(family)
    }

    async fn fetch(&self, id: &ArticleId) -> Result<FetchedArticle, SourceError> {
        match id.family() {
            RegulationFamily::Gdpr => self.scrape(id).await,
            RegulationFamily::Sec => self.corpus.fetch(id).await,
        }
    }
}

/// Title (when present) and tag-stripped body text of an article page.
pub fn parse_article_html(html: &str) -> Result<(Option<String>, String), SourceError> {
    let title = TITLE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()));
    let body = BODY
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| SourceError::Parse("no entry-content block".into()))?;
    let text = decode_entities(&TAG.replace_all(body.as_str(), " "));
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(SourceError::Parse("empty article body".into()));
    }
    Ok((title, text))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&#8211;", "-")
        .replace("&#8217;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<h1 class="entry-title">Art. 32 GDPR – Security of processing</h1>
<div class="entry-content"><ol><li>Taking into account the state of the art, the controller
and the processor shall implement appropriate technical and organisational measures.</li>
<li>The pseudonymisation &amp; encryption of personal data;</li></ol></div>
<div class="footer">ignored</div>
</body></html>"#;

    fn source() -> GdprInfoSource {
        GdprInfoSource::with_base_url("https://gdpr-info.eu/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_title_and_body() {
        let (title, text) = parse_article_html(PAGE).unwrap();
        assert_eq!(title.as_deref(), Some("Security of processing"));
        assert!(text.starts_with("Taking into account"));
        assert!(text.contains("pseudonymisation & encryption"));
        assert!(!text.contains('<'));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn missing_body_is_a_parse_error() {
        let err = parse_article_html("<h1>Art. 5 GDPR – Principles</h1>").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn missing_title_is_tolerated() {
        let (title, _) = parse_article_html(r#"<div class="entry-content">Text of the article.</div>"#).unwrap();
        assert!(title.is_none());
    }

    #[test]
    fn urls_follow_site_layout() {
        let s = source();
        assert_eq!(s.url_for(&ArticleId::gdpr("17")), "https://gdpr-info.eu/art-17-gdpr/");
        assert_eq!(s.url_for(&ArticleId::sec("10b-5")), "https://www.sec.gov/rules/10b-5");
    }

    #[tokio::test]
    async fn sec_rules_come_from_corpus() {
        let article = source().fetch(&ArticleId::sec("FD")).await.unwrap();
        assert_eq!(article.id, ArticleId::sec("FD"));
        assert!(!article.key_requirements.is_empty());
    }

    #[test]
    fn catalogue_matches_corpus() {
        assert_eq!(
            source().catalogue(Some(RegulationFamily::Gdpr)),
            StaticCorpusSource.catalogue(Some(RegulationFamily::Gdpr))
        );
    }
}
