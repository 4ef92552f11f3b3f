//! Regulatory articles and their identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::citation::{article_sort_key, normalize_article_number};
use crate::clause::ClauseType;

/// A regulatory regime the store can cite against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulationFamily {
    /// EU General Data Protection Regulation (2016/679).
    Gdpr,
    /// US Securities and Exchange Commission rules.
    Sec,
}

impl RegulationFamily {
    pub const ALL: [RegulationFamily; 2] = [Self::Gdpr, Self::Sec];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gdpr => "gdpr",
            Self::Sec => "sec",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Gdpr => "General Data Protection Regulation",
            Self::Sec => "SEC Regulations",
        }
    }
}

impl fmt::Display for RegulationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegulationFamily {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gdpr" => Ok(Self::Gdpr),
            "sec" => Ok(Self::Sec),
            _ => Err(IdParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised regulation identifier: {0:?}")]
pub struct IdParseError(pub String);

/// Identifier of a single article or rule within a regulation family.
///
/// Displays as `GDPR-Art-5` or `SEC-10b-5`. Ordering is by family, then by
/// [`article_sort_key`], so `GDPR-Art-5 < GDPR-Art-12`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArticleId {
    family: RegulationFamily,
    number: String,
}

impl ArticleId {
    pub fn new(family: RegulationFamily, number: &str) -> Self {
        Self {
            family,
            number: normalize_article_number(number),
        }
    }

    pub fn gdpr(number: &str) -> Self {
        Self::new(RegulationFamily::Gdpr, number)
    }

    pub fn sec(number: &str) -> Self {
        Self::new(RegulationFamily::Sec, number)
    }

    pub fn family(&self) -> RegulationFamily {
        self.family
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Parse the forms citations appear in: `GDPR-Art-5`, `GDPR Art. 5`,
    /// `Art. 5 GDPR`, `SEC-10b-5`, `SEC Rule 10b-5`.
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        let trimmed = s.trim();
        let err = || IdParseError(s.to_string());

        let (family, rest) = if let Some((head, tail)) = trimmed.split_once(['-', ' '])
            && let Ok(family) = head.parse::<RegulationFamily>()
        {
            (family, tail)
        } else if let Some((head, tail)) = trimmed.rsplit_once(' ')
            && let Ok(family) = tail.parse::<RegulationFamily>()
        {
            (family, head)
        } else {
            return Err(err());
        };

        let rest = rest.trim_start_matches(['-', ' ']);
        let rest = match rest.get(..4) {
            Some(head) if head.eq_ignore_ascii_case("art-") => &rest[4..],
            _ => rest,
        };
        let number = normalize_article_number(rest);
        if number.is_empty() {
            return Err(err());
        }
        Ok(Self { family, number })
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            RegulationFamily::Gdpr => write!(f, "GDPR-Art-{}", self.number),
            RegulationFamily::Sec => write!(f, "SEC-{}", self.number),
        }
    }
}

impl Ord for ArticleId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.family
            .cmp(&other.family)
            .then_with(|| article_sort_key(&self.number).cmp(&article_sort_key(&other.number)))
            .then_with(|| self.number.cmp(&other.number))
    }
}

impl PartialOrd for ArticleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for ArticleId {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArticleId> for String {
    fn from(id: ArticleId) -> Self {
        id.to_string()
    }
}

impl FromStr for ArticleId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A normalised regulatory article as served by the regulation store.
///
/// Owned by the store and shared behind `Arc`; consumers never mutate it. A
/// refresh that changes the text produces a new value with a new `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationArticle {
    pub id: ArticleId,
    pub title: String,
    /// Normalised full text (see [`crate::normalize_text`]).
    pub text: String,
    pub key_requirements: Vec<String>,
    pub penalties: Vec<String>,
    pub source_url: String,
    pub last_verified: DateTime<Utc>,
    /// Content digest of `text`; assessments record the version they cited.
    pub version: String,
}

impl RegulationArticle {
    /// First sentences of the text, up to `max_len` bytes.
    pub fn summary(&self, max_len: usize) -> String {
        let mut summary = String::new();
        for sentence in self.text.split(". ") {
            let sentence = sentence.trim().trim_end_matches('.');
            if sentence.is_empty() {
                continue;
            }
            if summary.len() + sentence.len() + 2 > max_len {
                break;
            }
            summary.push_str(sentence);
            summary.push_str(". ");
        }
        if summary.is_empty() {
            return self.title.clone();
        }
        summary.trim_end().to_string()
    }
}

/// Articles a clause type logically implicates.
///
/// A document that contains a clause of this type cannot be scored unless the
/// store can serve every article listed here.
pub fn implicated_articles(clause_type: ClauseType) -> Vec<ArticleId> {
    let (family, numbers): (RegulationFamily, &[&str]) = match clause_type {
        ClauseType::DataProtection => (
            RegulationFamily::Gdpr,
            &["5", "6", "7", "12", "13", "25", "32"],
        ),
        ClauseType::Liability => (RegulationFamily::Sec, &["10b-5"]),
        ClauseType::IntellectualProperty => (RegulationFamily::Gdpr, &["5"]),
        ClauseType::Jurisdiction => (RegulationFamily::Gdpr, &["44", "46"]),
        ClauseType::Termination => (RegulationFamily::Gdpr, &["17"]),
        ClauseType::Other => (RegulationFamily::Gdpr, &[]),
    };
    numbers.iter().map(|n| ArticleId::new(family, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(ArticleId::gdpr("5").to_string(), "GDPR-Art-5");
        assert_eq!(ArticleId::sec("10b-5").to_string(), "SEC-10b-5");
    }

    #[test]
    fn parse_citation_forms() {
        let expected = ArticleId::gdpr("5");
        for form in ["GDPR-Art-5", "GDPR Art. 5", "gdpr article 5", "Art. 5 GDPR", "GDPR-Art-05"] {
            assert_eq!(ArticleId::parse(form).unwrap(), expected, "form {form:?}");
        }
        assert_eq!(ArticleId::parse("SEC-10b-5").unwrap(), ArticleId::sec("10b-5"));
        assert_eq!(ArticleId::parse("SEC Rule 10b-5").unwrap(), ArticleId::sec("10b-5"));
        assert_eq!(ArticleId::parse("SEC-FD").unwrap(), ArticleId::sec("FD"));
    }

    #[test]
    fn parse_rejects_unknown_family() {
        assert!(ArticleId::parse("CCPA-1798.100").is_err());
        assert!(ArticleId::parse("GDPR").is_err());
        assert!(ArticleId::parse("").is_err());
    }

    #[test]
    fn ordering_is_numeric_within_family() {
        let mut ids = vec![
            ArticleId::gdpr("12"),
            ArticleId::sec("10b-5"),
            ArticleId::gdpr("5"),
            ArticleId::gdpr("44"),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            rendered,
            ["GDPR-Art-5", "GDPR-Art-12", "GDPR-Art-44", "SEC-10b-5"]
        );
    }

    #[test]
    fn serde_uses_display_form() {
        let id = ArticleId::gdpr("32");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"GDPR-Art-32\"");
        let parsed: ArticleId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn implicated_articles_per_type() {
        assert_eq!(implicated_articles(ClauseType::DataProtection).len(), 7);
        assert_eq!(
            implicated_articles(ClauseType::Liability),
            vec![ArticleId::sec("10b-5")]
        );
        assert!(implicated_articles(ClauseType::Other).is_empty());
    }

    #[test]
    fn summary_stops_at_length() {
        let article = RegulationArticle {
            id: ArticleId::gdpr("5"),
            title: "Principles".into(),
            text: "First sentence here. Second sentence follows. Third one is long enough to overflow."
                .into(),
            key_requirements: vec![],
            penalties: vec![],
            source_url: "https://gdpr-info.eu/art-5-gdpr/".into(),
            last_verified: Utc::now(),
            version: "v".into(),
        };
        assert_eq!(
            article.summary(50),
            "First sentence here. Second sentence follows."
        );
    }
}
