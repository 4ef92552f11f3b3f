//! Built-in regulation corpus.
//!
//! Curated text for the GDPR articles and SEC rules the analyser cites,
//! attributed to their official publication URLs. Used offline and as the
//! reference set for tests.

use async_trait::async_trait;
use chrono::Utc;
use lawvisor_core::{ArticleId, RegulationFamily};

use crate::SourceError;
use crate::source::{FetchedArticle, RegulationSource};

const GDPR_UPPER_FINE: &str = "Up to €20 million or 4% of annual global turnover";
const GDPR_LOWER_FINE: &str = "Up to €10 million or 2% of annual global turnover";

struct CorpusEntry {
    family: RegulationFamily,
    number: &'static str,
    title: &'static str,
    body: &'static str,
    key_requirements: &'static [&'static str],
    penalties: &'static [&'static str],
}

static CORPUS: &[CorpusEntry] = &[
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "5",
        title: "Principles relating to processing of personal data",
        body: "Personal data shall be processed lawfully, fairly and in a transparent manner in \
               relation to the data subject. Personal data shall be collected for specified, \
               explicit and legitimate purposes and not further processed in a manner that is \
               incompatible with those purposes. Processing shall be limited to what is necessary \
               (data minimisation), accurate and kept up to date, kept for no longer than is \
               necessary (storage limitation), and protected against unauthorised or unlawful \
               processing (integrity and confidentiality). The controller shall be responsible \
               for, and be able to demonstrate compliance with, these principles (accountability).",
        key_requirements: &[
            "Personal data must be processed lawfully, fairly, and transparently",
            "Data must be collected for specified, explicit, and legitimate purposes",
            "Data must be adequate, relevant, and limited to what is necessary",
            "Data must be accurate and kept up to date",
            "Data must be kept for no longer than necessary",
            "Data must be processed securely",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "6",
        title: "Lawfulness of processing",
        body: "Processing of personal data shall be lawful only if and to the extent that at least \
               one lawful basis applies: the data subject has given consent to the processing for \
               one or more specific purposes; processing is necessary for the performance of a \
               contract; processing is necessary for compliance with a legal obligation; \
               processing is necessary to protect vital interests; processing is necessary for a \
               task carried out in the public interest; or processing is necessary for the \
               legitimate interests pursued by the controller.",
        key_requirements: &[
            "Processing requires a lawful basis",
            "Consent must be freely given, specific, informed, and unambiguous",
            "Processing must be necessary for stated purpose",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "7",
        title: "Conditions for consent",
        body: "Where processing is based on consent, the controller shall be able to demonstrate \
               that the data subject has consented to processing of his or her personal data. The \
               request for consent shall be presented in a manner which is clearly distinguishable \
               from other matters, in an intelligible and easily accessible form, using clear and \
               plain language. The data subject shall have the right to withdraw consent at any \
               time, and it shall be as easy to withdraw as to give consent.",
        key_requirements: &[
            "Controller must demonstrate consent was given",
            "Consent request must be distinguishable and in clear language",
            "Consent can be withdrawn at any time",
            "Withdrawal must be as easy as giving consent",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "12",
        title: "Transparent information, communication and modalities for the exercise of the rights of the data subject",
        body: "The controller shall take appropriate measures to provide any information and \
               communication relating to processing to the data subject in a concise, transparent, \
               intelligible and easily accessible form, using clear and plain language. The \
               controller shall provide information on action taken on a request by the data \
               subject without undue delay and in any event within one month of receipt of the \
               request.",
        key_requirements: &[
            "Information must be provided in concise, transparent, intelligible form",
            "Information must be in clear and plain language",
            "Response to data subject requests within one month",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "13",
        title: "Information to be provided where personal data are collected from the data subject",
        body: "Where personal data relating to a data subject are collected, the controller shall \
               provide the identity and contact details of the controller, the purposes and legal \
               basis of the processing, the recipients of the personal data, any intention to \
               transfer personal data to a third country, and the period for which the personal \
               data will be stored or the criteria used to determine that retention period.",
        key_requirements: &[
            "Identity and contact details of controller",
            "Purposes and legal basis for processing",
            "Recipients of personal data",
            "Details of international transfers",
            "Data retention period",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "17",
        title: "Right to erasure ('right to be forgotten')",
        body: "The data subject shall have the right to obtain from the controller the erasure of \
               personal data concerning him or her without undue delay, and the controller shall \
               have the obligation to erase personal data without undue delay where the personal \
               data are no longer necessary for the purposes for which they were collected, the \
               data subject withdraws consent, or the personal data have been unlawfully \
               processed. On termination or expiry of the relationship, retained data shall be \
               deleted or returned.",
        key_requirements: &[
            "Right to obtain erasure without undue delay",
            "Applies when data no longer necessary for purpose",
            "Applies when consent withdrawn",
            "Applies when data unlawfully processed",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "25",
        title: "Data protection by design and by default",
        body: "The controller shall, both at the time of the determination of the means for \
               processing and at the time of the processing itself, implement appropriate \
               technical and organisational measures, such as pseudonymisation, designed to \
               implement data-protection principles such as data minimisation. By default, only \
               personal data which are necessary for each specific purpose of the processing are \
               processed.",
        key_requirements: &[
            "Implement appropriate technical measures",
            "Implement appropriate organisational measures",
            "Ensure only necessary data is processed by default",
        ],
        penalties: &[GDPR_LOWER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "28",
        title: "Processor",
        body: "Where processing is to be carried out on behalf of a controller, the controller \
               shall use only processors providing sufficient guarantees to implement appropriate \
               technical and organisational measures. The processor shall not engage another \
               processor (sub-processor) without prior specific or general written authorisation \
               of the controller. Processing by a processor shall be governed by a contract that \
               sets out the subject-matter, duration, nature and purpose of the processing.",
        key_requirements: &[
            "Use only processors with sufficient guarantees",
            "Processing governed by contract or legal act",
            "Processor must not engage sub-processor without authorization",
        ],
        penalties: &[GDPR_LOWER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "32",
        title: "Security of processing",
        body: "The controller and the processor shall implement appropriate technical and \
               organisational measures to ensure a level of security appropriate to the risk, \
               including the pseudonymisation and encryption of personal data, the ability to \
               ensure the ongoing confidentiality, integrity, availability and resilience of \
               processing systems, the ability to restore access to personal data in a timely \
               manner after an incident, and a process for regularly testing the effectiveness of \
               security measures.",
        key_requirements: &[
            "Implement appropriate technical measures",
            "Implement appropriate organisational measures",
            "Include pseudonymisation and encryption",
            "Ensure ongoing confidentiality, integrity, availability",
        ],
        penalties: &[GDPR_LOWER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "33",
        title: "Notification of a personal data breach to the supervisory authority",
        body: "In the case of a personal data breach, the controller shall without undue delay and, \
               where feasible, not later than 72 hours after having become aware of it, notify the \
               personal data breach to the supervisory authority. The processor shall notify the \
               controller without undue delay after becoming aware of a breach. The notification \
               shall describe the nature of the breach, its likely consequences and the measures \
               taken or proposed to address it.",
        key_requirements: &[
            "Notify supervisory authority within 72 hours",
            "Describe nature of breach",
            "Describe likely consequences",
            "Describe measures taken",
        ],
        penalties: &[GDPR_LOWER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "44",
        title: "General principle for transfers",
        body: "Any transfer of personal data which are undergoing processing or are intended for \
               processing after transfer to a third country or to an international organisation \
               shall take place only if the conditions laid down in this Chapter are complied with \
               by the controller and processor, so that the level of protection of natural persons \
               guaranteed by this Regulation is not undermined, regardless of the governing law or \
               jurisdiction of the parties.",
        key_requirements: &[
            "Transfers to third countries only with adequate safeguards",
            "Level of protection must not be undermined",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Gdpr,
        number: "46",
        title: "Transfers subject to appropriate safeguards",
        body: "In the absence of an adequacy decision, a controller or processor may transfer \
               personal data to a third country or an international organisation only if the \
               controller or processor has provided appropriate safeguards, such as standard \
               contractual clauses adopted by the Commission, binding corporate rules, an approved \
               code of conduct or an approved certification mechanism, and on condition that \
               enforceable data subject rights and effective legal remedies are available in \
               the courts of the relevant jurisdiction.",
        key_requirements: &[
            "Standard contractual clauses",
            "Binding corporate rules",
            "Approved codes of conduct",
            "Approved certification mechanisms",
        ],
        penalties: &[GDPR_UPPER_FINE],
    },
    CorpusEntry {
        family: RegulationFamily::Sec,
        number: "10b-5",
        title: "Employment of Manipulative and Deceptive Devices",
        body: "It shall be unlawful for any person, directly or indirectly, to employ any device, \
               scheme, or artifice to defraud, to make any untrue statement of a material fact or \
               to omit to state a material fact necessary to make the statements made not \
               misleading, or to engage in any act, practice, or course of business which operates \
               as a fraud or deceit upon any person, in connection with the purchase or sale of any \
               security. Contractual disclaimers, indemnities and limitations of liability do not \
               excuse fraud or intentional misrepresentation.",
        key_requirements: &[
            "Prohibition on fraud in connection with securities",
            "Prohibition on making untrue statements of material fact",
            "Prohibition on omitting material facts",
        ],
        penalties: &[],
    },
    CorpusEntry {
        family: RegulationFamily::Sec,
        number: "FD",
        title: "Regulation Fair Disclosure",
        body: "Whenever an issuer, or any person acting on its behalf, discloses material nonpublic \
               information to market professionals or holders of the issuer's securities, the \
               issuer shall make public disclosure of that information simultaneously for an \
               intentional disclosure and promptly for a non-intentional disclosure.",
        key_requirements: &[
            "Simultaneous public disclosure of material nonpublic information",
            "Applies to communications with market professionals and shareholders",
            "24-hour cure period for unintentional selective disclosure",
        ],
        penalties: &[],
    },
    CorpusEntry {
        family: RegulationFamily::Sec,
        number: "S-K",
        title: "Standard Instructions for Filing Forms",
        body: "Regulation S-K states the requirements applicable to the content of the non-financial \
               statement portions of filings, including the description of business, risk factors, \
               legal proceedings, management's discussion and analysis of financial condition, and \
               executive compensation.",
        key_requirements: &[
            "Disclosure of business description",
            "Risk factor disclosure",
            "Management's discussion and analysis",
            "Executive compensation disclosure",
        ],
        penalties: &[],
    },
    CorpusEntry {
        family: RegulationFamily::Sec,
        number: "13D",
        title: "Beneficial Ownership Reporting",
        body: "Any person who acquires beneficial ownership of more than five percent of a class of \
               registered equity securities shall file a statement disclosing the identity of the \
               acquirer, the source and amount of funds, and the purpose of the transaction, and \
               shall promptly amend the statement upon any material change.",
        key_requirements: &[
            "Report within 10 days of acquiring 5% or more",
            "Disclose identity, source of funds, purpose",
            "Promptly amend for material changes",
        ],
        penalties: &[],
    },
];

/// Official publication URL for an article.
pub fn official_url(id: &ArticleId) -> String {
    match id.family() {
        RegulationFamily::Gdpr => format!("https://gdpr-info.eu/art-{}-gdpr/", id.number()),
        RegulationFamily::Sec => {
            format!("https://www.sec.gov/rules/{}", id.number().to_ascii_lowercase())
        }
    }
}

/// Serves the built-in corpus. Never fails for an article it publishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCorpusSource;

impl StaticCorpusSource {
    fn entry(id: &ArticleId) -> Option<&'static CorpusEntry> {
        CORPUS
            .iter()
            .find(|e| e.family == id.family() && ArticleId::new(e.family, e.number) == *id)
    }
}

#[async_trait]
impl RegulationSource for StaticCorpusSource {
    fn name(&self) -> &str {
        "builtin"
    }

    fn url_for(&self, id: &ArticleId) -> String {
        official_url(id)
    }

    fn catalogue(&self, family: Option<RegulationFamily>) -> Vec<ArticleId> {
        CORPUS
            .iter()
            .filter(|e| family.is_none_or(|f| f == e.family))
            .map(|e| ArticleId::new(e.family, e.number))
            .collect()
    }

    async fn fetch(&self, id: &ArticleId) -> Result<FetchedArticle, SourceError> {
        let entry = Self::entry(id).ok_or_else(|| SourceError::NotFound(id.clone()))?;

        let mut text = format!("{}. {}", entry.title, entry.body);
        for requirement in entry.key_requirements {
            text.push(' ');
            text.push_str(requirement);
            text.push('.');
        }

        Ok(FetchedArticle {
            id: id.clone(),
            title: entry.title.to_string(),
            text,
            key_requirements: entry.key_requirements.iter().map(|s| s.to_string()).collect(),
            penalties: entry.penalties.iter().map(|s| s.to_string()).collect(),
            source_url: official_url(id),
            retrieved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use lawvisor_core::{ClauseType, implicated_articles};

    use super::*;

    #[test]
    fn catalogue_lists_both_families() {
        let source = StaticCorpusSource;
        assert_eq!(source.catalogue(Some(RegulationFamily::Gdpr)).len(), 12);
        assert_eq!(source.catalogue(Some(RegulationFamily::Sec)).len(), 4);
        assert_eq!(source.catalogue(None).len(), 16);
    }

    #[test]
    fn every_implicated_article_is_published() {
        let published = StaticCorpusSource.catalogue(None);
        for ty in ClauseType::ALL {
            for id in implicated_articles(ty) {
                assert!(published.contains(&id), "{id} missing from corpus");
            }
        }
    }

    #[test]
    fn official_urls() {
        assert_eq!(
            official_url(&ArticleId::gdpr("32")),
            "https://gdpr-info.eu/art-32-gdpr/"
        );
        assert_eq!(
            official_url(&ArticleId::sec("10b-5")),
            "https://www.sec.gov/rules/10b-5"
        );
    }

    #[tokio::test]
    async fn fetch_builds_text_from_title_body_and_requirements() {
        let article = StaticCorpusSource.fetch(&ArticleId::gdpr("33")).await.unwrap();
        assert!(article.text.starts_with("Notification of a personal data breach"));
        assert!(article.text.contains("72 hours"));
        assert!(article.text.ends_with("Describe measures taken."));
        assert_eq!(article.penalties, vec![GDPR_LOWER_FINE.to_string()]);
    }

    #[tokio::test]
    async fn unknown_article_is_not_found() {
        let err = StaticCorpusSource.fetch(&ArticleId::gdpr("99")).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }
}
