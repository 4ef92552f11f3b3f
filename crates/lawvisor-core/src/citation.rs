//! Citation normalisation for regulatory text and article numbers.
//!
//! Identical legal text fetched from different sources must compare equal, so
//! every article body passes through [`normalize_text`] before it is cached or
//! hashed. Article numbers get a lexicographically-sortable key so ties in
//! retrieval can be broken by "ascending article identifier" without string
//! comparison putting Article 12 before Article 5.
//!
//! # Article numbering conventions
//!
//! - Plain numeric: GDPR Art. 5, Art. 12, Art. 44
//! - Letter suffix: SEC Rule 13D, 10b-5
//! - Named rules: SEC Regulation FD, S-K

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ARTICLE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bart(?:icle)?s?\.?\s*(\d+[a-z]?)\b").unwrap());
static SECTION_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:§|\bsec\.|\bsection)\s*(\d+[a-z]?)\b").unwrap());
static PARAGRAPH_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:para\.|paragraph)\s*(\d+)\b").unwrap());
static PAREN_INNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*([0-9A-Za-z]{1,4})\s*\)").unwrap());
static PAREN_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-Za-z)])\s+(\([0-9A-Za-z]{1,4}\))").unwrap());

/// Normalise regulatory text so equivalent sources compare equal.
///
/// 1. Typographic quotes, dashes and non-breaking spaces become ASCII
/// 2. Runs of whitespace collapse to a single space
/// 3. `Art. 5`, `art 5`, `ARTICLES 5` become `Article 5`; `§ 3` and
///    `Sec. 3` become `Section 3`; `para. 2` becomes `paragraph 2`
/// 4. Paragraph markers lose inner padding and attach to their reference:
///    `5 ( 1 ) (a)` becomes `5(1)(a)`
pub fn normalize_text(s: &str) -> String {
    let ascii: String = s
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201F}' => '"',
            '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect();

    let collapsed = WHITESPACE.replace_all(ascii.trim(), " ");
    let articles = ARTICLE_REF.replace_all(&collapsed, "Article $1");
    let sections = SECTION_REF.replace_all(&articles, "Section $1");
    let paragraphs = PARAGRAPH_REF.replace_all(&sections, "paragraph $1");
    let padded = PAREN_INNER.replace_all(&paragraphs, "($1)");

    // Joining is repeated because each pass can expose a new adjacent marker.
    let mut joined = padded.into_owned();
    loop {
        let next = PAREN_JOIN.replace_all(&joined, "$1$2").into_owned();
        if next == joined {
            break;
        }
        joined = next;
    }
    joined
}

/// Normalise an article number as written in citations.
///
/// Strips `Art.` / `Article` / `Rule` / `Regulation` prefixes and leading
/// zeros so `"Art. 05"`, `"article 5"` and `"5"` all become `"5"`. Letters are
/// kept in the case they were written (`10b-5` stays `10b-5`).
pub fn normalize_article_number(s: &str) -> String {
    let mut rest = s.trim();
    for prefix in ["article", "art.", "art", "rule", "regulation", "reg."] {
        if let Some(head) = rest.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            rest = rest[prefix.len()..].trim_start_matches(['.', ' ', '-']);
            break;
        }
    }
    let rest = rest.trim();

    let digit_end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if digit_end == 0 {
        return rest.to_string();
    }
    let number: u64 = rest[..digit_end].parse().unwrap_or(0);
    format!("{number}{}", &rest[digit_end..])
}

/// Sortable key for an article number.
///
/// Input: bare number like "5", "12", "13D", "10b-5", "FD"
/// Output: "005.000.000", "012.000.000", "013.004.000", "010.002.005", "000.006.004"
///
/// # Algorithm
///
/// 1. Leading ASCII digits → base number (zero-padded to 3 digits)
/// 2. Each following letter → its alphabet position (A=1 … Z=26)
/// 3. A number after a separator (`-`, `.`, `(`) → its value
/// 4. At most 3 segments, padded with "000", joined with "."
pub fn article_sort_key(s: &str) -> String {
    let upper = normalize_article_number(s).to_ascii_uppercase();
    let bytes = upper.as_bytes();

    let digit_end = bytes
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(bytes.len());
    let base: u32 = upper[..digit_end].parse().unwrap_or(0);

    let mut segments: Vec<u32> = vec![base];
    let mut i = digit_end;
    while i < bytes.len() && segments.len() < 3 {
        let b = bytes[i];
        if b.is_ascii_uppercase() {
            segments.push((b - b'A') as u32 + 1);
            i += 1;
        } else if b.is_ascii_digit() {
            let end = bytes[i..]
                .iter()
                .position(|c| !c.is_ascii_digit())
                .map_or(bytes.len(), |p| i + p);
            segments.push(upper[i..end].parse().unwrap_or(0));
            i = end;
        } else {
            // Separators carry no ordering weight.
            i += 1;
        }
    }

    while segments.len() < 3 {
        segments.push(0);
    }

    format!("{:03}.{:03}.{:03}", segments[0], segments[1], segments[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: assert a list of inputs produces sort keys in strictly ascending order.
    fn assert_sorted_order(inputs: &[&str]) {
        let keys: Vec<String> = inputs.iter().map(|s| article_sort_key(s)).collect();
        for i in 1..keys.len() {
            assert!(
                keys[i - 1] < keys[i],
                "Expected {:?} ({}) < {:?} ({})",
                inputs[i - 1],
                keys[i - 1],
                inputs[i],
                keys[i],
            );
        }
    }

    #[test]
    fn numeric_articles_sort_numerically() {
        assert_sorted_order(&["5", "6", "7", "12", "13", "17", "25", "44", "46"]);
    }

    #[test]
    fn letter_suffixes_sort_after_base() {
        assert_sorted_order(&["13", "13A", "13D", "14"]);
    }

    #[test]
    fn sub_rule_numbers() {
        assert_sorted_order(&["10b-5", "10b-6", "10c"]);
    }

    #[test]
    fn exact_keys() {
        assert_eq!(article_sort_key("5"), "005.000.000");
        assert_eq!(article_sort_key("13D"), "013.004.000");
        assert_eq!(article_sort_key("10b-5"), "010.002.005");
        assert_eq!(article_sort_key("FD"), "000.006.004");
        assert_eq!(article_sort_key(""), "000.000.000");
    }

    #[test]
    fn article_number_prefixes_stripped() {
        assert_eq!(normalize_article_number("Art. 05"), "5");
        assert_eq!(normalize_article_number("article 17"), "17");
        assert_eq!(normalize_article_number("Rule 10b-5"), "10b-5");
        assert_eq!(normalize_article_number("  32 "), "32");
        assert_eq!(normalize_article_number("FD"), "FD");
    }

    #[test]
    fn citation_forms_compare_equal() {
        let a = normalize_text("Art. 5 ( 1 ) (a)   GDPR requires");
        let b = normalize_text("Article 5(1)(a) GDPR requires");
        assert_eq!(a, b);
        assert_eq!(b, "Article 5(1)(a) GDPR requires");
    }

    #[test]
    fn typographic_characters_folded() {
        let a = normalize_text("the \u{201C}controller\u{201D}\u{00A0}shall \u{2014} without delay");
        assert_eq!(a, "the \"controller\" shall - without delay");
    }

    #[test]
    fn section_and_paragraph_references() {
        assert_eq!(normalize_text("see § 3 and para. 2"), "see Section 3 and paragraph 2");
        assert_eq!(normalize_text("Sec. 13(d)"), "Section 13(d)");
    }

    #[test]
    fn long_parentheticals_left_alone() {
        let text = normalize_text("within 72 (seventy-two) hours");
        assert_eq!(text, "within 72 (seventy-two) hours");
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(normalize_text("  a\n\n b\t c  "), "a b c");
    }
}
