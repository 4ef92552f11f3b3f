//! Splitting contract text into clause-sized segments.
//!
//! Headings start a new segment: `ARTICLE 4.`, `Section 2.1`, numbered
//! headings (`3. Liability`, `2.1 Scope`) and all-caps title lines. Text
//! without any heading falls back to blank-line paragraphs. Segments shorter
//! than [`MIN_SEGMENT_CHARS`] non-whitespace characters merge into the next
//! segment, and a segment whose text repeats an earlier one verbatim is
//! dropped.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

pub const MIN_SEGMENT_CHARS: usize = 10;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:ARTICLE|Article)\s+[\dIVXLCDM]+\b|(?:SECTION|Section)\s+\d[\d.]*|\d+(?:\.\d+)*\.?\s+[A-Z]|[A-Z][A-Z\s&,'-]{5,}$)",
    )
    .unwrap()
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A clause-sized span of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub title: Option<String>,
    pub text: String,
    /// Byte range of `text` in the source.
    pub span: Range<usize>,
}

/// Split `text` into segments in source order.
pub fn segment(text: &str) -> Vec<Segment> {
    let lines = lines_with_offsets(text);
    let heading_starts: Vec<usize> = lines
        .iter()
        .filter(|(_, line)| HEADING.is_match(line.trim()))
        .map(|(offset, _)| *offset)
        .collect();

    let boundaries = if heading_starts.is_empty() {
        paragraph_starts(&lines)
    } else {
        let mut starts = heading_starts;
        if starts.first() != Some(&0) {
            starts.insert(0, 0);
        }
        starts
    };

    let mut raw: Vec<Range<usize>> = Vec::new();
    for (i, &start) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).copied().unwrap_or(text.len());
        if let Some(span) = trim_span(text, start..end) {
            raw.push(span);
        }
    }

    let merged = merge_fragments(text, raw);

    let mut seen = HashSet::new();
    merged
        .into_iter()
        .filter(|span| seen.insert(WHITESPACE.replace_all(&text[span.clone()], " ").into_owned()))
        .map(|span| {
            let body = &text[span.clone()];
            Segment {
                title: title_of(body),
                text: body.to_string(),
                span,
            }
        })
        .collect()
}

fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|line| {
            let start = offset;
            offset += line.len();
            (start, line)
        })
        .collect()
}

/// Offsets of the first non-blank line after each run of blank lines.
fn paragraph_starts(lines: &[(usize, &str)]) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut after_blank = true;
    for (offset, line) in lines {
        if line.trim().is_empty() {
            after_blank = true;
        } else if after_blank {
            starts.push(*offset);
            after_blank = false;
        }
    }
    starts
}

/// Shrink a range to exclude leading and trailing whitespace; `None` if empty.
fn trim_span(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = range.start + leading;
    Some(start..start + trimmed.len())
}

fn significant_chars(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

/// Fold short fragments into the following segment (or the previous one when
/// the fragment is last).
fn merge_fragments(text: &str, spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut out: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    let mut pending: Option<Range<usize>> = None;

    for span in spans {
        let span = match pending.take() {
            Some(fragment) => fragment.start..span.end,
            None => span,
        };
        if significant_chars(&text[span.clone()]) < MIN_SEGMENT_CHARS {
            pending = Some(span);
        } else {
            out.push(span);
        }
    }

    if let Some(fragment) = pending {
        match out.last_mut() {
            Some(last) => last.end = fragment.end,
            None => out.push(fragment),
        }
    }
    out
}

/// Heading line of a segment when it reads like a title.
fn title_of(body: &str) -> Option<String> {
    let first = body.lines().next()?.trim();
    if !HEADING.is_match(first) {
        return None;
    }
    let words = first.split_whitespace().count();
    if words > 12 {
        return None;
    }
    let title = first.trim_end_matches(['.', ':']).trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "\
MASTER SERVICES AGREEMENT

ARTICLE 1. DATA PROTECTION
The Supplier shall process personal data only on documented instructions.

ARTICLE 2. LIABILITY
Neither party shall be liable for indirect or consequential damages.

Section 3.1 Termination
Either party may terminate this Agreement on thirty days written notice.
";

    #[test]
    fn splits_on_headings() {
        let segments = segment(CONTRACT);
        let titles: Vec<Option<&str>> = segments.iter().map(|s| s.title.as_deref()).collect();
        assert_eq!(
            titles,
            [
                Some("MASTER SERVICES AGREEMENT"),
                Some("ARTICLE 1. DATA PROTECTION"),
                Some("ARTICLE 2. LIABILITY"),
                Some("Section 3.1 Termination"),
            ]
        );
        assert!(segments[1].text.contains("documented instructions"));
    }

    #[test]
    fn spans_point_into_source() {
        for s in segment(CONTRACT) {
            assert_eq!(&CONTRACT[s.span.clone()], s.text);
            assert_eq!(s.text, s.text.trim());
        }
    }

    #[test]
    fn paragraph_fallback_without_headings() {
        let text = "The customer pays all invoices within thirty days.\n\n\
                    Confidential information stays confidential for five years.\n";
        let segments = segment(text);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.title.is_none()));
        assert!(segments[1].text.starts_with("Confidential"));
    }

    #[test]
    fn short_fragments_merge_forward() {
        let text = "Sig.\n\nThe supplier warrants the services for twelve months.\n";
        let segments = segment(text);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.starts_with("Sig."));
        assert_eq!(segments[0].span.start, 0);
    }

    #[test]
    fn trailing_fragment_merges_backward() {
        let text = "The supplier warrants the services for twelve months.\n\nEnd.\n";
        let segments = segment(text);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.ends_with("End."));
    }

    #[test]
    fn duplicates_dropped() {
        let text = "Payment is due within thirty days.\n\n\
                    Payment is due   within thirty days.\n\n\
                    Notices must be in writing and delivered by hand.\n";
        let segments = segment(text);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn deterministic_boundaries() {
        assert_eq!(segment(CONTRACT), segment(CONTRACT));
    }

    #[test]
    fn empty_text_has_no_segments() {
        assert!(segment("").is_empty());
        assert!(segment("   \n\n  ").is_empty());
    }
}
