//! Line-oriented outline parser.
//!
//! # Responsibility
//! - Recognize date headings, tag tokens, indentation and blank lines.
//! - Assign `line_position` and `date_bucket` to every emitted note.
//!
//! # Invariants
//! - Parsing is a pure function of the input text; the active date bucket
//!   lives in a `ParserState` value threaded through the line loop.
//! - `\n`, `\r\n` and a lone `\r` all end a physical line.
//! - A line that is not valid UTF-8 is skipped on its own; the rest of the
//!   source still parses.
//! - Blank lines, date headings and skipped lines never consume a
//!   `line_position` slot.
//! - Every emitted note has a fingerprint unique within the parse result.

use crate::model::fingerprint::Fingerprint;
use crate::model::note::{Note, UNKNOWN_DATE_BUCKET};
use crate::repo::graph_repo::normalize_tag;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

static DATE_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}\.\d{1,2})[[:punct:]]?$").expect("valid date heading regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").expect("valid tag regex"));
static TAG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*#\w+").expect("valid tag strip regex"));

/// Why one source line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIssue {
    /// Leading whitespace contains a tab; indentation would be ambiguous.
    TabIndentation,
    /// Line contains a control character other than a tab.
    ControlCharacter,
    /// Line bytes are not valid UTF-8.
    InvalidUtf8,
    /// Same trimmed text as an earlier line, so the same identity.
    DuplicateLine { first_line: usize },
}

impl Display for ParseIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TabIndentation => write!(f, "tab characters in indentation are not supported"),
            Self::ControlCharacter => write!(f, "line contains control characters"),
            Self::InvalidUtf8 => write!(f, "line is not valid UTF-8"),
            Self::DuplicateLine { first_line } => {
                write!(f, "duplicate of line {first_line}")
            }
        }
    }
}

/// Skipped source line, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based physical line number.
    pub source_line: usize,
    pub issue: ParseIssue,
}

impl Display for ParseWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.source_line, self.issue)
    }
}

/// Parse result for one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutline {
    /// Emitted notes in source order.
    pub notes: Vec<Note>,
    pub warnings: Vec<ParseWarning>,
}

/// Mutable context carried from one line to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    date_bucket: String,
    next_position: u32,
    seen: HashMap<Fingerprint, usize>,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            date_bucket: UNKNOWN_DATE_BUCKET.to_string(),
            next_position: 1,
            seen: HashMap::new(),
        }
    }
}

impl ParserState {
    pub fn date_bucket(&self) -> &str {
        &self.date_bucket
    }
}

/// What one line contributed to the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Blank,
    DateHeading(String),
    Note(Note),
    Skipped(ParseIssue),
}

/// Parses a full outline text.
pub fn parse_outline(source: &str) -> ParsedOutline {
    parse_outline_bytes(source.as_bytes())
}

/// Parses raw outline bytes, decoding each physical line on its own.
pub fn parse_outline_bytes(source: &[u8]) -> ParsedOutline {
    let mut state = ParserState::default();
    let mut parsed = ParsedOutline::default();

    for (index, raw_line) in physical_lines(source).into_iter().enumerate() {
        let source_line = index + 1;
        let outcome = match std::str::from_utf8(raw_line) {
            Ok(line) => parse_line(&mut state, line, source_line),
            Err(_) => LineOutcome::Skipped(ParseIssue::InvalidUtf8),
        };
        match outcome {
            LineOutcome::Note(note) => parsed.notes.push(note),
            LineOutcome::Skipped(issue) => {
                warn!(
                    "event=parse_line module=parser status=skip line={} reason={}",
                    source_line, issue
                );
                parsed.warnings.push(ParseWarning { source_line, issue });
            }
            LineOutcome::Blank | LineOutcome::DateHeading(_) => {}
        }
    }

    parsed
}

/// Splits on `\n`, `\r\n` or a lone `\r`; a trailing terminator does not
/// open an extra empty line.
fn physical_lines(source: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut index = 0;
    while index < source.len() {
        match source[index] {
            b'\n' => {
                lines.push(&source[start..index]);
                index += 1;
                start = index;
            }
            b'\r' => {
                lines.push(&source[start..index]);
                index += if source.get(index + 1) == Some(&b'\n') { 2 } else { 1 };
                start = index;
            }
            _ => index += 1,
        }
    }
    if start < source.len() {
        lines.push(&source[start..]);
    }
    lines
}

/// Parses one physical line, advancing `state`.
pub fn parse_line(state: &mut ParserState, line: &str, source_line: usize) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Blank;
    }

    let leading = &line[..line.len() - line.trim_start().len()];
    if leading.contains('\t') {
        return LineOutcome::Skipped(ParseIssue::TabIndentation);
    }
    if trimmed.chars().any(|c| c.is_control() && c != '\t') {
        return LineOutcome::Skipped(ParseIssue::ControlCharacter);
    }

    if let Some(label) = date_heading_label(trimmed) {
        state.date_bucket = label.to_string();
        return LineOutcome::DateHeading(label.to_string());
    }

    let fingerprint = Fingerprint::of_line(trimmed);
    if let Some(first_line) = state.seen.get(&fingerprint) {
        return LineOutcome::Skipped(ParseIssue::DuplicateLine {
            first_line: *first_line,
        });
    }
    state.seen.insert(fingerprint.clone(), source_line);

    let line_position = state.next_position;
    state.next_position += 1;

    LineOutcome::Note(Note {
        content: strip_tags(trimmed),
        raw_tags: extract_tags(trimmed),
        indentation: leading.chars().filter(|c| *c == ' ').count(),
        line_position,
        date_bucket: state.date_bucket.clone(),
        fingerprint,
        source_line,
    })
}

/// Returns the bucket label when `trimmed` is a bare `day.month` heading.
pub fn date_heading_label(trimmed: &str) -> Option<&str> {
    DATE_HEADING_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extracts normalized tag names in first-seen order.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in TAG_RE.captures_iter(text) {
        let Some(tag) = caps.get(1).and_then(|m| normalize_tag(m.as_str())) else {
            continue;
        };
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Removes tag tokens and the whitespace preceding them.
pub fn strip_tags(text: &str) -> String {
    TAG_STRIP_RE.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        date_heading_label, parse_outline, parse_outline_bytes, physical_lines, strip_tags,
        ParseIssue,
    };
    use crate::model::fingerprint::Fingerprint;
    use crate::model::note::UNKNOWN_DATE_BUCKET;

    #[test]
    fn parses_tags_indentation_and_positions() {
        let parsed = parse_outline("Task A #work\n  Sub A #work #Urgent\n\nTask B #home\n");
        assert!(parsed.warnings.is_empty());
        let notes = parsed.notes;
        assert_eq!(notes.len(), 3);

        assert_eq!(notes[0].content, "Task A");
        assert_eq!(notes[0].raw_tags, vec!["work".to_string()]);
        assert_eq!(notes[0].indentation, 0);
        assert_eq!(notes[0].line_position, 1);

        assert_eq!(notes[1].content, "Sub A");
        assert_eq!(
            notes[1].raw_tags,
            vec!["work".to_string(), "urgent".to_string()]
        );
        assert_eq!(notes[1].indentation, 2);
        assert_eq!(notes[1].line_position, 2);
        assert_eq!(
            notes[1].fingerprint,
            Fingerprint::of_line("Sub A #work #Urgent")
        );

        assert_eq!(notes[2].line_position, 3);
        assert_eq!(notes[2].source_line, 4);
    }

    #[test]
    fn date_headings_set_bucket_without_emitting_notes() {
        let parsed = parse_outline("before\n12.03.\nfirst\n  nested\n1.4\nsecond\n");
        let buckets: Vec<&str> = parsed
            .notes
            .iter()
            .map(|note| note.date_bucket.as_str())
            .collect();
        assert_eq!(
            buckets,
            vec![UNKNOWN_DATE_BUCKET, "12.03", "12.03", "1.4"]
        );
        let positions: Vec<u32> = parsed.notes.iter().map(|note| note.line_position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn date_heading_must_stand_alone() {
        assert_eq!(date_heading_label("12.03"), Some("12.03"));
        assert_eq!(date_heading_label("12.03:"), Some("12.03"));
        assert_eq!(date_heading_label("12.03 meeting"), None);
        assert_eq!(date_heading_label("12.03.2024"), None);
        assert_eq!(date_heading_label("123.4"), None);
    }

    #[test]
    fn blank_lines_do_not_shift_positions() {
        let compact = parse_outline("a\nb\n");
        let padded = parse_outline("\n\na\n   \n\nb\n\n");
        assert_eq!(compact.notes[1].line_position, padded.notes[1].line_position);
        assert_eq!(compact.notes[1].fingerprint, padded.notes[1].fingerprint);
    }

    #[test]
    fn tab_indented_and_duplicate_lines_are_skipped_with_warnings() {
        let parsed = parse_outline("root\n\tchild\nroot\nother\n");
        assert_eq!(parsed.notes.len(), 2);
        assert_eq!(parsed.notes[1].content, "other");
        assert_eq!(parsed.notes[1].line_position, 2);

        assert_eq!(parsed.warnings.len(), 2);
        assert_eq!(parsed.warnings[0].source_line, 2);
        assert_eq!(parsed.warnings[0].issue, ParseIssue::TabIndentation);
        assert_eq!(
            parsed.warnings[1].issue,
            ParseIssue::DuplicateLine { first_line: 1 }
        );
    }

    #[test]
    fn tag_only_line_keeps_empty_content() {
        let parsed = parse_outline("#inbox\n");
        assert_eq!(parsed.notes[0].content, "");
        assert_eq!(parsed.notes[0].raw_tags, vec!["inbox".to_string()]);
        assert_eq!(strip_tags("call #mom later #phone"), "call later");
    }

    #[test]
    fn carriage_returns_end_lines() {
        let cr_only = parse_outline("Task A #work\r  Sub A #work\rTask B #home\r");
        let lf = parse_outline("Task A #work\n  Sub A #work\nTask B #home\n");
        assert!(cr_only.warnings.is_empty());
        assert_eq!(cr_only.notes, lf.notes);

        let crlf = parse_outline("Task A #work\r\n  Sub A #work\r\n\r\nTask B #home");
        assert_eq!(crlf.notes.len(), 3);
        assert_eq!(crlf.notes[1].indentation, 2);
        assert_eq!(crlf.notes[2].source_line, 4);
    }

    #[test]
    fn physical_lines_match_terminator_rules() {
        let lines = physical_lines(b"a\r\nb\rc\n\nd");
        assert_eq!(
            lines,
            vec![&b"a"[..], &b"b"[..], &b"c"[..], &b""[..], &b"d"[..]]
        );
        assert!(physical_lines(b"").is_empty());
        assert_eq!(physical_lines(b"x\n"), vec![&b"x"[..]]);
    }

    #[test]
    fn invalid_utf8_skips_only_that_line() {
        let parsed = parse_outline_bytes(b"Task A\nbroken \xff line\nTask B\n");
        let contents: Vec<&str> = parsed.notes.iter().map(|note| note.content.as_str()).collect();
        assert_eq!(contents, vec!["Task A", "Task B"]);
        assert_eq!(parsed.notes[1].line_position, 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].source_line, 2);
        assert_eq!(parsed.warnings[0].issue, ParseIssue::InvalidUtf8);
    }
}
