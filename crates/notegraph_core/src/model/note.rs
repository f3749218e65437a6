//! Ephemeral note records derived from one outline source.

use crate::model::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};

/// Date bucket label used before the first date heading.
pub const UNKNOWN_DATE_BUCKET: &str = "unknown";

/// One emitted outline line.
///
/// Rebuilt from source text on every run; never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Line text with tag tokens removed and trimmed.
    pub content: String,
    /// Lowercase tag names in first-seen order, without duplicates.
    pub raw_tags: Vec<String>,
    /// Count of leading space characters.
    pub indentation: usize,
    /// 1-based ordinal among emitted notes.
    pub line_position: u32,
    /// Label of the most recent date heading, or [`UNKNOWN_DATE_BUCKET`].
    pub date_bucket: String,
    /// Identity of the trimmed raw line.
    pub fingerprint: Fingerprint,
    /// 1-based physical line in the source. Diagnostics only.
    pub source_line: usize,
}
