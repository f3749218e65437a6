//! Three-way diff between source notes and persisted fingerprints.
//!
//! # Invariants
//! - `new`, `existing` and `deleted` are pairwise disjoint.
//! - `new` and `existing` keep source order; `deleted` is sorted.
//! - Runs in O(n + m) using hash-set lookups.

use crate::model::fingerprint::Fingerprint;
use crate::model::note::Note;
use std::collections::HashSet;

/// Partition of one run's notes against the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDiff<'a> {
    /// In source, absent in store. Only these are enriched.
    pub new: Vec<&'a Note>,
    /// In both. Metadata-only updates.
    pub existing: Vec<&'a Note>,
    /// In store, absent in source.
    pub deleted: Vec<Fingerprint>,
}

impl SyncDiff<'_> {
    pub fn is_noop(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty()
    }
}

/// Compares `notes` against the fingerprints already persisted.
pub fn diff_notes<'a>(notes: &'a [Note], persisted: &HashSet<Fingerprint>) -> SyncDiff<'a> {
    let mut diff = SyncDiff::default();
    let mut current: HashSet<&Fingerprint> = HashSet::with_capacity(notes.len());

    for note in notes {
        current.insert(&note.fingerprint);
        if persisted.contains(&note.fingerprint) {
            diff.existing.push(note);
        } else {
            diff.new.push(note);
        }
    }

    diff.deleted = persisted
        .iter()
        .filter(|fingerprint| !current.contains(fingerprint))
        .cloned()
        .collect();
    diff.deleted.sort();
    diff
}

#[cfg(test)]
mod tests {
    use super::diff_notes;
    use crate::model::fingerprint::Fingerprint;
    use crate::parser::outline::parse_outline;
    use std::collections::HashSet;

    #[test]
    fn partitions_new_existing_and_deleted() {
        let parsed = parse_outline("keep one\nfresh\nkeep two\n");
        let persisted: HashSet<Fingerprint> = ["keep one", "keep two", "gone"]
            .iter()
            .map(|line| Fingerprint::of_line(line))
            .collect();

        let diff = diff_notes(&parsed.notes, &persisted);
        let new: Vec<&str> = diff.new.iter().map(|note| note.content.as_str()).collect();
        let existing: Vec<&str> = diff
            .existing
            .iter()
            .map(|note| note.content.as_str())
            .collect();
        assert_eq!(new, vec!["fresh"]);
        assert_eq!(existing, vec!["keep one", "keep two"]);
        assert_eq!(diff.deleted, vec![Fingerprint::of_line("gone")]);
        assert!(!diff.is_noop());
    }

    #[test]
    fn reordering_and_reindenting_keeps_notes_existing() {
        let first = parse_outline("a\n  b\nc\n");
        let persisted: HashSet<Fingerprint> = first
            .notes
            .iter()
            .map(|note| note.fingerprint.clone())
            .collect();

        let second = parse_outline("c\n\n    b\na\n");
        let diff = diff_notes(&second.notes, &persisted);
        assert!(diff.new.is_empty());
        assert!(diff.deleted.is_empty());
        assert_eq!(diff.existing.len(), 3);
        assert!(diff.is_noop());
    }

    #[test]
    fn empty_store_marks_everything_new() {
        let parsed = parse_outline("x\ny\n");
        let diff = diff_notes(&parsed.notes, &HashSet::new());
        assert_eq!(diff.new.len(), 2);
        assert!(diff.existing.is_empty());
        assert!(diff.deleted.is_empty());
    }
}
