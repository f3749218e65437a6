//! Persisted graph node and edge records.
//!
//! # Responsibility
//! - Give every stored node kind an explicit, fixed field set.
//! - Carry write requests (`NoteUpsert`, `PositionUpdate`) into the store.
//!
//! # Invariants
//! - Tag, entity and date-bucket nodes are shared and keyed by name/label.
//! - Structural edges always point parent -> child between stored notes.

use crate::model::fingerprint::Fingerprint;
use crate::model::note::Note;
use serde::{Deserialize, Serialize};

/// Entity extracted from a note by the enrichment provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMention {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

impl EntityMention {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Durable note read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteRecord {
    pub fingerprint: Fingerprint,
    pub content: String,
    /// Empty when enrichment failed or is disabled.
    pub summary: String,
    pub line_position: u32,
    pub date_bucket: String,
    /// Sorted tag names.
    pub tags: Vec<String>,
    /// Entity links sorted by name.
    pub entities: Vec<EntityMention>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Shared tag node with its reference count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagNode {
    pub name: String,
    pub note_count: u64,
}

/// Shared entity node with its reference count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityNode {
    pub name: String,
    pub entity_type: String,
    pub note_count: u64,
}

/// Shared date bucket node with its reference count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateBucketNode {
    pub label: String,
    pub note_count: u64,
}

/// Derived parent -> child relation from indentation nesting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StructuralEdge {
    pub parent: Fingerprint,
    pub child: Fingerprint,
}

/// Node and edge counts of the whole graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub notes: u64,
    pub tags: u64,
    pub entities: u64,
    pub date_buckets: u64,
    pub structural_edges: u64,
}

/// Counts of shared nodes removed by one orphan sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrphanSweep {
    pub tags: usize,
    pub entities: usize,
    pub date_buckets: usize,
}

impl OrphanSweep {
    pub fn total(&self) -> usize {
        self.tags + self.entities + self.date_buckets
    }
}

/// Full write request for a newly seen note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteUpsert {
    pub fingerprint: Fingerprint,
    pub content: String,
    pub summary: String,
    pub line_position: u32,
    pub date_bucket: String,
    pub tags: Vec<String>,
    pub entities: Vec<EntityMention>,
}

impl NoteUpsert {
    /// Builds the upsert for `note` from its enrichment output.
    pub fn from_note(note: &Note, summary: String, entities: Vec<EntityMention>) -> Self {
        Self {
            fingerprint: note.fingerprint.clone(),
            content: note.content.clone(),
            summary,
            line_position: note.line_position,
            date_bucket: note.date_bucket.clone(),
            tags: note.raw_tags.clone(),
            entities,
        }
    }
}

/// Metadata-only update for a note that already exists in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    pub fingerprint: Fingerprint,
    pub line_position: u32,
    pub date_bucket: String,
}

impl From<&Note> for PositionUpdate {
    fn from(note: &Note) -> Self {
        Self {
            fingerprint: note.fingerprint.clone(),
            line_position: note.line_position,
            date_bucket: note.date_bucket.clone(),
        }
    }
}
