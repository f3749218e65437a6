//! Read-side and maintenance use-cases over the note graph.

use crate::model::graph::{
    DateBucketNode, EntityNode, GraphStats, NoteRecord, StructuralEdge, TagNode,
};
use crate::repo::graph_repo::{GraphRepository, RepoResult};
use log::info;

/// Graph query facade over repository implementations.
pub struct GraphService<R: GraphRepository> {
    repo: R,
}

impl<R: GraphRepository> GraphService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn stats(&self) -> RepoResult<GraphStats> {
        self.repo.graph_stats()
    }

    /// Tag nodes ordered by reference count, then name.
    pub fn tags(&self) -> RepoResult<Vec<TagNode>> {
        let mut tags = self.repo.list_tags()?;
        tags.sort_by(|left, right| {
            right
                .note_count
                .cmp(&left.note_count)
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(tags)
    }

    pub fn entities(&self) -> RepoResult<Vec<EntityNode>> {
        self.repo.list_entities()
    }

    pub fn date_buckets(&self) -> RepoResult<Vec<DateBucketNode>> {
        self.repo.list_date_buckets()
    }

    pub fn notes(&self) -> RepoResult<Vec<NoteRecord>> {
        self.repo.list_notes()
    }

    pub fn structural_edges(&self) -> RepoResult<Vec<StructuralEdge>> {
        self.repo.list_structural_edges()
    }

    /// Removes every note, node and edge; returns what was removed.
    pub fn clear(&mut self) -> RepoResult<GraphStats> {
        let removed = self.repo.clear_graph()?;
        info!(
            "event=graph_clear module=service status=ok notes={} tags={} entities={} date_buckets={} edges={}",
            removed.notes,
            removed.tags,
            removed.entities,
            removed.date_buckets,
            removed.structural_edges
        );
        Ok(removed)
    }
}
