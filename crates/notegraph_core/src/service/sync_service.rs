//! Incremental outline-to-graph synchronization.
//!
//! # Responsibility
//! - Run one sync: parse, diff, mutate, enrich new notes, rebuild hierarchy.
//! - Report per-run counts and carry a run id through every log line.
//!
//! # Invariants
//! - Only notes whose fingerprint is absent from the store are enriched.
//! - Existing notes only receive position/date-bucket updates.
//! - Deletions and position updates commit before any new note is written.
//! - Structural edges are rebuilt after every mutation of the run.
//! - Enrichment failures never abort a run; persistence failures always do.
//! - Provider output is cleaned before it reaches the store; a blank entity
//!   name from a provider never fails the run.
//! - Notes with no text after tag removal are stored without a provider call.

use crate::enrich::{Enricher, Enrichment};
use crate::model::fingerprint::Fingerprint;
use crate::model::graph::{NoteUpsert, OrphanSweep, PositionUpdate};
use crate::model::note::Note;
use crate::parser::outline::{parse_outline_bytes, ParseWarning, ParsedOutline};
use crate::repo::graph_repo::{GraphRepository, RepoError};
use crate::sync::diff::diff_notes;
use crate::sync::hierarchy::plan_structural_edges;
use log::{error, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub const DEFAULT_WORKERS: usize = 4;

/// Fatal sync failure.
#[derive(Debug)]
pub enum SyncError {
    /// Store read/write failed; committed work stays committed.
    Persistence(RepoError),
    /// A stored note with this fingerprint holds different content.
    IdentityConflict(Fingerprint),
}

impl SyncError {
    /// Returns whether running the same sync again is safe.
    ///
    /// Every mutation is keyed by fingerprint, so a persistence failure
    /// leaves a state the next run converges from. An identity conflict
    /// repeats until the store is repaired.
    pub fn is_safe_to_rerun(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persistence(err) => write!(f, "sync aborted by persistence failure: {err}"),
            Self::IdentityConflict(fingerprint) => write!(
                f,
                "identity conflict: stored note {fingerprint} has different content"
            ),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::IdentityConflict(_) => None,
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::IdentityConflict(fingerprint) => Self::IdentityConflict(fingerprint),
            other => Self::Persistence(other),
        }
    }
}

/// Tuning knobs for one service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Concurrent enrichment calls per chunk of new notes; clamped to >= 1.
    pub workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Outcome of one completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub run_id: String,
    pub provider: String,
    /// Notes parsed from the source.
    pub notes: usize,
    pub new: usize,
    pub existing: usize,
    pub deleted: usize,
    /// Existing notes whose position or date bucket actually changed.
    pub positions_updated: usize,
    pub enrichment_failures: usize,
    pub parse_warnings: Vec<ParseWarning>,
    pub structural_edges: usize,
    pub orphans_removed: OrphanSweep,
    pub duration_ms: u64,
}

/// One note a run would create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNote {
    pub fingerprint: Fingerprint,
    pub line_position: u32,
    pub content: String,
}

/// Dry-run result: what a sync of the same source would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub notes: usize,
    pub new: Vec<PlannedNote>,
    pub existing: usize,
    pub deleted: Vec<Fingerprint>,
    pub parse_warnings: Vec<ParseWarning>,
    pub structural_edges: usize,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty()
    }
}

/// Sync service facade over a graph store and an enrichment provider.
pub struct SyncService<R: GraphRepository, E: Enricher> {
    repo: R,
    enricher: E,
    options: SyncOptions,
}

impl<R: GraphRepository, E: Enricher> SyncService<R, E> {
    pub fn new(repo: R, enricher: E, options: SyncOptions) -> Self {
        Self {
            repo,
            enricher,
            options: SyncOptions {
                workers: options.workers.max(1),
            },
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn enricher(&self) -> &E {
        &self.enricher
    }

    /// Synchronizes the store with `source`.
    ///
    /// # Errors
    /// - [`SyncError::Persistence`] when a store operation fails.
    /// - [`SyncError::IdentityConflict`] when a fingerprint collides with
    ///   stored content.
    pub fn sync_text(&mut self, source: &str) -> Result<SyncReport, SyncError> {
        self.sync_bytes(source.as_bytes())
    }

    /// Synchronizes the store with raw file bytes. Lines that are not valid
    /// UTF-8 are skipped with a parse warning.
    ///
    /// # Errors
    /// Same as [`Self::sync_text`].
    pub fn sync_bytes(&mut self, source: &[u8]) -> Result<SyncReport, SyncError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Instant::now();
        info!(
            "event=sync_run module=sync status=start run_id={} provider={} workers={}",
            run_id,
            self.enricher.provider_id(),
            self.options.workers
        );

        match self.run(&run_id, source, started_at) {
            Ok(report) => {
                info!(
                    "event=sync_run module=sync status=ok run_id={} notes={} new={} existing={} deleted={} positions_updated={} enrichment_failures={} parse_warnings={} edges={} orphans_removed={} duration_ms={}",
                    report.run_id,
                    report.notes,
                    report.new,
                    report.existing,
                    report.deleted,
                    report.positions_updated,
                    report.enrichment_failures,
                    report.parse_warnings.len(),
                    report.structural_edges,
                    report.orphans_removed.total(),
                    report.duration_ms
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=sync_run module=sync status=error run_id={} safe_to_rerun={} duration_ms={} error={}",
                    run_id,
                    err.is_safe_to_rerun(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Parses and diffs `source` against the store without writing or
    /// enriching anything.
    pub fn plan_text(&self, source: &str) -> Result<SyncPlan, SyncError> {
        self.plan_bytes(source.as_bytes())
    }

    pub fn plan_bytes(&self, source: &[u8]) -> Result<SyncPlan, SyncError> {
        let ParsedOutline { notes, warnings } = parse_outline_bytes(source);
        let persisted = self.repo.fetch_all_fingerprints()?;
        let diff = diff_notes(&notes, &persisted);

        let new = diff
            .new
            .iter()
            .map(|note| PlannedNote {
                fingerprint: note.fingerprint.clone(),
                line_position: note.line_position,
                content: note.content.clone(),
            })
            .collect();

        Ok(SyncPlan {
            notes: notes.len(),
            new,
            existing: diff.existing.len(),
            deleted: diff.deleted.clone(),
            parse_warnings: warnings,
            structural_edges: plan_structural_edges(&notes).len(),
        })
    }

    fn run(
        &mut self,
        run_id: &str,
        source: &[u8],
        started_at: Instant,
    ) -> Result<SyncReport, SyncError> {
        let ParsedOutline { notes, warnings } = parse_outline_bytes(source);
        let persisted = self.repo.fetch_all_fingerprints()?;
        let diff = diff_notes(&notes, &persisted);
        info!(
            "event=sync_diff module=sync status=ok run_id={} notes={} new={} existing={} deleted={}",
            run_id,
            notes.len(),
            diff.new.len(),
            diff.existing.len(),
            diff.deleted.len()
        );

        let deleted = self.repo.delete_notes(&diff.deleted)?;

        let updates: Vec<PositionUpdate> = diff
            .existing
            .iter()
            .map(|note| PositionUpdate::from(*note))
            .collect();
        let positions_updated = self.repo.update_positions(&updates)?;

        let enrichment_failures = self.write_new_notes(run_id, &diff.new)?;

        let orphans_removed = self.repo.delete_orphans()?;

        let edges = plan_structural_edges(&notes);
        let structural_edges = self.repo.replace_structural_edges(&edges)?;

        Ok(SyncReport {
            run_id: run_id.to_string(),
            provider: self.enricher.provider_id().to_string(),
            notes: notes.len(),
            new: diff.new.len(),
            existing: diff.existing.len(),
            deleted,
            positions_updated,
            enrichment_failures,
            parse_warnings: warnings,
            structural_edges,
            orphans_removed,
            duration_ms: u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Enriches new notes chunk by chunk and upserts each one; returns the
    /// number of failed enrichment calls.
    fn write_new_notes(&mut self, run_id: &str, new_notes: &[&Note]) -> Result<usize, SyncError> {
        if new_notes.is_empty() {
            return Ok(0);
        }

        let pool = self.build_pool(run_id);
        let mut failures = 0;

        for chunk in new_notes.chunks(self.options.workers) {
            let enrichments = self.enrich_chunk(pool.as_ref(), run_id, chunk);
            for (note, outcome) in chunk.iter().zip(enrichments) {
                let enrichment = outcome.unwrap_or_else(|| {
                    failures += 1;
                    Enrichment::default()
                });
                let upsert = NoteUpsert::from_note(note, enrichment.summary, enrichment.entities);
                self.repo.upsert_note(&upsert)?;
            }
        }

        Ok(failures)
    }

    /// Returns one entry per note, in chunk order; `None` marks a failure.
    fn enrich_chunk(
        &self,
        pool: Option<&ThreadPool>,
        run_id: &str,
        chunk: &[&Note],
    ) -> Vec<Option<Enrichment>> {
        let enricher = &self.enricher;
        let enrich_one = |note: &&Note| enrich_note(enricher, run_id, note);
        match pool {
            Some(pool) => pool.install(|| chunk.par_iter().map(enrich_one).collect()),
            None => chunk.iter().map(enrich_one).collect(),
        }
    }

    fn build_pool(&self, run_id: &str) -> Option<ThreadPool> {
        if self.options.workers <= 1 {
            return None;
        }
        match ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .thread_name(|index| format!("notegraph-enrich-{index}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(
                    "event=enrich_pool module=sync status=error run_id={} workers={} fallback=sequential error={}",
                    run_id, self.options.workers, err
                );
                None
            }
        }
    }
}

fn enrich_note<E: Enricher>(enricher: &E, run_id: &str, note: &Note) -> Option<Enrichment> {
    if note.content.trim().is_empty() {
        info!(
            "event=enrich_note module=sync status=skipped run_id={} fingerprint={} reason=empty_content",
            run_id,
            note.fingerprint.short()
        );
        return Some(Enrichment::default());
    }

    let started_at = Instant::now();
    match enricher.enrich(&note.content) {
        Ok(enrichment) => {
            let enrichment = enrichment.cleaned();
            info!(
                "event=enrich_note module=sync status=ok run_id={} fingerprint={} entities={} duration_ms={}",
                run_id,
                note.fingerprint.short(),
                enrichment.entities.len(),
                started_at.elapsed().as_millis()
            );
            Some(enrichment)
        }
        Err(err) => {
            warn!(
                "event=enrich_note module=sync status=error run_id={} fingerprint={} line={} duration_ms={} error={}",
                run_id,
                note.fingerprint.short(),
                note.source_line,
                started_at.elapsed().as_millis(),
                err
            );
            None
        }
    }
}
