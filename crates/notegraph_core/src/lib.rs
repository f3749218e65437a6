//! Core domain logic for notegraph.
//! Turns an indented plain-text outline into a persistent, enriched note
//! graph and keeps it in sync incrementally.

pub mod config;
pub mod db;
pub mod enrich;
pub mod logging;
pub mod model;
pub mod parser;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{AppConfig, ConfigError, EnrichmentConfig, ProviderKind};
pub use db::{open_db, open_db_in_memory, open_db_read_only, DbError, DbResult};
pub use enrich::{build_enricher, DisabledEnricher, Enricher, Enrichment, EnrichmentError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::fingerprint::Fingerprint;
pub use model::graph::{EntityMention, GraphStats, NoteRecord, StructuralEdge};
pub use model::note::Note;
pub use parser::outline::{parse_outline, parse_outline_bytes, ParseWarning, ParsedOutline};
pub use repo::graph_repo::{GraphRepository, RepoError, RepoResult, SqliteGraphRepository};
pub use service::graph_service::GraphService;
pub use service::sync_service::{SyncError, SyncOptions, SyncPlan, SyncReport, SyncService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
