//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate parser, diff, enrichment and repository calls into runs.
//! - Keep the CLI decoupled from storage details.

pub mod graph_service;
pub mod sync_service;
