//! Domain model for outline notes and the persisted note graph.
//!
//! # Responsibility
//! - Define the ephemeral `Note` produced by parsing one source run.
//! - Define explicit, fixed-shape records for every persisted node kind.
//!
//! # Invariants
//! - Every note is identified by its content `Fingerprint` and nothing else.
//! - Position and date bucket are metadata, never identity.

pub mod fingerprint;
pub mod graph;
pub mod note;
