//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence contract the sync engine mutates through.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Only the sync service writes through `GraphRepository`.
//! - Repository APIs return semantic errors (`IdentityConflict`) in addition
//!   to DB transport errors.

pub mod graph_repo;
