//! Outline source parsing.
//!
//! # Responsibility
//! - Turn raw outline text into ordered `Note` records.
//! - Report skipped lines as warnings instead of failing the run.

pub mod outline;
