//! Incremental synchronization building blocks.
//!
//! # Responsibility
//! - Partition the current notes against persisted identities (`diff`).
//! - Plan structural edges from indentation (`hierarchy`).
//!
//! Both modules are pure; all storage effects live in `service::sync_service`.

pub mod diff;
pub mod hierarchy;
