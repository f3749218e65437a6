//! Graph schema migrations tracked through `PRAGMA user_version`.
//!
//! # Responsibility
//! - Register the named schema steps of the note graph.
//! - Report where an opened database stands relative to this binary.
//! - Apply pending steps one at a time.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly 1.
//! - Each step commits together with its `user_version` bump, so an
//!   interrupted upgrade resumes at the first step that did not commit.
//! - A database newer than [`latest_version`] is never touched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

/// One named schema step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "notes_tags",
        sql: include_str!("0001_notes_tags.sql"),
    },
    Migration {
        version: 2,
        name: "entities",
        sql: include_str!("0002_entities.sql"),
    },
    Migration {
        version: 3,
        name: "structural_edges",
        sql: include_str!("0003_structural_edges.sql"),
    },
];

/// Schema position of one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub db_version: u32,
    pub latest: u32,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.db_version == self.latest
    }

    /// Steps this database still needs, in apply order.
    pub fn pending(&self) -> impl Iterator<Item = &'static Migration> {
        let db_version = self.db_version;
        MIGRATIONS
            .iter()
            .filter(move |migration| migration.version > db_version)
    }
}

/// Returns every registered step, oldest first.
pub fn migrations() -> &'static [Migration] {
    MIGRATIONS
}

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Reads the database version without writing anything.
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the database was written by
///   a newer binary.
pub fn schema_status(conn: &Connection) -> DbResult<SchemaStatus> {
    let db_version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = latest_version();
    if db_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported: latest,
        });
    }
    Ok(SchemaStatus { db_version, latest })
}

/// Applies all pending migrations; returns the number of steps applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let status = schema_status(conn)?;
    let mut applied = 0;

    for migration in status.pending() {
        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        applied += 1;

        info!(
            "event=db_migrate module=db status=ok version={} name={} duration_ms={}",
            migration.version,
            migration.name,
            started_at.elapsed().as_millis()
        );
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, migrations, schema_status};
    use rusqlite::Connection;
    use std::collections::HashSet;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in migrations().iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1);
        }
        assert_eq!(latest_version() as usize, migrations().len());
    }

    #[test]
    fn names_are_unique_and_not_blank() {
        let mut seen = HashSet::new();
        for migration in migrations() {
            assert!(!migration.name.trim().is_empty());
            assert!(seen.insert(migration.name), "duplicate {}", migration.name);
        }
    }

    #[test]
    fn fresh_database_needs_every_step() {
        let conn = Connection::open_in_memory().unwrap();
        let status = schema_status(&conn).unwrap();
        assert_eq!(status.db_version, 0);
        assert!(!status.is_current());
        assert_eq!(status.pending().count(), migrations().len());
    }

    #[test]
    fn partially_migrated_database_resumes_at_next_step() {
        let mut conn = Connection::open_in_memory().unwrap();
        let first = &migrations()[0];
        conn.execute_batch(first.sql).unwrap();
        conn.pragma_update(None, "user_version", first.version).unwrap();

        let status = schema_status(&conn).unwrap();
        let pending: Vec<u32> = status.pending().map(|migration| migration.version).collect();
        assert_eq!(pending, vec![2, 3]);

        assert_eq!(apply_migrations(&mut conn).unwrap(), 2);
        assert!(schema_status(&conn).unwrap().is_current());
        assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
    }
}
