//! Note graph repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the persistence collaborator used by the sync service:
//!   fingerprint listing, merge-by-key upserts, batched metadata updates,
//!   batched deletes, orphan sweeps and structural edge replacement.
//! - Keep SQL details and row-shape validation inside the repository boundary.
//!
//! # Invariants
//! - `notes.fingerprint` is the only note identity; it is never rewritten.
//! - Tag/entity/date-bucket nodes are created-if-absent by name, so repeated
//!   or concurrent upserts converge on one shared node per key.
//! - Every multi-statement write runs in one `IMMEDIATE` transaction.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::fingerprint::Fingerprint;
use crate::model::graph::{
    DateBucketNode, EntityMention, EntityNode, GraphStats, NoteRecord, NoteUpsert, OrphanSweep,
    PositionUpdate, StructuralEdge, TagNode,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NOW_MS_SQL: &str = "(CAST(strftime('%s', 'now') AS INTEGER) * 1000)";

const NOTE_SELECT_SQL: &str = "SELECT
    n.fingerprint AS fingerprint,
    n.content AS content,
    n.summary AS summary,
    n.line_position AS line_position,
    d.label AS date_bucket,
    n.created_at AS created_at,
    n.updated_at AS updated_at
FROM notes n
INNER JOIN date_buckets d ON d.id = n.date_bucket_id";

const REQUIRED_TABLES: [&str; 7] = [
    "date_buckets",
    "notes",
    "tags",
    "note_tags",
    "entities",
    "note_entities",
    "note_edges",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from graph persistence operations.
#[derive(Debug)]
pub enum RepoError {
    /// Connectivity or write failure against SQLite.
    Db(DbError),
    /// Same fingerprint already stored with different content.
    IdentityConflict(Fingerprint),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Write request or persisted row fails shape validation.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::IdentityConflict(fingerprint) => write!(
                f,
                "identity conflict: fingerprint {fingerprint} is already stored with different content"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "graph repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid graph data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator for the note graph.
pub trait GraphRepository {
    /// Returns every persisted note identity.
    fn fetch_all_fingerprints(&self) -> RepoResult<HashSet<Fingerprint>>;
    /// Creates or refreshes one note with its date, tag and entity links.
    fn upsert_note(&mut self, note: &NoteUpsert) -> RepoResult<()>;
    /// Updates position/date metadata in one batch. Returns rows changed.
    fn update_positions(&mut self, updates: &[PositionUpdate]) -> RepoResult<usize>;
    /// Deletes notes and their relationships in one batch. Returns rows removed.
    fn delete_notes(&mut self, fingerprints: &[Fingerprint]) -> RepoResult<usize>;
    /// Deletes tag, entity and date nodes with no referencing note.
    fn delete_orphans(&mut self) -> RepoResult<OrphanSweep>;
    /// Deletes every structural edge. Returns edges removed.
    fn clear_structural_edges(&mut self) -> RepoResult<usize>;
    /// Creates one parent -> child structural edge.
    fn create_structural_edge(
        &mut self,
        parent: &Fingerprint,
        child: &Fingerprint,
    ) -> RepoResult<()>;
    /// Replaces the whole structural edge set. Returns edges created.
    fn replace_structural_edges(&mut self, edges: &[StructuralEdge]) -> RepoResult<usize> {
        self.clear_structural_edges()?;
        for edge in edges {
            self.create_structural_edge(&edge.parent, &edge.child)?;
        }
        Ok(edges.len())
    }
    /// Gets one note by fingerprint.
    fn get_note(&self, fingerprint: &Fingerprint) -> RepoResult<Option<NoteRecord>>;
    /// Lists notes ordered by `line_position`.
    fn list_notes(&self) -> RepoResult<Vec<NoteRecord>>;
    /// Lists structural edges ordered by parent then child.
    fn list_structural_edges(&self) -> RepoResult<Vec<StructuralEdge>>;
    /// Lists tag nodes sorted by name.
    fn list_tags(&self) -> RepoResult<Vec<TagNode>>;
    /// Lists entity nodes sorted by name.
    fn list_entities(&self) -> RepoResult<Vec<EntityNode>>;
    /// Lists date bucket nodes sorted by label.
    fn list_date_buckets(&self) -> RepoResult<Vec<DateBucketNode>>;
    /// Returns node and edge counts.
    fn graph_stats(&self) -> RepoResult<GraphStats>;
    /// Removes every note, node and edge. Returns the counts removed.
    fn clear_graph(&mut self) -> RepoResult<GraphStats>;
}

/// SQLite-backed note graph repository.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn fetch_all_fingerprints(&self) -> RepoResult<HashSet<Fingerprint>> {
        let mut stmt = self.conn.prepare("SELECT fingerprint FROM notes;")?;
        let mut rows = stmt.query([])?;
        let mut fingerprints = HashSet::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            fingerprints.insert(parse_fingerprint(&value, "notes.fingerprint")?);
        }
        Ok(fingerprints)
    }

    fn upsert_note(&mut self, note: &NoteUpsert) -> RepoResult<()> {
        validate_upsert(note)?;
        let fingerprint = note.fingerprint.as_str();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let bucket_id = ensure_date_bucket(&tx, &note.date_bucket)?;

        let changed = tx
            .execute(
                &format!(
                    "INSERT INTO notes (
                        fingerprint,
                        content,
                        summary,
                        line_position,
                        date_bucket_id
                    ) VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (fingerprint) DO UPDATE SET
                        summary = excluded.summary,
                        line_position = excluded.line_position,
                        date_bucket_id = excluded.date_bucket_id,
                        updated_at = {NOW_MS_SQL}
                    WHERE notes.content = excluded.content;"
                ),
                params![
                    fingerprint,
                    note.content.as_str(),
                    note.summary.as_str(),
                    note.line_position,
                    bucket_id,
                ],
            )
            .map_err(|err| conflict_or_db(err, &note.fingerprint))?;
        if changed == 0 {
            return Err(RepoError::IdentityConflict(note.fingerprint.clone()));
        }

        tx.execute(
            "DELETE FROM note_tags WHERE note_fingerprint = ?1;",
            [fingerprint],
        )?;
        for tag in normalize_tags(&note.tags) {
            tx.execute(
                "INSERT INTO tags (name) VALUES (?1) ON CONFLICT (name) DO NOTHING;",
                [tag.as_str()],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO note_tags (note_fingerprint, tag_id)
                 SELECT ?1, id FROM tags WHERE name = ?2;",
                params![fingerprint, tag.as_str()],
            )?;
        }

        tx.execute(
            "DELETE FROM note_entities WHERE note_fingerprint = ?1;",
            [fingerprint],
        )?;
        for entity in &note.entities {
            tx.execute(
                "INSERT INTO entities (name, entity_type) VALUES (?1, ?2)
                 ON CONFLICT (name) DO NOTHING;",
                params![entity.name.trim(), entity.entity_type.trim()],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO note_entities (note_fingerprint, entity_id)
                 SELECT ?1, id FROM entities WHERE name = ?2;",
                params![fingerprint, entity.name.trim()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_positions(&mut self, updates: &[PositionUpdate]) -> RepoResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        for update in updates {
            validate_position(update.line_position, &update.date_bucket)?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "UPDATE notes
                 SET
                    line_position = ?2,
                    date_bucket_id = ?3,
                    updated_at = {NOW_MS_SQL}
                 WHERE fingerprint = ?1
                   AND (line_position <> ?2 OR date_bucket_id <> ?3);"
            ))?;
            for update in updates {
                let bucket_id = ensure_date_bucket(&tx, &update.date_bucket)?;
                changed += stmt.execute(params![
                    update.fingerprint.as_str(),
                    update.line_position,
                    bucket_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn delete_notes(&mut self, fingerprints: &[Fingerprint]) -> RepoResult<usize> {
        if fingerprints.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM notes WHERE fingerprint = ?1;")?;
            for fingerprint in fingerprints {
                removed += stmt.execute([fingerprint.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn delete_orphans(&mut self) -> RepoResult<OrphanSweep> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sweep = OrphanSweep {
            tags: tx.execute(
                "DELETE FROM tags
                 WHERE NOT EXISTS (
                    SELECT 1 FROM note_tags nt WHERE nt.tag_id = tags.id
                 );",
                [],
            )?,
            entities: tx.execute(
                "DELETE FROM entities
                 WHERE NOT EXISTS (
                    SELECT 1 FROM note_entities ne WHERE ne.entity_id = entities.id
                 );",
                [],
            )?,
            date_buckets: tx.execute(
                "DELETE FROM date_buckets
                 WHERE NOT EXISTS (
                    SELECT 1 FROM notes n WHERE n.date_bucket_id = date_buckets.id
                 );",
                [],
            )?,
        };
        tx.commit()?;
        Ok(sweep)
    }

    fn clear_structural_edges(&mut self) -> RepoResult<usize> {
        Ok(self.conn.execute("DELETE FROM note_edges;", [])?)
    }

    fn create_structural_edge(
        &mut self,
        parent: &Fingerprint,
        child: &Fingerprint,
    ) -> RepoResult<()> {
        insert_edge(self.conn, parent, child)
    }

    fn replace_structural_edges(&mut self, edges: &[StructuralEdge]) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM note_edges;", [])?;
        for edge in edges {
            insert_edge(&tx, &edge.parent, &edge.child)?;
        }
        tx.commit()?;
        Ok(edges.len())
    }

    fn get_note(&self, fingerprint: &Fingerprint) -> RepoResult<Option<NoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE n.fingerprint = ?1;"))?;
        let mut rows = stmt.query([fingerprint.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_notes(&self) -> RepoResult<Vec<NoteRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} ORDER BY n.line_position ASC, n.fingerprint ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(self.conn, row)?);
        }
        Ok(notes)
    }

    fn list_structural_edges(&self) -> RepoResult<Vec<StructuralEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT parent_fingerprint, child_fingerprint
             FROM note_edges
             ORDER BY parent_fingerprint ASC, child_fingerprint ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            let parent: String = row.get(0)?;
            let child: String = row.get(1)?;
            edges.push(StructuralEdge {
                parent: parse_fingerprint(&parent, "note_edges.parent_fingerprint")?,
                child: parse_fingerprint(&child, "note_edges.child_fingerprint")?,
            });
        }
        Ok(edges)
    }

    fn list_tags(&self) -> RepoResult<Vec<TagNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name AS name, COUNT(nt.note_fingerprint) AS note_count
             FROM tags t
             LEFT JOIN note_tags nt ON nt.tag_id = t.id
             GROUP BY t.id
             ORDER BY t.name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(TagNode {
                name: row.get("name")?,
                note_count: parse_count(row, "note_count")?,
            });
        }
        Ok(tags)
    }

    fn list_entities(&self) -> RepoResult<Vec<EntityNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                e.name AS name,
                e.entity_type AS entity_type,
                COUNT(ne.note_fingerprint) AS note_count
             FROM entities e
             LEFT JOIN note_entities ne ON ne.entity_id = e.id
             GROUP BY e.id
             ORDER BY e.name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(EntityNode {
                name: row.get("name")?,
                entity_type: row.get("entity_type")?,
                note_count: parse_count(row, "note_count")?,
            });
        }
        Ok(entities)
    }

    fn list_date_buckets(&self) -> RepoResult<Vec<DateBucketNode>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.label AS label, COUNT(n.fingerprint) AS note_count
             FROM date_buckets d
             LEFT JOIN notes n ON n.date_bucket_id = d.id
             GROUP BY d.id
             ORDER BY d.label ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut buckets = Vec::new();
        while let Some(row) = rows.next()? {
            buckets.push(DateBucketNode {
                label: row.get("label")?,
                note_count: parse_count(row, "note_count")?,
            });
        }
        Ok(buckets)
    }

    fn graph_stats(&self) -> RepoResult<GraphStats> {
        load_graph_stats(self.conn)
    }

    fn clear_graph(&mut self) -> RepoResult<GraphStats> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = load_graph_stats(&tx)?;
        tx.execute_batch(
            "DELETE FROM note_edges;
             DELETE FROM note_entities;
             DELETE FROM note_tags;
             DELETE FROM notes;
             DELETE FROM entities;
             DELETE FROM tags;
             DELETE FROM date_buckets;",
        )?;
        tx.commit()?;
        Ok(removed)
    }
}

/// Normalizes one tag value: trimmed, lowercase, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}

fn validate_upsert(note: &NoteUpsert) -> RepoResult<()> {
    validate_position(note.line_position, &note.date_bucket)?;
    if let Some(entity) = note
        .entities
        .iter()
        .find(|entity| entity.name.trim().is_empty())
    {
        return Err(RepoError::InvalidData(format!(
            "entity mention with blank name (type `{}`) for note {}",
            entity.entity_type,
            note.fingerprint.short()
        )));
    }
    Ok(())
}

fn validate_position(line_position: u32, date_bucket: &str) -> RepoResult<()> {
    if line_position == 0 {
        return Err(RepoError::InvalidData(
            "line_position must be 1-based".to_string(),
        ));
    }
    if date_bucket.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "date bucket label must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn ensure_date_bucket(tx: &Transaction<'_>, label: &str) -> RepoResult<i64> {
    tx.execute(
        "INSERT INTO date_buckets (label) VALUES (?1) ON CONFLICT (label) DO NOTHING;",
        [label],
    )?;
    let id = tx.query_row(
        "SELECT id FROM date_buckets WHERE label = ?1;",
        [label],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn insert_edge(conn: &Connection, parent: &Fingerprint, child: &Fingerprint) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO note_edges (parent_fingerprint, child_fingerprint)
         VALUES (?1, ?2);",
        params![parent.as_str(), child.as_str()],
    )?;
    Ok(())
}

fn conflict_or_db(err: rusqlite::Error, fingerprint: &Fingerprint) -> RepoError {
    let err = DbError::Sqlite(err);
    if err.is_unique_violation() {
        RepoError::IdentityConflict(fingerprint.clone())
    } else {
        RepoError::Db(err)
    }
}

fn load_graph_stats(conn: &Connection) -> RepoResult<GraphStats> {
    let count = |table: &str| -> RepoResult<u64> {
        let value: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            row.get(0)
        })?;
        u64::try_from(value)
            .map_err(|_| RepoError::InvalidData(format!("negative row count in `{table}`")))
    };

    Ok(GraphStats {
        notes: count("notes")?,
        tags: count("tags")?,
        entities: count("entities")?,
        date_buckets: count("date_buckets")?,
        structural_edges: count("note_edges")?,
    })
}

fn parse_note_row(conn: &Connection, row: &Row<'_>) -> RepoResult<NoteRecord> {
    let fingerprint_text: String = row.get("fingerprint")?;
    let fingerprint = parse_fingerprint(&fingerprint_text, "notes.fingerprint")?;

    let raw_position: i64 = row.get("line_position")?;
    let line_position = u32::try_from(raw_position)
        .ok()
        .filter(|value| *value >= 1)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid line_position `{raw_position}` in notes.line_position"
            ))
        })?;

    Ok(NoteRecord {
        tags: load_tags_for_note(conn, &fingerprint_text)?,
        entities: load_entities_for_note(conn, &fingerprint_text)?,
        fingerprint,
        content: row.get("content")?,
        summary: row.get("summary")?,
        line_position,
        date_bucket: row.get("date_bucket")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_fingerprint(value: &str, column: &str) -> RepoResult<Fingerprint> {
    value
        .parse()
        .map_err(|_| RepoError::InvalidData(format!("invalid fingerprint `{value}` in {column}")))
}

fn parse_count(row: &Row<'_>, column: &str) -> RepoResult<u64> {
    let value: i64 = row.get(column)?;
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid count `{value}` in {column}")))
}

fn load_tags_for_note(conn: &Connection, fingerprint: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name
         FROM note_tags nt
         INNER JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_fingerprint = ?1
         ORDER BY t.name ASC;",
    )?;
    let mut rows = stmt.query([fingerprint])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(row.get(0)?);
    }
    Ok(tags)
}

fn load_entities_for_note(conn: &Connection, fingerprint: &str) -> RepoResult<Vec<EntityMention>> {
    let mut stmt = conn.prepare_cached(
        "SELECT e.name, e.entity_type
         FROM note_entities ne
         INNER JOIN entities e ON e.id = ne.entity_id
         WHERE ne.note_fingerprint = ?1
         ORDER BY e.name ASC;",
    )?;
    let mut rows = stmt.query([fingerprint])?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(EntityMention {
            name: row.get(0)?,
            entity_type: row.get(1)?,
        });
    }
    Ok(entities)
}

fn ensure_graph_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{normalize_tag, normalize_tags};

    #[test]
    fn normalize_tags_lowercases_and_deduplicates() {
        let tags = vec![
            "Work".to_string(),
            " work ".to_string(),
            "  ".to_string(),
            "Home".to_string(),
        ];
        assert_eq!(
            normalize_tags(&tags),
            vec!["home".to_string(), "work".to_string()]
        );
        assert_eq!(normalize_tag("   "), None);
    }
}
