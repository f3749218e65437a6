use notegraph_core::db::migrations::latest_version;
use notegraph_core::db::{open_db, open_db_in_memory, open_db_read_only, DbError};
use notegraph_core::repo::graph_repo::{RepoError, SqliteGraphRepository};
use rusqlite::Connection;

const GRAPH_TABLES: [&str; 7] = [
    "date_buckets",
    "notes",
    "tags",
    "note_tags",
    "entities",
    "note_entities",
    "note_edges",
];

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in GRAPH_TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notegraph.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "notes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    let err = SqliteGraphRepository::try_new(&mut conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn read_only_open_never_creates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.sqlite3");

    let err = open_db_read_only(&path).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
    assert!(!path.exists());
}

#[test]
fn read_only_open_reads_but_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notegraph.sqlite3");
    drop(open_db(&path).unwrap());

    let mut conn = open_db_read_only(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert!(SqliteGraphRepository::try_new(&mut conn).is_ok());
    assert!(conn
        .execute("INSERT INTO tags (name) VALUES ('inbox');", [])
        .is_err());
}

#[test]
fn read_only_open_leaves_unmigrated_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE marker (id INTEGER);").unwrap();
    drop(conn);

    let mut conn = open_db_read_only(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
    assert!(matches!(
        SqliteGraphRepository::try_new(&mut conn).err().unwrap(),
        RepoError::UninitializedConnection { .. }
    ));
}

#[test]
fn read_only_open_rejects_newer_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    assert!(matches!(
        open_db_read_only(&path).unwrap_err(),
        DbError::UnsupportedSchemaVersion { db_version: 999, .. }
    ));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
