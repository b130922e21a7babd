//! crates/localdb/src/store.rs
//!
//! Schema and row-level operations.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use history::NodeHistory;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::DbError;
use crate::DbResult;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS root_folder (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS stored_node_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    root_folder_id INTEGER NOT NULL
        REFERENCES root_folder(id) ON DELETE CASCADE,
    data TEXT NOT NULL,
    local_modified_time INTEGER NOT NULL,
    local_created_time INTEGER NOT NULL,
    remote_history_etag TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stored_node_history_key
    ON stored_node_history(key);
CREATE UNIQUE INDEX IF NOT EXISTS idx_stored_node_history_root_key
    ON stored_node_history(root_folder_id, key);
";

/// A registered sync root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootFolderRow {
    /// Row id, referenced by stored histories.
    pub id: i64,
    /// Absolute path of the root folder.
    pub path: String,
}

/// The last-synced state of one file under one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredHistory {
    /// File key (`hash_path` of the root-relative path).
    pub key: String,
    /// Owning root folder row.
    pub root_folder_id: i64,
    /// History document as of the last successful sync.
    pub data: NodeHistory,
    /// Local mtime observed at that sync, integer seconds.
    pub local_modified_time: i64,
    /// Local ctime observed at that sync, integer seconds.
    pub local_created_time: i64,
    /// ETag of the remote history blob observed at that sync.
    pub remote_history_etag: String,
}

/// Handle to the sync-state database.
///
/// The worker is single-threaded; the mutex only exists so the handle can be
/// shared through the session without `unsafe` plumbing.
#[derive(Clone)]
pub struct LocalDb {
    conn: Arc<Mutex<Connection>>,
}

impl LocalDb {
    /// Opens (and if needed creates) the database at `path`.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens a private in-memory database, used by tests.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Returns the root-folder row for `path`, creating it on first use.
    pub fn root_for_path(&self, path: &str) -> DbResult<RootFolderRow> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO root_folder (path) VALUES (?1)",
            params![path],
        )?;
        let id = conn.query_row(
            "SELECT id FROM root_folder WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(RootFolderRow {
            id,
            path: path.to_owned(),
        })
    }

    /// Fetches the stored history for `(root, key)`, if any.
    pub fn get(&self, root_id: i64, key: &str) -> DbResult<Option<StoredHistory>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT key, root_folder_id, data, local_modified_time,
                    local_created_time, remote_history_etag
             FROM stored_node_history
             WHERE root_folder_id = ?1 AND key = ?2",
            params![root_id, key],
            row_to_stored,
        )
        .optional()?
        .transpose()
    }

    /// Inserts or replaces the row for `(root, key)`.
    pub fn upsert(&self, row: &StoredHistory) -> DbResult<()> {
        let data = serde_json::to_string(&row.data).map_err(DbError::Serialise)?;
        self.conn().execute(
            "INSERT INTO stored_node_history
                 (key, root_folder_id, data, local_modified_time,
                  local_created_time, remote_history_etag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(root_folder_id, key) DO UPDATE SET
                 data = excluded.data,
                 local_modified_time = excluded.local_modified_time,
                 local_created_time = excluded.local_created_time,
                 remote_history_etag = excluded.remote_history_etag",
            params![
                row.key,
                row.root_folder_id,
                data,
                row.local_modified_time,
                row.local_created_time,
                row.remote_history_etag,
            ],
        )?;
        Ok(())
    }

    /// Deletes the row for `(root, key)`. Deleting an absent row is a no-op.
    pub fn delete(&self, root_id: i64, key: &str) -> DbResult<()> {
        self.conn().execute(
            "DELETE FROM stored_node_history WHERE root_folder_id = ?1 AND key = ?2",
            params![root_id, key],
        )?;
        Ok(())
    }

    /// Returns every stored history under `root`, ordered by file key.
    pub fn list_by_root(&self, root_id: i64) -> DbResult<Vec<StoredHistory>> {
        let conn = self.conn();
        let mut statement = conn.prepare(
            "SELECT key, root_folder_id, data, local_modified_time,
                    local_created_time, remote_history_etag
             FROM stored_node_history
             WHERE root_folder_id = ?1
             ORDER BY key",
        )?;
        let rows = statement.query_map(params![root_id], row_to_stored)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row??);
        }
        Ok(result)
    }
}

type StoredRowResult = Result<DbResult<StoredHistory>, rusqlite::Error>;

fn row_to_stored(row: &rusqlite::Row<'_>) -> StoredRowResult {
    let key: String = row.get(0)?;
    let root_folder_id: i64 = row.get(1)?;
    let data: String = row.get(2)?;
    let local_modified_time: i64 = row.get(3)?;
    let local_created_time: i64 = row.get(4)?;
    let remote_history_etag: String = row.get(5)?;

    Ok(match serde_json::from_str(&data) {
        Ok(data) => Ok(StoredHistory {
            key,
            root_folder_id,
            data,
            local_modified_time,
            local_created_time,
            remote_history_etag,
        }),
        Err(source) => Err(DbError::CorruptHistory { key, source }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use history::{NodeHistory, NodeHistoryEntry};

    fn sample_history(path: &str) -> NodeHistory {
        NodeHistory::create(
            path,
            vec![NodeHistoryEntry::create_base_only(
                NodeHistoryEntry::generate_key(),
                "etag".into(),
                "version-1".into(),
                1024,
            )],
        )
    }

    fn sample_row(root_id: i64, path: &str) -> StoredHistory {
        let data = sample_history(path);
        StoredHistory {
            key: data.key.clone(),
            root_folder_id: root_id,
            data,
            local_modified_time: 1_700_000_000,
            local_created_time: 1_600_000_000,
            remote_history_etag: "remote-etag-1".into(),
        }
    }

    #[test]
    fn root_for_path_is_get_or_create() {
        let db = LocalDb::open_in_memory().expect("open");
        let first = db.root_for_path("/sync/root").expect("create");
        let second = db.root_for_path("/sync/root").expect("fetch");
        assert_eq!(first, second);

        let other = db.root_for_path("/other/root").expect("create other");
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let db = LocalDb::open_in_memory().expect("open");
        let root = db.root_for_path("/root").expect("root");
        let row = sample_row(root.id, "a/b.txt");

        db.upsert(&row).expect("insert");
        let fetched = db.get(root.id, &row.key).expect("get").expect("present");
        assert_eq!(fetched, row);
    }

    #[test]
    fn upsert_replaces_the_existing_row() {
        let db = LocalDb::open_in_memory().expect("open");
        let root = db.root_for_path("/root").expect("root");
        let mut row = sample_row(root.id, "a/b.txt");
        db.upsert(&row).expect("insert");

        row.local_modified_time += 5;
        row.remote_history_etag = "remote-etag-2".into();
        db.upsert(&row).expect("update");

        let fetched = db.get(root.id, &row.key).expect("get").expect("present");
        assert_eq!(fetched.remote_history_etag, "remote-etag-2");
        assert_eq!(
            db.list_by_root(root.id).expect("list").len(),
            1,
            "upsert must not duplicate rows"
        );
    }

    #[test]
    fn delete_removes_the_row() {
        let db = LocalDb::open_in_memory().expect("open");
        let root = db.root_for_path("/root").expect("root");
        let row = sample_row(root.id, "a/b.txt");
        db.upsert(&row).expect("insert");

        db.delete(root.id, &row.key).expect("delete");
        assert!(db.get(root.id, &row.key).expect("get").is_none());

        // A second delete is harmless.
        db.delete(root.id, &row.key).expect("repeat delete");
    }

    #[test]
    fn listing_is_scoped_to_the_root_and_key_ordered() {
        let db = LocalDb::open_in_memory().expect("open");
        let root_a = db.root_for_path("/a").expect("root a");
        let root_b = db.root_for_path("/b").expect("root b");

        for path in ["z.txt", "a.txt", "m/n.txt"] {
            db.upsert(&sample_row(root_a.id, path)).expect("insert");
        }
        db.upsert(&sample_row(root_b.id, "other.txt")).expect("insert");

        let listed = db.list_by_root(root_a.id).expect("list");
        assert_eq!(listed.len(), 3);
        let keys: Vec<&str> = listed.iter().map(|r| r.key.as_str()).collect();
        let sorted = {
            let mut copy = keys.clone();
            copy.sort_unstable();
            copy
        };
        assert_eq!(keys, sorted, "rows must come back key-ordered");
    }

    #[test]
    fn rows_cascade_when_the_root_is_deleted() {
        let db = LocalDb::open_in_memory().expect("open");
        let root = db.root_for_path("/root").expect("root");
        db.upsert(&sample_row(root.id, "a.txt")).expect("insert");

        db.conn()
            .execute("DELETE FROM root_folder WHERE id = ?1", params![root.id])
            .expect("delete root");
        assert!(db.list_by_root(root.id).expect("list").is_empty());
    }
}
