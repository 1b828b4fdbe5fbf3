//! Script storage: scripts + script_lines.
//!
//! Every script gets a TTL stamp at insert time; [`ScriptStore::purge_expired`]
//! sweeps anything past it. One SQLite file, one connection per operation,
//! safe to share behind an `Arc` across blocking tasks.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

/// One row in the `scripts` table, with the cast list already decoded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScriptRow {
    pub id: String,
    pub title: Option<String>,
    pub line_count: usize,
    pub characters: Vec<String>,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Storage for ingested scripts and their line lists.
pub struct ScriptStore {
    db_path: PathBuf,
}

impl ScriptStore {
    /// Open or create the DB and ensure the script tables exist.
    pub fn new(db_path: PathBuf) -> Result<Self, rusqlite::Error> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    /// Default path: OFFBOOK_STORAGE_PATH or ./data, then offbook/scripts.sqlite.
    pub fn default_path() -> PathBuf {
        let base = std::env::var("OFFBOOK_STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());
        PathBuf::from(base).join("offbook").join("scripts.sqlite")
    }

    /// Open storage at the default path.
    pub fn open_default() -> Result<Self, rusqlite::Error> {
        Self::new(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        let _ = conn.pragma_update(None, "foreign_keys", "ON");
        Ok(conn)
    }

    fn init(&self) -> Result<(), rusqlite::Error> {
        if let Some(parent) = self.db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.open()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS scripts (
                id TEXT PRIMARY KEY,
                title TEXT NULL,
                line_count INTEGER NOT NULL,
                characters_json TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_scripts_expires_at ON scripts(expires_at_ms);

            CREATE TABLE IF NOT EXISTS script_lines (
                script_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                PRIMARY KEY (script_id, position),
                FOREIGN KEY(script_id) REFERENCES scripts(id) ON DELETE CASCADE
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert a parsed script and return its row. `ttl_ms` is added to the
    /// insert timestamp to stamp the expiry.
    pub fn insert_script(
        &self,
        title: Option<&str>,
        lines: &[String],
        characters: &[String],
        ttl_ms: i64,
    ) -> Result<ScriptRow, rusqlite::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let ts = now_ms();
        let expires = ts + ttl_ms;
        let characters_json =
            serde_json::to_string(characters).unwrap_or_else(|_| "[]".to_string());

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO scripts (id, title, line_count, characters_json, created_at_ms, expires_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![id, title, lines.len() as i64, characters_json, ts, expires],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO script_lines (script_id, position, text) VALUES (?1, ?2, ?3)",
            )?;
            for (position, text) in lines.iter().enumerate() {
                stmt.execute(params![id, position as i64, text])?;
            }
        }
        tx.commit()?;

        Ok(ScriptRow {
            id,
            title: title.map(String::from),
            line_count: lines.len(),
            characters: characters.to_vec(),
            created_at_ms: ts,
            expires_at_ms: expires,
        })
    }

    /// Get script metadata by id.
    pub fn get_script(&self, script_id: &str) -> Result<Option<ScriptRow>, rusqlite::Error> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT id, title, line_count, characters_json, created_at_ms, expires_at_ms
                 FROM scripts WHERE id = ?1",
                params![script_id],
                |r| {
                    let line_count: i64 = r.get(2)?;
                    let characters_json: String = r.get(3)?;
                    Ok(ScriptRow {
                        id: r.get(0)?,
                        title: r.get(1)?,
                        line_count: line_count as usize,
                        characters: serde_json::from_str(&characters_json).unwrap_or_default(),
                        created_at_ms: r.get(4)?,
                        expires_at_ms: r.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Get the full line list of a script, in position order. `None` when the
    /// script id is unknown (as opposed to a known script with no lines).
    pub fn get_lines(&self, script_id: &str) -> Result<Option<Vec<String>>, rusqlite::Error> {
        let conn = self.open()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM scripts WHERE id = ?1",
                params![script_id],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT text FROM script_lines WHERE script_id = ?1 ORDER BY position ASC",
        )?;
        let lines = stmt
            .query_map(params![script_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(lines))
    }

    /// Delete a script and (via cascade) its lines. Returns whether a row
    /// was actually removed.
    pub fn delete_script(&self, script_id: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.open()?;
        let n = conn.execute("DELETE FROM scripts WHERE id = ?1", params![script_id])?;
        Ok(n > 0)
    }

    /// Delete every script whose expiry is at or before `now_ms` and return
    /// the purged ids so the caller can clean up artifacts on disk.
    pub fn purge_expired(&self, now_ms: i64) -> Result<Vec<String>, rusqlite::Error> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT id FROM scripts WHERE expires_at_ms <= ?1")?;
        let ids = stmt
            .query_map(params![now_ms], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        for id in &ids {
            conn.execute("DELETE FROM scripts WHERE id = ?1", params![id])?;
        }
        Ok(ids)
    }
}
