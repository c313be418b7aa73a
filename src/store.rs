use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Logical names for the three persisted secrets. They mirror the per-service
/// entries the desktop credential vault used.
pub const CODE_SECRET: &str = "spotify-code";
pub const ACCESS_SECRET: &str = "spotify-access";
pub const REFRESH_SECRET: &str = "spotify-refresh";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS secrets (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// Opaque secret persistence keyed by logical name. Values are never
/// interpreted here; the token manager decides what they mean.
pub trait SecretStore: Send + Sync {
    fn set(&self, name: &str, value: &str) -> Result<()>;
    fn get(&self, name: &str) -> Result<Option<String>>;
    fn delete(&self, name: &str) -> Result<()>;
}

/// SQLite-backed store. Connections are opened per operation; callers on the
/// async side wrap these in `spawn_blocking`.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }
}

impl SecretStore for SqliteStore {
    fn set(&self, name: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn()?.execute(
            "INSERT INTO secrets (name, value, updated_at) VALUES (?1, ?2, ?3) ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, value, now],
        )?;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM secrets WHERE name = ?1 LIMIT 1")?;
        let row = stmt
            .query_row(params![name], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM secrets WHERE name = ?1", params![name])?;
        Ok(())
    }
}

/// In-memory store for tests and mock sessions.
#[derive(Default)]
pub struct MemoryStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.secrets.lock().unwrap().get(name).cloned())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.secrets.lock().unwrap().remove(name);
        Ok(())
    }
}
