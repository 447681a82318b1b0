//! SQLite-backed catalog implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Lookup/record
//! operations live in `read` and `write`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed catalog.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/mdq/catalog.db`.
#[derive(Clone)]
pub struct CatalogStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl CatalogStore {
    /// Open (or create) the default catalog and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
        let state_dir = xdg_dirs.get_state_home().join("mdq");
        let db_path = state_dir.join("catalog.db");

        // Ensure parent directory exists.
        tokio::fs::create_dir_all(&state_dir).await?;

        Self::open_at(&db_path).await
    }

    /// Open (or create) the catalog at a specific path. Creates parent dirs if needed.
    /// Intended for tests so the DB can be placed in a temp directory.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        // Single connection: readers are cheap and writers must be serialized
        // anyway (single-writer discipline for the catalog file).
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&uri)
            .await?;
        let store = CatalogStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // One table keyed by source_ref: a source maps to at most one file.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_ref TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                completed_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps and event stamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory catalog for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<CatalogStore> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = CatalogStore { pool };
    store.migrate().await?;
    Ok(store)
}
