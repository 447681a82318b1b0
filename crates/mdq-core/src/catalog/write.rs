//! Catalog write operations: record and clear.

use anyhow::Result;

use super::db::{unix_timestamp, CatalogStore};
use super::types::{CatalogEntry, NewEntry};

impl CatalogStore {
    /// Record a completed download.
    ///
    /// Upserts on source_ref: a source maps to at most one file, so a
    /// re-download (e.g. after the old file was deleted) replaces the row.
    pub async fn record(&self, entry: &NewEntry) -> Result<CatalogEntry> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO catalog (source_ref, file_path, file_size, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(source_ref) DO UPDATE SET
                file_path = excluded.file_path,
                file_size = excluded.file_size,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&entry.source_ref)
        .bind(&entry.file_path)
        .bind(entry.file_size)
        .bind(now)
        .execute(&self.pool)
        .await?;

        // Read back for the row id (upsert may have updated an existing row).
        let recorded = self
            .lookup(&entry.source_ref)
            .await?
            .map(|l| l.entry)
            .ok_or_else(|| anyhow::anyhow!("catalog row missing after record: {}", entry.source_ref))?;
        Ok(recorded)
    }

    /// Remove every entry. Destructive and unconditional; only reachable
    /// through the authenticated control plane.
    pub async fn clear(&self) -> Result<u64> {
        let r = sqlx::query("DELETE FROM catalog").execute(&self.pool).await?;
        Ok(r.rows_affected())
    }
}
