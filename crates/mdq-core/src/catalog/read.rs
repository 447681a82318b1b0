//! Catalog read operations: lookup and list.

use anyhow::Result;
use sqlx::Row;
use std::path::Path;

use super::db::CatalogStore;
use super::types::{CatalogEntry, ListFilter, Lookup};

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> CatalogEntry {
    CatalogEntry {
        id: row.get("id"),
        source_ref: row.get("source_ref"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        completed_at: row.get("completed_at"),
    }
}

impl CatalogStore {
    /// Point lookup by source_ref, with an existence check on the recorded file.
    ///
    /// Returns `None` when the source was never recorded. A returned entry
    /// with `file_present == false` is stale and must not satisfy dedup.
    pub async fn lookup(&self, source_ref: &str) -> Result<Option<Lookup>> {
        let row = sqlx::query(
            r#"
            SELECT id, source_ref, file_path, file_size, completed_at
            FROM catalog
            WHERE source_ref = ?1
            "#,
        )
        .bind(source_ref)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let entry = entry_from_row(&row);
        let file_present = Path::new(&entry.file_path).exists();
        if !file_present {
            tracing::debug!(source_ref, path = %entry.file_path, "catalog entry is stale (file missing)");
        }
        Ok(Some(Lookup { entry, file_present }))
    }

    /// List entries, newest first, optionally filtered by substring.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<CatalogEntry>> {
        let rows = match &filter.contains {
            Some(needle) => {
                let pattern = format!("%{}%", needle);
                sqlx::query(
                    r#"
                    SELECT id, source_ref, file_path, file_size, completed_at
                    FROM catalog
                    WHERE source_ref LIKE ?1 OR file_path LIKE ?1
                    ORDER BY completed_at DESC, id DESC
                    "#,
                )
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, source_ref, file_path, file_size, completed_at
                    FROM catalog
                    ORDER BY completed_at DESC, id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(entry_from_row).collect())
    }
}
