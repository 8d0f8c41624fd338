//! # Reference Repository
//!
//! Invoices and estimates of one owner count in a single sequence, so the
//! reads here always union both tables.

use sqlx::SqlitePool;
use tracing::debug;

use billwise_core::reference::max_suffix;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

impl ReferenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    /// Every reference number the owner has used, in no particular order.
    pub async fn all(&self, owner_id: &str) -> DbResult<Vec<String>> {
        let refs: Vec<String> = sqlx::query_scalar(
            "SELECT reference_number FROM invoices WHERE owner_id = ?1 \
             UNION ALL \
             SELECT reference_number FROM estimates WHERE owner_id = ?1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(refs)
    }

    /// Highest numeric suffix across both collections (0 for a new owner).
    pub async fn max_suffix(&self, owner_id: &str) -> DbResult<u64> {
        let refs = self.all(owner_id).await?;
        let max = max_suffix(refs.iter().map(String::as_str));
        debug!(owner_id = %owner_id, existing = refs.len(), max, "Scanned reference numbers");
        Ok(max)
    }

    /// Whether `reference` is taken in either collection (case-insensitive).
    pub async fn exists(&self, owner_id: &str, reference: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM invoices \
                     WHERE owner_id = ?1 AND reference_number = ?2 COLLATE NOCASE) \
                  + (SELECT COUNT(*) FROM estimates \
                     WHERE owner_id = ?1 AND reference_number = ?2 COLLATE NOCASE)",
        )
        .bind(owner_id)
        .bind(reference.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}
