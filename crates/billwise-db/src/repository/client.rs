//! # Client Repository
//!
//! Database operations for clients. Client matching itself lives in
//! `billwise_core::matching`; this module only feeds it candidates.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use billwise_core::Client;

use super::like_pattern;
use crate::error::{DbError, DbResult};

const CLIENT_COLUMNS: &str =
    "id, owner_id, name, email, phone, address, tax_id, notes, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ClientRow {
    id: String,
    owner_id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    tax_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            tax_id: row.tax_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    pub async fn insert(&self, client: &Client) -> DbResult<()> {
        debug!(owner_id = %client.owner_id, name = %client.name, "Inserting client");

        sqlx::query(&format!(
            "INSERT INTO clients ({CLIENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))
        .bind(&client.id)
        .bind(&client.owner_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.tax_id)
        .bind(&client.notes)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> DbResult<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE owner_id = ?1 AND id = ?2"
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Client::from))
    }

    /// All of the owner's clients, oldest first (matching candidates).
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<Client>> {
        let rows = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE owner_id = ?1 \
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Client::from).collect())
    }

    /// Exact, case-insensitive name lookup.
    pub async fn find_by_name(&self, owner_id: &str, name: &str) -> DbResult<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE owner_id = ?1 AND name = ?2 COLLATE NOCASE \
             ORDER BY created_at ASC, rowid ASC LIMIT 1"
        ))
        .bind(owner_id)
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Client::from))
    }

    /// Substring search on name, email and phone.
    pub async fn search(&self, owner_id: &str, query: &str, limit: u32) -> DbResult<Vec<Client>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching clients");

        let rows = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE owner_id = ?1 \
               AND (?2 = '' \
                    OR name LIKE ?3 ESCAPE '\\' \
                    OR email LIKE ?3 ESCAPE '\\' \
                    OR phone LIKE ?3 ESCAPE '\\') \
             ORDER BY name COLLATE NOCASE ASC LIMIT ?4"
        ))
        .bind(owner_id)
        .bind(query)
        .bind(like_pattern(query))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Client::from).collect())
    }

    pub async fn update(&self, client: &Client) -> DbResult<()> {
        debug!(id = %client.id, "Updating client");

        let result = sqlx::query(
            "UPDATE clients SET name = ?3, email = ?4, phone = ?5, address = ?6, \
             tax_id = ?7, notes = ?8, updated_at = ?9 \
             WHERE owner_id = ?1 AND id = ?2",
        )
        .bind(&client.owner_id)
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.tax_id)
        .bind(&client.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", &client.id));
        }
        Ok(())
    }

    /// Deletes the client row. Documents keep their client id and name.
    pub async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting client");

        let result = sqlx::query("DELETE FROM clients WHERE owner_id = ?1 AND id = ?2")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }
        Ok(())
    }

    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
