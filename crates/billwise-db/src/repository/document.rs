//! # Document Repository
//!
//! Invoices and estimates share one column layout, so one repository type
//! serves both; the [`DocumentKind`] picks the tables.
//!
//! ```text
//! DocumentKind::Invoice  ──► invoices  + invoice_items
//! DocumentKind::Estimate ──► estimates + estimate_items
//! ```
//!
//! "Most recent" always means `created_at DESC, rowid DESC`, so two
//! documents created within the same clock tick still have a fixed order.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use billwise_core::calculator::DiscountType;
use billwise_core::reference::digits_match;
use billwise_core::{Document, DocumentKind, DocumentStatus, LineItem, PaymentFlags};

use super::{decimal_column, like_pattern};
use crate::error::{DbError, DbResult};

const DOCUMENT_COLUMNS: &str = "id, owner_id, reference_number, client_id, client_name, status, \
     issue_date, due_date, subtotal, discount_type, discount_value, tax_percentage, tax_amount, \
     total, notes, design_id, accent_color, pay_bank, pay_card, pay_wallet, is_accepted, \
     accepted_at, converted_to_invoice_id, converted_at, source_estimate_id, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, document_id, name, description, quantity, unit_price, position";

/// `(documents table, line items table)` for a kind.
pub const fn tables(kind: DocumentKind) -> (&'static str, &'static str) {
    match kind {
        DocumentKind::Invoice => ("invoices", "invoice_items"),
        DocumentKind::Estimate => ("estimates", "estimate_items"),
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    owner_id: String,
    reference_number: String,
    client_id: String,
    client_name: String,
    status: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    subtotal: String,
    discount_type: Option<String>,
    discount_value: String,
    tax_percentage: String,
    tax_amount: String,
    total: String,
    notes: Option<String>,
    design_id: Option<String>,
    accent_color: Option<String>,
    pay_bank: bool,
    pay_card: bool,
    pay_wallet: bool,
    is_accepted: bool,
    accepted_at: Option<DateTime<Utc>>,
    converted_to_invoice_id: Option<String>,
    converted_at: Option<DateTime<Utc>>,
    source_estimate_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self, kind: DocumentKind, line_items: Vec<LineItem>) -> DbResult<Document> {
        let (table, _) = tables(kind);
        let money = |column: &str, raw: &str| decimal_column(table, column, raw);

        let status = DocumentStatus::from_str(&self.status)
            .map_err(|e| DbError::invalid_data(table, e.to_string()))?;
        let discount_type = self
            .discount_type
            .as_deref()
            .map(DiscountType::from_str)
            .transpose()
            .map_err(|e| DbError::invalid_data(table, e.to_string()))?;

        Ok(Document {
            subtotal: money("subtotal", &self.subtotal)?,
            discount_value: money("discount_value", &self.discount_value)?,
            tax_percentage: money("tax_percentage", &self.tax_percentage)?,
            tax_amount: money("tax_amount", &self.tax_amount)?,
            total: money("total", &self.total)?,
            id: self.id,
            owner_id: self.owner_id,
            kind,
            reference_number: self.reference_number,
            client_id: self.client_id,
            client_name: self.client_name,
            status,
            issue_date: self.issue_date,
            due_date: self.due_date,
            discount_type,
            notes: self.notes,
            design_id: self.design_id,
            accent_color: self.accent_color,
            payment_flags: PaymentFlags {
                bank: self.pay_bank,
                card: self.pay_card,
                wallet: self.pay_wallet,
            },
            is_accepted: self.is_accepted,
            accepted_at: self.accepted_at,
            converted_to_invoice_id: self.converted_to_invoice_id,
            converted_at: self.converted_at,
            source_estimate_id: self.source_estimate_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            line_items,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    id: String,
    document_id: String,
    name: String,
    description: Option<String>,
    quantity: String,
    unit_price: String,
    position: i64,
}

impl LineItemRow {
    fn into_item(self, table: &str) -> DbResult<LineItem> {
        Ok(LineItem {
            quantity: decimal_column(table, "quantity", &self.quantity)?,
            unit_price: decimal_column(table, "unit_price", &self.unit_price)?,
            id: self.id,
            document_id: self.document_id,
            name: self.name,
            description: self.description,
            position: self.position,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReferenceRow {
    id: String,
    reference_number: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for one document collection.
///
/// ## Usage
/// ```rust,ignore
/// let recent = db.estimates().recent(owner_id, 5).await?;
/// let doc = db.invoices().get_by_reference(owner_id, "INV-014").await?;
/// ```
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
    kind: DocumentKind,
    table: &'static str,
    items_table: &'static str,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool, kind: DocumentKind) -> Self {
        let (table, items_table) = tables(kind);
        DocumentRepository {
            pool,
            kind,
            table,
            items_table,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Inserts the document row only. Line items go through
    /// [`insert_items`](Self::insert_items).
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - reference number already used in
    ///   this collection
    pub async fn insert(&self, doc: &Document) -> DbResult<()> {
        debug!(
            kind = %self.kind,
            reference = %doc.reference_number,
            "Inserting document"
        );

        let sql = format!(
            "INSERT INTO {} ({DOCUMENT_COLUMNS}) VALUES (\
             ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
             ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
            self.table
        );

        sqlx::query(&sql)
            .bind(&doc.id)
            .bind(&doc.owner_id)
            .bind(&doc.reference_number)
            .bind(&doc.client_id)
            .bind(&doc.client_name)
            .bind(doc.status.as_str())
            .bind(doc.issue_date)
            .bind(doc.due_date)
            .bind(doc.subtotal.to_string())
            .bind(doc.discount_type.map(|d| d.as_str()))
            .bind(doc.discount_value.to_string())
            .bind(doc.tax_percentage.to_string())
            .bind(doc.tax_amount.to_string())
            .bind(doc.total.to_string())
            .bind(&doc.notes)
            .bind(&doc.design_id)
            .bind(&doc.accent_color)
            .bind(doc.payment_flags.bank)
            .bind(doc.payment_flags.card)
            .bind(doc.payment_flags.wallet)
            .bind(doc.is_accepted)
            .bind(doc.accepted_at)
            .bind(&doc.converted_to_invoice_id)
            .bind(doc.converted_at)
            .bind(&doc.source_estimate_id)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                    field,
                    value: doc.reference_number.clone(),
                },
                other => other,
            })?;

        Ok(())
    }

    /// Inserts line items in one transaction: all of them or none.
    pub async fn insert_items(&self, owner_id: &str, items: &[LineItem]) -> DbResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        debug!(kind = %self.kind, count = items.len(), "Inserting line items");

        let sql = self.insert_item_sql();
        let mut tx = self.pool.begin().await?;
        for item in items {
            bind_item(sqlx::query(&sql), owner_id, item)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replaces every line item of a document in one transaction.
    pub async fn replace_items(
        &self,
        owner_id: &str,
        document_id: &str,
        items: &[LineItem],
    ) -> DbResult<()> {
        debug!(kind = %self.kind, document_id = %document_id, count = items.len(), "Replacing line items");

        let delete = format!(
            "DELETE FROM {} WHERE owner_id = ?1 AND document_id = ?2",
            self.items_table
        );
        let insert = self.insert_item_sql();

        let mut tx = self.pool.begin().await?;
        sqlx::query(&delete)
            .bind(owner_id)
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        for item in items {
            bind_item(sqlx::query(&insert), owner_id, item)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Writes every mutable header field (not the reference number).
    pub async fn update(&self, doc: &Document) -> DbResult<()> {
        debug!(kind = %self.kind, reference = %doc.reference_number, "Updating document");

        let sql = format!(
            "UPDATE {} SET \
                client_id = ?3, client_name = ?4, status = ?5, issue_date = ?6, due_date = ?7, \
                subtotal = ?8, discount_type = ?9, discount_value = ?10, tax_percentage = ?11, \
                tax_amount = ?12, total = ?13, notes = ?14, design_id = ?15, accent_color = ?16, \
                pay_bank = ?17, pay_card = ?18, pay_wallet = ?19, is_accepted = ?20, \
                accepted_at = ?21, converted_to_invoice_id = ?22, converted_at = ?23, \
                source_estimate_id = ?24, updated_at = ?25 \
             WHERE id = ?1 AND owner_id = ?2",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(&doc.id)
            .bind(&doc.owner_id)
            .bind(&doc.client_id)
            .bind(&doc.client_name)
            .bind(doc.status.as_str())
            .bind(doc.issue_date)
            .bind(doc.due_date)
            .bind(doc.subtotal.to_string())
            .bind(doc.discount_type.map(|d| d.as_str()))
            .bind(doc.discount_value.to_string())
            .bind(doc.tax_percentage.to_string())
            .bind(doc.tax_amount.to_string())
            .bind(doc.total.to_string())
            .bind(&doc.notes)
            .bind(&doc.design_id)
            .bind(&doc.accent_color)
            .bind(doc.payment_flags.bank)
            .bind(doc.payment_flags.card)
            .bind(doc.payment_flags.wallet)
            .bind(doc.is_accepted)
            .bind(doc.accepted_at)
            .bind(&doc.converted_to_invoice_id)
            .bind(doc.converted_at)
            .bind(&doc.source_estimate_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.label(), &doc.reference_number));
        }
        Ok(())
    }

    /// Deletes a document and its line items.
    pub async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(kind = %self.kind, id = %id, "Deleting document");

        let delete_items = format!(
            "DELETE FROM {} WHERE owner_id = ?1 AND document_id = ?2",
            self.items_table
        );
        let delete_doc = format!("DELETE FROM {} WHERE owner_id = ?1 AND id = ?2", self.table);

        let mut tx = self.pool.begin().await?;
        sqlx::query(&delete_items)
            .bind(owner_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(&delete_doc)
            .bind(owner_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.label(), id));
        }
        tx.commit().await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> DbResult<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} WHERE owner_id = ?1 AND id = ?2",
            self.table
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Exact, case-insensitive reference lookup over the whole collection.
    pub async fn get_by_reference(
        &self,
        owner_id: &str,
        reference: &str,
    ) -> DbResult<Option<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} \
             WHERE owner_id = ?1 AND reference_number = ?2 COLLATE NOCASE \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            self.table
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .bind(reference.trim())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Most recent document whose reference carries the same digits as
    /// `reference` (`EST-003` finds `INV-003`).
    pub async fn find_by_digits(
        &self,
        owner_id: &str,
        reference: &str,
    ) -> DbResult<Option<Document>> {
        let sql = format!(
            "SELECT id, reference_number FROM {} WHERE owner_id = ?1 \
             ORDER BY created_at DESC, rowid DESC",
            self.table
        );
        let rows = sqlx::query_as::<_, ReferenceRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        match rows
            .into_iter()
            .find(|row| digits_match(reference, &row.reference_number))
        {
            Some(row) => self.get_by_id(owner_id, &row.id).await,
            None => Ok(None),
        }
    }

    /// The owner's `limit` most recently created documents, newest first.
    pub async fn recent(&self, owner_id: &str, limit: u32) -> DbResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} WHERE owner_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            self.table
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        self.hydrate_all(rows).await
    }

    /// Substring search on reference, client name and notes, optionally
    /// narrowed to one status.
    pub async fn search(
        &self,
        owner_id: &str,
        query: &str,
        status: Option<DocumentStatus>,
        limit: u32,
    ) -> DbResult<Vec<Document>> {
        let query = query.trim();
        debug!(kind = %self.kind, query = %query, limit = %limit, "Searching documents");

        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} \
             WHERE owner_id = ?1 \
               AND (?2 = '' \
                    OR reference_number LIKE ?3 ESCAPE '\\' \
                    OR client_name LIKE ?3 ESCAPE '\\' \
                    OR notes LIKE ?3 ESCAPE '\\') \
               AND (?4 IS NULL OR status = ?4) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?5",
            self.table
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .bind(query)
            .bind(like_pattern(query))
            .bind(status.map(|s| s.as_str()))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Search returned documents");
        self.hydrate_all(rows).await
    }

    /// Every document written for one client, newest first.
    pub async fn for_client(&self, owner_id: &str, client_id: &str) -> DbResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM {} WHERE owner_id = ?1 AND client_id = ?2 \
             ORDER BY created_at DESC, rowid DESC",
            self.table
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(owner_id)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate_all(rows).await
    }

    /// Line items of one document, in position order.
    pub async fn items(&self, owner_id: &str, document_id: &str) -> DbResult<Vec<LineItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM {} WHERE owner_id = ?1 AND document_id = ?2 \
             ORDER BY position ASC, rowid ASC",
            self.items_table
        );
        let rows = sqlx::query_as::<_, LineItemRow>(&sql)
            .bind(owner_id)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.into_item(self.items_table))
            .collect()
    }

    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE owner_id = ?1", self.table);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn insert_item_sql(&self) -> String {
        format!(
            "INSERT INTO {} (id, owner_id, document_id, name, description, quantity, unit_price, position) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            self.items_table
        )
    }

    async fn hydrate(&self, row: DocumentRow) -> DbResult<Document> {
        let items = self.items(&row.owner_id, &row.id).await?;
        row.into_document(self.kind, items)
    }

    async fn hydrate_all(&self, rows: Vec<DocumentRow>) -> DbResult<Vec<Document>> {
        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push(self.hydrate(row).await?);
        }
        Ok(docs)
    }
}

fn bind_item<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    owner_id: &'q str,
    item: &'q LineItem,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&item.id)
        .bind(owner_id)
        .bind(&item.document_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity.to_string())
        .bind(item.unit_price.to_string())
        .bind(item.position)
}

// =============================================================================
// Unit Tests
// =============================================================================
