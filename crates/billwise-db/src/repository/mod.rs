//! # Repository Module
//!
//! Database repository implementations for Billwise.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler (billwise-engine)                                             │
//! │       │                                                                 │
//! │       │  db.invoices().recent(owner_id, 5)                             │
//! │       ▼                                                                 │
//! │  DocumentRepository { kind: Invoice }                                  │
//! │  ├── insert / insert_items / replace_items                             │
//! │  ├── get_by_id / get_by_reference / find_by_digits                     │
//! │  ├── recent / search / for_client                                      │
//! │  └── update / delete                                                   │
//! │       │                                                                 │
//! │       │  SQL, always filtered by owner_id                              │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`DocumentRepository`](document::DocumentRepository) - Invoices or estimates and their line items
//! - [`ReferenceRepository`](reference::ReferenceRepository) - Reference numbers across both collections
//! - [`ClientRepository`](client::ClientRepository) - Clients
//! - [`SettingsRepository`](settings::SettingsRepository) - Business settings
//! - [`PaymentOptionsRepository`](settings::PaymentOptionsRepository) - Payment configuration

use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

pub mod client;
pub mod document;
pub mod reference;
pub mod settings;

/// Parses a money column back into an exact decimal.
pub(crate) fn decimal_column(table: &str, column: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| DbError::invalid_data(table, format!("{column} = '{raw}': {e}")))
}

/// Escapes `%` and `_` so user text is matched literally inside LIKE.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Generates a new entity id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
