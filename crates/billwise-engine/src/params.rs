//! # Function Parameters
//!
//! One struct per operation. Arguments arrive as loose JSON chosen by the
//! model; [`parse`] turns them into these types or a validation error that
//! names the problem (`missing field `client_name``).
//!
//! Field names match the catalog in [`crate::catalog`]. Aliases cover the
//! spellings models commonly pick (`invoice_number`, `price`, ...).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Parses `arguments` for `function`. `null` counts as `{}`.
pub fn parse<T: DeserializeOwned>(function: &str, arguments: Value) -> EngineResult<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| EngineError::validation(format!("Invalid arguments for {}: {}", function, e)))
}

fn one() -> Decimal {
    Decimal::ONE
}

/// Operations that take no arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoParams {}

// =============================================================================
// Documents
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    #[serde(alias = "item", alias = "item_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "one", alias = "qty", alias = "hours")]
    pub quantity: Decimal,
    #[serde(alias = "price", alias = "rate", alias = "amount")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentParams {
    #[serde(alias = "client", alias = "customer_name")]
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_address: Option<String>,
    #[serde(default, alias = "items")]
    pub line_items: Vec<LineItemInput>,
    #[serde(alias = "tax_percentage")]
    pub tax_rate: Option<Decimal>,
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub issue_date: Option<NaiveDate>,
    #[serde(alias = "valid_until")]
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub design_id: Option<String>,
    pub accent_color: Option<String>,
}

/// Target document; omitted means "the most recent one".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentTarget {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteDocumentParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchDocumentsParams {
    pub query: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRecentParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocumentParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    #[serde(alias = "tax_percentage")]
    pub tax_rate: Option<Decimal>,
    /// `percentage`, `fixed`, or `none` to remove the discount.
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub issue_date: Option<NaiveDate>,
    #[serde(alias = "valid_until")]
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddLineItemParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    #[serde(alias = "item", alias = "item_name")]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "one", alias = "qty", alias = "hours")]
    pub quantity: Decimal,
    #[serde(alias = "price", alias = "rate", alias = "amount")]
    pub unit_price: Decimal,
}

/// Picks a line by name (case-insensitive, partial allowed) or by
/// 1-based position.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineSelector {
    pub item_name: Option<String>,
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLineItemParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    #[serde(flatten)]
    pub selector: LineSelector,
    pub new_name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    #[serde(alias = "price", alias = "rate")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveLineItemParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    #[serde(flatten)]
    pub selector: LineSelector,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethodsParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    pub bank: Option<bool>,
    pub card: Option<bool>,
    pub wallet: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesignParams {
    #[serde(alias = "invoice_number", alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    #[serde(alias = "design", alias = "template")]
    pub design_id: Option<String>,
    #[serde(alias = "color")]
    pub accent_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusParams {
    #[serde(alias = "estimate_number", alias = "number")]
    pub reference_number: Option<String>,
    pub status: String,
}

// =============================================================================
// Clients
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientParams {
    #[serde(alias = "client_name")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindOrCreateClientParams {
    #[serde(alias = "client_name")]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A client by id or by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientLookupParams {
    pub client_id: Option<String>,
    #[serde(alias = "client_name")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchClientsParams {
    pub query: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientParams {
    pub client_id: Option<String>,
    #[serde(alias = "client_name")]
    pub name: Option<String>,
    pub new_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Business settings & payment
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBusinessSettingsParams {
    pub business_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub currency: Option<String>,
    pub payment_terms_days: Option<i64>,
    pub auto_apply_tax: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetDefaultTaxRateParams {
    #[serde(alias = "tax_rate", alias = "default_tax_rate")]
    pub rate: Decimal,
    pub auto_apply: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetReferenceFormatParams {
    #[serde(alias = "reference_format", alias = "template")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDefaultDesignParams {
    #[serde(alias = "design", alias = "template")]
    pub design_id: Option<String>,
    #[serde(alias = "color")]
    pub accent_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BankTransferParams {
    pub bank_name: Option<String>,
    pub account_name: Option<String>,
    pub account_number: String,
    pub routing_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardPaymentsParams {
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletPaymentsParams {
    #[serde(alias = "email", alias = "wallet_address")]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisablePaymentMethodParams {
    #[serde(alias = "payment_method")]
    pub method: String,
}
