//! # Function Handlers
//!
//! One async function per catalog entry, grouped by area:
//!
//! - [`document`] - invoices and estimates
//! - [`client`] - clients
//! - [`settings`] - business profile, numbering, payment options, plan
//!
//! Handlers take parsed-on-entry JSON arguments and return an [`Outcome`]
//! (message + data) or an [`EngineError`]. Turning either into an envelope
//! is the dispatcher's job.

pub mod client;
pub mod document;
pub mod settings;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use billwise_core::{
    BusinessSettings, Document, DocumentKind, DocumentStatus, LineItem, Money, PaymentMethod, Plan,
};

use crate::catalog::Function;
use crate::dispatcher::EngineContext;
use crate::error::{EngineError, EngineResult};

/// What a successful handler hands back.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub message: String,
    pub data: Value,
}

impl Outcome {
    pub fn new(message: impl Into<String>, data: impl Serialize) -> EngineResult<Self> {
        Ok(Outcome {
            message: message.into(),
            data: to_data(data)?,
        })
    }
}

pub(crate) fn to_data(value: impl Serialize) -> EngineResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::internal(format!("Could not serialize result: {}", e)))
}

/// Routes a catalog entry to its handler.
pub async fn handle(
    ctx: &EngineContext,
    function: Function,
    owner_id: &str,
    arguments: Value,
) -> EngineResult<Outcome> {
    let name = function.name();
    match function {
        Function::Document(kind, op) => document::handle(ctx, kind, op, &name, owner_id, arguments).await,
        Function::Client(op) => client::handle(ctx, op, &name, owner_id, arguments).await,
        Function::Settings(op) => settings::handle(ctx, op, &name, owner_id, arguments).await,
    }
}

// =============================================================================
// Shared lookups
// =============================================================================

/// Stored settings, or defaults using the configured payment terms.
pub(crate) async fn settings_for(ctx: &EngineContext, owner_id: &str) -> EngineResult<BusinessSettings> {
    match ctx.db.settings().get(owner_id).await? {
        Some(settings) => Ok(settings),
        None => {
            let mut settings = BusinessSettings::defaults_for(owner_id, Utc::now());
            settings.payment_terms_days = ctx.config.default_payment_terms_days;
            Ok(settings)
        }
    }
}

/// Documents used against the plan allowance.
#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub plan: Plan,
    pub used: i64,
    /// `None` means unlimited.
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
}

impl Usage {
    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }
}

/// Invoices plus estimates against the owner's plan.
pub(crate) async fn usage_for(
    ctx: &EngineContext,
    settings: &BusinessSettings,
) -> EngineResult<Usage> {
    let owner_id = settings.owner_id.as_str();
    let used = ctx.db.invoices().count(owner_id).await? + ctx.db.estimates().count(owner_id).await?;
    let limit = match settings.plan {
        Plan::Free => Some(ctx.config.free_plan_document_limit),
        Plan::Pro => None,
    };
    Ok(Usage {
        plan: settings.plan,
        used,
        limit,
        remaining: limit.map(|limit| (limit - used).max(0)),
    })
}

/// Rejects a new document once the free allowance is used up.
pub(crate) async fn ensure_within_plan(
    ctx: &EngineContext,
    settings: &BusinessSettings,
) -> EngineResult<()> {
    let usage = usage_for(ctx, settings).await?;
    if usage.is_exhausted() {
        warn!(owner_id = %settings.owner_id, used = usage.used, "Plan limit reached");
        return Err(EngineError::conflict(format!(
            "The {} plan allows {} documents and {} are already used. Upgrade to Pro to create more.",
            usage.plan.as_str(),
            usage.limit.unwrap_or_default(),
            usage.used
        )));
    }
    Ok(())
}

/// `$110.00` in the owner's currency.
pub(crate) fn money(amount: Decimal, currency: &str) -> String {
    Money::new(amount).format_currency(currency)
}

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LineItemDto {
    pub id: String,
    pub position: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl From<&LineItem> for LineItemDto {
    fn from(item: &LineItem) -> Self {
        LineItemDto {
            id: item.id.clone(),
            position: item.position + 1,
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: Money::new(item.unit_price).rounded(),
            total: Money::new(item.total()).rounded(),
        }
    }
}

/// A document as returned to the model. Amounts are rounded for display;
/// the stored values are not.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDto {
    pub id: String,
    pub kind: DocumentKind,
    pub reference_number: String,
    pub client_id: String,
    pub client_name: String,
    pub status: DocumentStatus,
    pub issue_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<String>,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    pub payment_methods: Vec<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_to_invoice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_estimate_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub line_items: Vec<LineItemDto>,
}

impl From<&Document> for DocumentDto {
    fn from(doc: &Document) -> Self {
        let totals = doc.totals();
        DocumentDto {
            id: doc.id.clone(),
            kind: doc.kind,
            reference_number: doc.reference_number.clone(),
            client_id: doc.client_id.clone(),
            client_name: doc.client_name.clone(),
            status: doc.status,
            issue_date: doc.issue_date,
            due_date: doc.due_date,
            subtotal: Money::new(doc.subtotal).rounded(),
            discount_type: doc.discount_type.map(|d| d.as_str().to_string()),
            discount_value: doc.discount_value,
            discount_amount: Money::new(totals.discount_amount).rounded(),
            tax_percentage: doc.tax_percentage,
            tax_amount: Money::new(doc.tax_amount).rounded(),
            total: Money::new(doc.total).rounded(),
            notes: doc.notes.clone(),
            design_id: doc.design_id.clone(),
            accent_color: doc.accent_color.clone(),
            payment_methods: doc.payment_flags.enabled(),
            accepted_at: doc.accepted_at,
            converted_to_invoice_id: doc.converted_to_invoice_id.clone(),
            converted_at: doc.converted_at,
            source_estimate_id: doc.source_estimate_id.clone(),
            created_at: doc.created_at,
            line_items: doc.line_items.iter().map(LineItemDto::from).collect(),
        }
    }
}

/// One line per document in list results.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub reference_number: String,
    pub client_name: String,
    pub status: DocumentStatus,
    pub issue_date: NaiveDate,
    pub total: Decimal,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        DocumentSummary {
            reference_number: doc.reference_number.clone(),
            client_name: doc.client_name.clone(),
            status: doc.status,
            issue_date: doc.issue_date,
            total: Money::new(doc.total).rounded(),
        }
    }
}

/// `"INV-001 (Acme, $110.00)"`
pub(crate) fn describe(doc: &Document, currency: &str) -> String {
    format!(
        "{} ({}, {})",
        doc.reference_number,
        doc.client_name,
        money(doc.total, currency)
    )
}

/// Clamps a caller-supplied list size.
pub(crate) fn limit(requested: Option<u32>, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

const MAX_LIST_LIMIT: u32 = 100;
