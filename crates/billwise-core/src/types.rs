//! # Domain Types
//!
//! Core domain types used throughout Billwise.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Document     │   │    LineItem     │   │     Client      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  kind           │──►│  document_id    │   │  id (UUID)      │       │
//! │  │  reference      │   │  quantity       │   │  name           │       │
//! │  │  client_id ─────┼───┼─────────────────┼──►│  email?         │       │
//! │  │  totals         │   │  unit_price     │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │BusinessSettings │   │ PaymentOptions  │   one row per owner         │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every document has:
//! - `id`: UUID v4 - immutable, used for relations
//! - `reference_number`: human-readable (`INV-014`), shared between
//!   invoices and estimates of one owner

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calculator::{Discount, DiscountType, LineAmount, Totals};
use crate::error::ValidationError;

// =============================================================================
// Document Kind
// =============================================================================

/// Which of the two document collections a document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Estimate,
}

impl DocumentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Estimate => "estimate",
        }
    }

    /// Prefix used by the timestamp fallback reference.
    pub const fn fallback_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Estimate => "EST",
        }
    }

    /// Capitalised label for messages.
    pub const fn label(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::Estimate => "Estimate",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document Status
// =============================================================================

/// Status of an invoice or an estimate.
///
/// Invoices use `draft → sent → paid | overdue`. Estimates use the richer
/// machine in [`crate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Accepted,
    Declined,
    Expired,
    Cancelled,
    Converted,
}

impl DocumentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Paid => "paid",
            DocumentStatus::Overdue => "overdue",
            DocumentStatus::Accepted => "accepted",
            DocumentStatus::Declined => "declined",
            DocumentStatus::Expired => "expired",
            DocumentStatus::Cancelled => "cancelled",
            DocumentStatus::Converted => "converted",
        }
    }

    /// Every status name, for error messages.
    pub fn all_names() -> Vec<String> {
        [
            "draft",
            "sent",
            "paid",
            "overdue",
            "accepted",
            "declined",
            "expired",
            "cancelled",
            "converted",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Draft
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(DocumentStatus::Draft),
            "sent" => Ok(DocumentStatus::Sent),
            "paid" => Ok(DocumentStatus::Paid),
            "overdue" => Ok(DocumentStatus::Overdue),
            "accepted" | "approved" => Ok(DocumentStatus::Accepted),
            "declined" | "rejected" => Ok(DocumentStatus::Declined),
            "expired" => Ok(DocumentStatus::Expired),
            "cancelled" | "canceled" => Ok(DocumentStatus::Cancelled),
            "converted" => Ok(DocumentStatus::Converted),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: DocumentStatus::all_names(),
            }),
        }
    }
}

// =============================================================================
// Payment Methods
// =============================================================================

/// A way the client can pay a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer using the owner's bank details.
    Bank,
    /// Card processor checkout link.
    Card,
    /// Third-party wallet (e.g. a PayPal address).
    Wallet,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Bank, PaymentMethod::Card, PaymentMethod::Wallet];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bank => "bank",
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
        }
    }

    /// Human label plus the command that configures it.
    pub const fn setup_hint(&self) -> (&'static str, &'static str) {
        match self {
            PaymentMethod::Bank => ("Bank transfer", "setup_bank_transfer"),
            PaymentMethod::Card => ("Card payments", "setup_card_payments"),
            PaymentMethod::Wallet => ("Wallet payments", "setup_wallet_payments"),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank" | "bank_transfer" | "transfer" => Ok(PaymentMethod::Bank),
            "card" | "stripe" | "credit_card" => Ok(PaymentMethod::Card),
            "wallet" | "paypal" => Ok(PaymentMethod::Wallet),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: vec!["bank".to_string(), "card".to_string(), "wallet".to_string()],
            }),
        }
    }
}

/// Which payment methods a document offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFlags {
    pub bank: bool,
    pub card: bool,
    pub wallet: bool,
}

impl PaymentFlags {
    pub fn get(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Bank => self.bank,
            PaymentMethod::Card => self.card,
            PaymentMethod::Wallet => self.wallet,
        }
    }

    pub fn set(&mut self, method: PaymentMethod, enabled: bool) {
        match method {
            PaymentMethod::Bank => self.bank = enabled,
            PaymentMethod::Card => self.card = enabled,
            PaymentMethod::Wallet => self.wallet = enabled,
        }
    }

    /// Enabled methods, in display order.
    pub fn enabled(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|m| self.get(*m))
            .collect()
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A line on a document. Owned by exactly one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub document_id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Order on the document, starting at 0.
    pub position: i64,
}

impl LineItem {
    /// quantity × unit price, unrounded.
    #[inline]
    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    #[inline]
    pub fn amount(&self) -> LineAmount {
        LineAmount::new(self.quantity, self.unit_price)
    }
}

// =============================================================================
// Document
// =============================================================================

/// An invoice or an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub kind: DocumentKind,
    pub reference_number: String,
    pub client_id: String,
    /// Client name at the time the document was written.
    pub client_name: String,
    pub status: DocumentStatus,
    pub issue_date: NaiveDate,
    /// Due date for invoices, valid-until date for estimates.
    pub due_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub design_id: Option<String>,
    pub accent_color: Option<String>,
    pub payment_flags: PaymentFlags,
    /// Estimates only.
    pub is_accepted: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub converted_to_invoice_id: Option<String>,
    pub converted_at: Option<DateTime<Utc>>,
    /// Invoices produced by a conversion point back at their estimate.
    pub source_estimate_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
}

impl Document {
    /// Discount as the calculator sees it.
    pub fn discount(&self) -> Option<Discount> {
        self.discount_type
            .map(|kind| Discount::new(kind, self.discount_value))
    }

    /// Recomputes every derived amount from the current line items,
    /// discount and tax rate.
    pub fn recalculate(&mut self) -> Totals {
        let amounts: Vec<LineAmount> = self.line_items.iter().map(LineItem::amount).collect();
        let totals = crate::calculator::calculate_totals(
            &amounts,
            self.discount(),
            self.tax_percentage,
        );
        self.subtotal = totals.subtotal;
        self.tax_amount = totals.tax_amount;
        self.total = totals.total;
        totals
    }

    /// Totals derived from the stored amounts.
    pub fn totals(&self) -> Totals {
        let amounts: Vec<LineAmount> = self.line_items.iter().map(LineItem::amount).collect();
        crate::calculator::calculate_totals(&amounts, self.discount(), self.tax_percentage)
    }
}

// =============================================================================
// Client
// =============================================================================

/// A customer of the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Business Settings
// =============================================================================

/// Subscription plan of the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::Free
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "pro" | "premium" => Ok(Plan::Pro),
            _ => Err(ValidationError::NotAllowed {
                field: "plan".to_string(),
                allowed: vec!["free".to_string(), "pro".to_string()],
            }),
        }
    }
}

/// Per-owner business profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSettings {
    pub owner_id: String,
    pub business_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub currency: String,
    pub default_tax_rate: Decimal,
    pub auto_apply_tax: bool,
    pub reference_format: String,
    pub default_design_id: Option<String>,
    pub default_accent_color: Option<String>,
    pub payment_terms_days: i64,
    pub plan: Plan,
    pub updated_at: DateTime<Utc>,
}

impl BusinessSettings {
    /// Settings used for an owner that never saved any.
    pub fn defaults_for(owner_id: &str, now: DateTime<Utc>) -> Self {
        BusinessSettings {
            owner_id: owner_id.to_string(),
            business_name: None,
            email: None,
            phone: None,
            address: None,
            currency: "USD".to_string(),
            default_tax_rate: Decimal::ZERO,
            auto_apply_tax: false,
            reference_format: crate::DEFAULT_REFERENCE_FORMAT.to_string(),
            default_design_id: None,
            default_accent_color: None,
            payment_terms_days: 30,
            plan: Plan::Free,
            updated_at: now,
        }
    }

    /// Tax rate for a new document: explicit wins, then the default when
    /// auto-apply is on, otherwise zero.
    pub fn effective_tax_rate(&self, explicit: Option<Decimal>) -> Decimal {
        match explicit {
            Some(rate) => rate,
            None if self.auto_apply_tax => self.default_tax_rate,
            None => Decimal::ZERO,
        }
    }
}

// =============================================================================
// Payment Options
// =============================================================================

/// Per-owner payment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOptions {
    pub owner_id: String,
    pub bank_enabled: bool,
    pub bank_name: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_routing_number: Option<String>,
    pub card_enabled: bool,
    pub card_account_id: Option<String>,
    pub wallet_enabled: bool,
    pub wallet_address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOptions {
    /// Nothing configured.
    pub fn empty(owner_id: &str, now: DateTime<Utc>) -> Self {
        PaymentOptions {
            owner_id: owner_id.to_string(),
            bank_enabled: false,
            bank_name: None,
            bank_account_name: None,
            bank_account_number: None,
            bank_routing_number: None,
            card_enabled: false,
            card_account_id: None,
            wallet_enabled: false,
            wallet_address: None,
            updated_at: now,
        }
    }

    /// Whether the owner has set up `method`.
    pub fn is_configured(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Bank => self.bank_enabled,
            PaymentMethod::Card => self.card_enabled,
            PaymentMethod::Wallet => self.wallet_enabled,
        }
    }

    /// Flags a new document starts with: everything the owner enabled.
    pub fn default_flags(&self) -> PaymentFlags {
        PaymentFlags {
            bank: self.bank_enabled,
            card: self.card_enabled,
            wallet: self.wallet_enabled,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_accepts_synonyms() {
        assert_eq!("Approved".parse::<DocumentStatus>().unwrap(), DocumentStatus::Accepted);
        assert_eq!("canceled".parse::<DocumentStatus>().unwrap(), DocumentStatus::Cancelled);
        assert!("archived".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_status_default() {
        assert_eq!(DocumentStatus::default(), DocumentStatus::Draft);
    }

    #[test]
    fn test_payment_flags_enabled_order() {
        let mut flags = PaymentFlags::default();
        flags.set(PaymentMethod::Wallet, true);
        flags.set(PaymentMethod::Bank, true);
        assert_eq!(flags.enabled(), vec![PaymentMethod::Bank, PaymentMethod::Wallet]);
        assert!(!flags.get(PaymentMethod::Card));
    }

    #[test]
    fn test_effective_tax_rate() {
        let mut settings = BusinessSettings::defaults_for("owner-1", Utc::now());
        settings.default_tax_rate = Decimal::new(825, 2);

        assert_eq!(settings.effective_tax_rate(None), Decimal::ZERO);
        settings.auto_apply_tax = true;
        assert_eq!(settings.effective_tax_rate(None), Decimal::new(825, 2));
        assert_eq!(settings.effective_tax_rate(Some(Decimal::from(5))), Decimal::from(5));
    }

    #[test]
    fn test_payment_method_aliases() {
        assert_eq!("PayPal".parse::<PaymentMethod>().unwrap(), PaymentMethod::Wallet);
        assert_eq!("stripe".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert!("cash".parse::<PaymentMethod>().is_err());
    }
}
