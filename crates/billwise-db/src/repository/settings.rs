//! # Settings Repositories
//!
//! One `business_settings` row and one `payment_options` row per owner.
//! Both are written with an upsert keyed on `owner_id`; an owner with no
//! row reads as the defaults.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::debug;

use billwise_core::{BusinessSettings, PaymentOptions, Plan};

use super::decimal_column;
use crate::error::{DbError, DbResult};

// =============================================================================
// Business Settings
// =============================================================================

#[derive(Debug, FromRow)]
struct SettingsRow {
    owner_id: String,
    business_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    currency: String,
    default_tax_rate: String,
    auto_apply_tax: bool,
    reference_format: String,
    default_design_id: Option<String>,
    default_accent_color: Option<String>,
    payment_terms_days: i64,
    plan: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingsRow> for BusinessSettings {
    type Error = DbError;

    fn try_from(row: SettingsRow) -> DbResult<Self> {
        Ok(BusinessSettings {
            default_tax_rate: decimal_column(
                "business_settings",
                "default_tax_rate",
                &row.default_tax_rate,
            )?,
            plan: Plan::from_str(&row.plan)
                .map_err(|e| DbError::invalid_data("business_settings", e.to_string()))?,
            owner_id: row.owner_id,
            business_name: row.business_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            currency: row.currency,
            auto_apply_tax: row.auto_apply_tax,
            reference_format: row.reference_format,
            default_design_id: row.default_design_id,
            default_accent_color: row.default_accent_color,
            payment_terms_days: row.payment_terms_days,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, owner_id: &str) -> DbResult<Option<BusinessSettings>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT owner_id, business_name, email, phone, address, currency, \
                    default_tax_rate, auto_apply_tax, reference_format, default_design_id, \
                    default_accent_color, payment_terms_days, plan, updated_at \
             FROM business_settings WHERE owner_id = ?1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BusinessSettings::try_from).transpose()
    }

    /// Stored settings, or the defaults for an owner who never saved any.
    pub async fn get_or_default(&self, owner_id: &str) -> DbResult<BusinessSettings> {
        Ok(self
            .get(owner_id)
            .await?
            .unwrap_or_else(|| BusinessSettings::defaults_for(owner_id, Utc::now())))
    }

    pub async fn upsert(&self, settings: &BusinessSettings) -> DbResult<()> {
        debug!(owner_id = %settings.owner_id, "Saving business settings");

        sqlx::query(
            "INSERT INTO business_settings (\
                owner_id, business_name, email, phone, address, currency, default_tax_rate, \
                auto_apply_tax, reference_format, default_design_id, default_accent_color, \
                payment_terms_days, plan, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
             ON CONFLICT (owner_id) DO UPDATE SET \
                business_name = excluded.business_name, \
                email = excluded.email, \
                phone = excluded.phone, \
                address = excluded.address, \
                currency = excluded.currency, \
                default_tax_rate = excluded.default_tax_rate, \
                auto_apply_tax = excluded.auto_apply_tax, \
                reference_format = excluded.reference_format, \
                default_design_id = excluded.default_design_id, \
                default_accent_color = excluded.default_accent_color, \
                payment_terms_days = excluded.payment_terms_days, \
                plan = excluded.plan, \
                updated_at = excluded.updated_at",
        )
        .bind(&settings.owner_id)
        .bind(&settings.business_name)
        .bind(&settings.email)
        .bind(&settings.phone)
        .bind(&settings.address)
        .bind(&settings.currency)
        .bind(settings.default_tax_rate.to_string())
        .bind(settings.auto_apply_tax)
        .bind(&settings.reference_format)
        .bind(&settings.default_design_id)
        .bind(&settings.default_accent_color)
        .bind(settings.payment_terms_days)
        .bind(settings.plan.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Payment Options
// =============================================================================

#[derive(Debug, FromRow)]
struct PaymentOptionsRow {
    owner_id: String,
    bank_enabled: bool,
    bank_name: Option<String>,
    bank_account_name: Option<String>,
    bank_account_number: Option<String>,
    bank_routing_number: Option<String>,
    card_enabled: bool,
    card_account_id: Option<String>,
    wallet_enabled: bool,
    wallet_address: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentOptionsRow> for PaymentOptions {
    fn from(row: PaymentOptionsRow) -> Self {
        PaymentOptions {
            owner_id: row.owner_id,
            bank_enabled: row.bank_enabled,
            bank_name: row.bank_name,
            bank_account_name: row.bank_account_name,
            bank_account_number: row.bank_account_number,
            bank_routing_number: row.bank_routing_number,
            card_enabled: row.card_enabled,
            card_account_id: row.card_account_id,
            wallet_enabled: row.wallet_enabled,
            wallet_address: row.wallet_address,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentOptionsRepository {
    pool: SqlitePool,
}

impl PaymentOptionsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentOptionsRepository { pool }
    }

    pub async fn get(&self, owner_id: &str) -> DbResult<Option<PaymentOptions>> {
        let row = sqlx::query_as::<_, PaymentOptionsRow>(
            "SELECT owner_id, bank_enabled, bank_name, bank_account_name, bank_account_number, \
                    bank_routing_number, card_enabled, card_account_id, wallet_enabled, \
                    wallet_address, updated_at \
             FROM payment_options WHERE owner_id = ?1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PaymentOptions::from))
    }

    /// Stored options, or "nothing configured".
    pub async fn get_or_default(&self, owner_id: &str) -> DbResult<PaymentOptions> {
        Ok(self
            .get(owner_id)
            .await?
            .unwrap_or_else(|| PaymentOptions::empty(owner_id, Utc::now())))
    }

    pub async fn upsert(&self, options: &PaymentOptions) -> DbResult<()> {
        debug!(owner_id = %options.owner_id, "Saving payment options");

        sqlx::query(
            "INSERT INTO payment_options (\
                owner_id, bank_enabled, bank_name, bank_account_name, bank_account_number, \
                bank_routing_number, card_enabled, card_account_id, wallet_enabled, \
                wallet_address, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT (owner_id) DO UPDATE SET \
                bank_enabled = excluded.bank_enabled, \
                bank_name = excluded.bank_name, \
                bank_account_name = excluded.bank_account_name, \
                bank_account_number = excluded.bank_account_number, \
                bank_routing_number = excluded.bank_routing_number, \
                card_enabled = excluded.card_enabled, \
                card_account_id = excluded.card_account_id, \
                wallet_enabled = excluded.wallet_enabled, \
                wallet_address = excluded.wallet_address, \
                updated_at = excluded.updated_at",
        )
        .bind(&options.owner_id)
        .bind(options.bank_enabled)
        .bind(&options.bank_name)
        .bind(&options.bank_account_name)
        .bind(&options.bank_account_number)
        .bind(&options.bank_routing_number)
        .bind(options.card_enabled)
        .bind(&options.card_account_id)
        .bind(options.wallet_enabled)
        .bind(&options.wallet_address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_missing_settings_read_as_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings().get_or_default("owner-1").await.unwrap();

        assert_eq!(settings.reference_format, "INV-001");
        assert_eq!(settings.plan, Plan::Free);
        assert!(db.settings().get("owner-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settings_upsert_overwrites() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut settings = BusinessSettings::defaults_for("owner-1", Utc::now());
        settings.default_tax_rate = Decimal::new(825, 2);
        db.settings().upsert(&settings).await.unwrap();

        settings.auto_apply_tax = true;
        settings.plan = Plan::Pro;
        db.settings().upsert(&settings).await.unwrap();

        let loaded = db.settings().get("owner-1").await.unwrap().unwrap();
        assert_eq!(loaded.default_tax_rate, Decimal::new(825, 2));
        assert!(loaded.auto_apply_tax);
        assert_eq!(loaded.plan, Plan::Pro);
    }

    #[tokio::test]
    async fn test_payment_options_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut options = db.payment_options().get_or_default("owner-1").await.unwrap();
        assert!(!options.wallet_enabled);

        options.wallet_enabled = true;
        options.wallet_address = Some("pay@acme.test".to_string());
        db.payment_options().upsert(&options).await.unwrap();

        let loaded = db.payment_options().get("owner-1").await.unwrap().unwrap();
        assert!(loaded.wallet_enabled);
        assert_eq!(loaded.wallet_address.as_deref(), Some("pay@acme.test"));
        assert!(db.payment_options().get("owner-2").await.unwrap().is_none());
    }
}
