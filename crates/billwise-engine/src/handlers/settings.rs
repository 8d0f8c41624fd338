//! Business profile, numbering, payment options and plan usage.

use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use billwise_core::validation::{
    validate_accent_color, validate_currency, validate_email, validate_name,
    validate_payment_terms, validate_reference_format, validate_tax_rate,
};
use billwise_core::{DocumentKind, PaymentMethod, PaymentOptions};

use super::{settings_for, usage_for, Outcome};
use crate::catalog::SettingsOp;
use crate::dispatcher::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::params::{
    self, BankTransferParams, CardPaymentsParams, DisablePaymentMethodParams, NoParams,
    SetDefaultTaxRateParams, SetReferenceFormatParams, UpdateBusinessSettingsParams,
    UpdateDefaultDesignParams, WalletPaymentsParams,
};
use crate::resolver::non_blank;

pub(crate) async fn handle(
    ctx: &EngineContext,
    op: SettingsOp,
    name: &str,
    owner_id: &str,
    arguments: Value,
) -> EngineResult<Outcome> {
    debug!(owner_id = %owner_id, function = %name, "Handling settings function");

    match op {
        SettingsOp::GetBusinessSettings => {
            params::parse::<NoParams>(name, arguments)?;
            get_business_settings(ctx, owner_id).await
        }
        SettingsOp::UpdateBusinessSettings => {
            update_business_settings(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::SetDefaultTaxRate => {
            set_default_tax_rate(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::SetReferenceFormat => {
            set_reference_format(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::PreviewNextReference => {
            params::parse::<NoParams>(name, arguments)?;
            preview_next_reference(ctx, owner_id).await
        }
        SettingsOp::UpdateDefaultDesign => {
            update_default_design(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::GetPaymentOptions => {
            params::parse::<NoParams>(name, arguments)?;
            get_payment_options(ctx, owner_id).await
        }
        SettingsOp::SetupBankTransfer => {
            setup_bank_transfer(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::SetupCardPayments => {
            setup_card_payments(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::SetupWalletPayments => {
            setup_wallet_payments(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::DisablePaymentMethod => {
            disable_payment_method(ctx, owner_id, params::parse(name, arguments)?).await
        }
        SettingsOp::CheckUsageLimits => {
            params::parse::<NoParams>(name, arguments)?;
            check_usage_limits(ctx, owner_id).await
        }
    }
}

// =============================================================================
// Business profile
// =============================================================================

async fn get_business_settings(ctx: &EngineContext, owner_id: &str) -> EngineResult<Outcome> {
    let settings = settings_for(ctx, owner_id).await?;
    let message = format!(
        "{}: currency {}, default tax {}%{}, payment terms {} days, numbering {}.",
        settings.business_name.as_deref().unwrap_or("Your business"),
        settings.currency,
        settings.default_tax_rate.normalize(),
        if settings.auto_apply_tax { " (applied automatically)" } else { "" },
        settings.payment_terms_days,
        settings.reference_format
    );
    Outcome::new(message, &settings)
}

async fn update_business_settings(
    ctx: &EngineContext,
    owner_id: &str,
    params: UpdateBusinessSettingsParams,
) -> EngineResult<Outcome> {
    let mut settings = settings_for(ctx, owner_id).await?;
    let mut changed = Vec::new();

    if let Some(name) = params.business_name.as_deref() {
        settings.business_name = Some(validate_name("business_name", name)?);
        changed.push("business name");
    }
    if let Some(email) = params.email.as_deref() {
        settings.email = match email.trim() {
            "" => None,
            e => Some(validate_email(e)?),
        };
        changed.push("email");
    }
    if params.phone.is_some() {
        settings.phone = non_blank(params.phone.as_deref());
        changed.push("phone");
    }
    if params.address.is_some() {
        settings.address = non_blank(params.address.as_deref());
        changed.push("address");
    }
    if let Some(currency) = params.currency.as_deref() {
        settings.currency = validate_currency(currency)?;
        changed.push("currency");
    }
    if let Some(days) = params.payment_terms_days {
        validate_payment_terms(days)?;
        settings.payment_terms_days = days;
        changed.push("payment terms");
    }
    if let Some(auto_apply) = params.auto_apply_tax {
        settings.auto_apply_tax = auto_apply;
        changed.push("automatic tax");
    }
    if changed.is_empty() {
        return Err(EngineError::validation("Nothing to change in the business settings"));
    }

    settings.updated_at = Utc::now();
    ctx.db.settings().upsert(&settings).await?;
    info!(owner_id = %owner_id, changed = ?changed, "Business settings updated");

    Outcome::new(format!("Updated {}.", changed.join(", ")), &settings)
}

async fn set_default_tax_rate(
    ctx: &EngineContext,
    owner_id: &str,
    params: SetDefaultTaxRateParams,
) -> EngineResult<Outcome> {
    validate_tax_rate(params.rate)?;
    let mut settings = settings_for(ctx, owner_id).await?;
    settings.default_tax_rate = params.rate;
    settings.auto_apply_tax = params.auto_apply.unwrap_or(true);
    settings.updated_at = Utc::now();
    ctx.db.settings().upsert(&settings).await?;
    info!(owner_id = %owner_id, rate = %params.rate, auto_apply = settings.auto_apply_tax, "Default tax rate set");

    let message = if settings.auto_apply_tax {
        format!(
            "Default tax rate is now {}% and will be applied to new documents.",
            params.rate.normalize()
        )
    } else {
        format!(
            "Default tax rate is now {}%; it is not applied automatically.",
            params.rate.normalize()
        )
    };
    Outcome::new(message, &settings)
}

async fn set_reference_format(
    ctx: &EngineContext,
    owner_id: &str,
    params: SetReferenceFormatParams,
) -> EngineResult<Outcome> {
    let template = params.format.trim().to_string();
    validate_reference_format(&template)?;

    let mut settings = settings_for(ctx, owner_id).await?;
    settings.reference_format = template;
    settings.updated_at = Utc::now();
    ctx.db.settings().upsert(&settings).await?;

    let next = ctx
        .sequencer
        .next_reference(owner_id, DocumentKind::Invoice, Utc::now().date_naive())
        .await;
    info!(owner_id = %owner_id, format = %settings.reference_format, next = %next, "Reference format set");

    Outcome::new(
        format!(
            "Numbering now follows {}. The next document will be {}.",
            settings.reference_format, next
        ),
        json!({ "reference_format": settings.reference_format, "next_reference": next }),
    )
}

async fn preview_next_reference(ctx: &EngineContext, owner_id: &str) -> EngineResult<Outcome> {
    let settings = settings_for(ctx, owner_id).await?;
    let next = ctx
        .sequencer
        .next_reference(owner_id, DocumentKind::Invoice, Utc::now().date_naive())
        .await;

    Outcome::new(
        format!("The next invoice or estimate will be {}.", next),
        json!({ "reference_format": settings.reference_format, "next_reference": next }),
    )
}

async fn update_default_design(
    ctx: &EngineContext,
    owner_id: &str,
    params: UpdateDefaultDesignParams,
) -> EngineResult<Outcome> {
    let design_id = non_blank(params.design_id.as_deref());
    let accent_color = params
        .accent_color
        .as_deref()
        .map(validate_accent_color)
        .transpose()?;
    if design_id.is_none() && accent_color.is_none() {
        return Err(EngineError::validation("Give a design_id or an accent_color"));
    }

    let mut settings = settings_for(ctx, owner_id).await?;
    if design_id.is_some() {
        settings.default_design_id = design_id;
    }
    if accent_color.is_some() {
        settings.default_accent_color = accent_color;
    }
    settings.updated_at = Utc::now();
    ctx.db.settings().upsert(&settings).await?;

    Outcome::new(
        format!(
            "New documents will use {}{}.",
            settings.default_design_id.as_deref().unwrap_or("the default template"),
            settings
                .default_accent_color
                .as_deref()
                .map(|color| format!(" with accent {}", color))
                .unwrap_or_default()
        ),
        &settings,
    )
}

// =============================================================================
// Payment options
// =============================================================================

/// Payment options with account numbers masked.
#[derive(Debug, Serialize)]
struct PaymentOptionsView {
    enabled: Vec<PaymentMethod>,
    bank_name: Option<String>,
    bank_account_name: Option<String>,
    bank_account_number: Option<String>,
    card_account_id: Option<String>,
    wallet_address: Option<String>,
}

impl From<&PaymentOptions> for PaymentOptionsView {
    fn from(options: &PaymentOptions) -> Self {
        PaymentOptionsView {
            enabled: PaymentMethod::ALL
                .into_iter()
                .filter(|m| options.is_configured(*m))
                .collect(),
            bank_name: options.bank_name.clone(),
            bank_account_name: options.bank_account_name.clone(),
            bank_account_number: options.bank_account_number.as_deref().map(mask),
            card_account_id: options.card_account_id.clone(),
            wallet_address: options.wallet_address.clone(),
        }
    }
}

/// `12345678` → `****5678`
fn mask(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

fn payment_message(options: &PaymentOptions, lead: &str) -> String {
    let enabled: Vec<&str> = PaymentMethod::ALL
        .into_iter()
        .filter(|m| options.is_configured(*m))
        .map(|m| m.setup_hint().0)
        .collect();
    if enabled.is_empty() {
        format!("{} No payment methods are set up.", lead)
    } else {
        format!("{} Enabled: {}.", lead, enabled.join(", "))
    }
}

async fn get_payment_options(ctx: &EngineContext, owner_id: &str) -> EngineResult<Outcome> {
    let options = ctx.db.payment_options().get_or_default(owner_id).await?;
    Outcome::new(
        payment_message(&options, "Payment options."),
        PaymentOptionsView::from(&options),
    )
}

async fn save_payment_options(
    ctx: &EngineContext,
    mut options: PaymentOptions,
    lead: &str,
) -> EngineResult<Outcome> {
    options.updated_at = Utc::now();
    ctx.db.payment_options().upsert(&options).await?;
    info!(owner_id = %options.owner_id, "Payment options saved");
    Outcome::new(
        payment_message(&options, lead),
        PaymentOptionsView::from(&options),
    )
}

async fn setup_bank_transfer(
    ctx: &EngineContext,
    owner_id: &str,
    params: BankTransferParams,
) -> EngineResult<Outcome> {
    let account_number = validate_name("account_number", &params.account_number)?;
    let mut options = ctx.db.payment_options().get_or_default(owner_id).await?;
    options.bank_enabled = true;
    options.bank_name = non_blank(params.bank_name.as_deref());
    options.bank_account_name = non_blank(params.account_name.as_deref());
    options.bank_account_number = Some(account_number);
    options.bank_routing_number = non_blank(params.routing_number.as_deref());
    save_payment_options(ctx, options, "Bank transfer is set up.").await
}

async fn setup_card_payments(
    ctx: &EngineContext,
    owner_id: &str,
    params: CardPaymentsParams,
) -> EngineResult<Outcome> {
    let account_id = validate_name("account_id", &params.account_id)?;
    let mut options = ctx.db.payment_options().get_or_default(owner_id).await?;
    options.card_enabled = true;
    options.card_account_id = Some(account_id);
    save_payment_options(ctx, options, "Card payments are set up.").await
}

async fn setup_wallet_payments(
    ctx: &EngineContext,
    owner_id: &str,
    params: WalletPaymentsParams,
) -> EngineResult<Outcome> {
    let address = if params.address.contains('@') {
        validate_email(&params.address)?
    } else {
        validate_name("address", &params.address)?
    };
    let mut options = ctx.db.payment_options().get_or_default(owner_id).await?;
    options.wallet_enabled = true;
    options.wallet_address = Some(address);
    save_payment_options(ctx, options, "Wallet payments are set up.").await
}

async fn disable_payment_method(
    ctx: &EngineContext,
    owner_id: &str,
    params: DisablePaymentMethodParams,
) -> EngineResult<Outcome> {
    let method = PaymentMethod::from_str(&params.method)?;
    let mut options = ctx.db.payment_options().get_or_default(owner_id).await?;
    // Details are kept so the method can be switched back on
    match method {
        PaymentMethod::Bank => options.bank_enabled = false,
        PaymentMethod::Card => options.card_enabled = false,
        PaymentMethod::Wallet => options.wallet_enabled = false,
    }
    let lead = format!("{} is turned off.", method.setup_hint().0);
    save_payment_options(ctx, options, &lead).await
}

// =============================================================================
// Plan
// =============================================================================

async fn check_usage_limits(ctx: &EngineContext, owner_id: &str) -> EngineResult<Outcome> {
    let settings = settings_for(ctx, owner_id).await?;
    let usage = usage_for(ctx, &settings).await?;

    let message = match usage.limit {
        Some(limit) => format!(
            "{} plan: {} of {} documents used, {} left.",
            capitalize(usage.plan.as_str()),
            usage.used,
            limit,
            usage.remaining.unwrap_or_default()
        ),
        None => format!(
            "{} plan: {} documents, no limit.",
            capitalize(usage.plan.as_str()),
            usage.used
        ),
    };
    Outcome::new(message, &usage)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dispatcher::Dispatcher;
    use crate::error::ErrorCode;
    use billwise_core::{BusinessSettings, Plan};
    use billwise_db::{Database, DbConfig};

    const OWNER: &str = "owner-1";

    async fn setup() -> Dispatcher {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Dispatcher::new(db, EngineConfig::for_tests())
    }

    #[tokio::test]
    async fn test_defaults_use_configured_payment_terms() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = EngineConfig {
            default_payment_terms_days: 14,
            ..EngineConfig::for_tests()
        };
        let dispatcher = Dispatcher::new(db, config);

        let result = dispatcher
            .execute("get_business_settings", json!({}), OWNER)
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["payment_terms_days"], 14);
    }

    #[tokio::test]
    async fn test_update_business_settings_validates() {
        let dispatcher = setup().await;
        let bad = dispatcher
            .execute("update_business_settings", json!({ "currency": "dollars" }), OWNER)
            .await;
        assert_eq!(bad.code, Some(ErrorCode::ValidationError));

        let good = dispatcher
            .execute(
                "update_business_settings",
                json!({ "business_name": "Studio North", "currency": "eur" }),
                OWNER,
            )
            .await;
        assert!(good.success, "{}", good.message);
        let stored = dispatcher.context().db.settings().get(OWNER).await.unwrap().unwrap();
        assert_eq!(stored.currency, "EUR");
        assert_eq!(stored.business_name.as_deref(), Some("Studio North"));
    }

    #[tokio::test]
    async fn test_default_tax_rate_applies_to_new_invoices() {
        let dispatcher = setup().await;
        let set = dispatcher
            .execute("set_default_tax_rate", json!({ "rate": 10 }), OWNER)
            .await;
        assert!(set.success, "{}", set.message);

        let created = dispatcher
            .execute(
                "create_invoice",
                json!({ "client_name": "Acme", "line_items": [{ "name": "Work", "unit_price": 100 }] }),
                OWNER,
            )
            .await;
        assert!(created.success);
        assert!(created.message.contains("$110.00"), "{}", created.message);
    }

    #[tokio::test]
    async fn test_reference_format_change_is_previewed() {
        let dispatcher = setup().await;
        let bad = dispatcher
            .execute("set_reference_format", json!({ "format": "NUMBERS PLEASE" }), OWNER)
            .await;
        assert_eq!(bad.code, Some(ErrorCode::ValidationError));

        let good = dispatcher
            .execute("set_reference_format", json!({ "format": "QT-0001" }), OWNER)
            .await;
        assert!(good.success, "{}", good.message);
        assert_eq!(good.data.unwrap()["next_reference"], "QT-0001");

        let preview = dispatcher
            .execute("preview_next_reference", Value::Null, OWNER)
            .await;
        assert!(preview.message.contains("QT-0001"));
    }

    #[tokio::test]
    async fn test_payment_setup_enables_document_methods() {
        let dispatcher = setup().await;
        let bank = dispatcher
            .execute(
                "setup_bank_transfer",
                json!({ "bank_name": "First Bank", "account_number": "12345678" }),
                OWNER,
            )
            .await;
        assert!(bank.success, "{}", bank.message);
        assert_eq!(bank.data.unwrap()["bank_account_number"], "****5678");

        dispatcher
            .execute("create_invoice", json!({ "client_name": "Acme" }), OWNER)
            .await;
        let toggled = dispatcher
            .execute("update_invoice_payment_methods", json!({ "bank": true }), OWNER)
            .await;
        assert!(toggled.success, "{}", toggled.message);

        let off = dispatcher
            .execute("disable_payment_method", json!({ "method": "bank_transfer" }), OWNER)
            .await;
        assert!(off.success);
        let options = dispatcher
            .context()
            .db
            .payment_options()
            .get(OWNER)
            .await
            .unwrap()
            .unwrap();
        assert!(!options.bank_enabled);
        assert_eq!(options.bank_account_number.as_deref(), Some("12345678"));
    }

    #[tokio::test]
    async fn test_wallet_address_must_be_email_shaped() {
        let dispatcher = setup().await;
        let bad = dispatcher
            .execute("setup_wallet_payments", json!({ "address": "pay@@me" }), OWNER)
            .await;
        assert_eq!(bad.code, Some(ErrorCode::ValidationError));

        let good = dispatcher
            .execute("setup_wallet_payments", json!({ "email": "pay@studio.test" }), OWNER)
            .await;
        assert!(good.success, "{}", good.message);
    }

    #[tokio::test]
    async fn test_usage_limits_by_plan() {
        let dispatcher = setup().await;
        dispatcher
            .execute("create_invoice", json!({ "client_name": "Acme" }), OWNER)
            .await;

        let free = dispatcher
            .execute("check_usage_limits", json!({}), OWNER)
            .await;
        let data = free.data.unwrap();
        assert_eq!(data["used"], 1);
        assert_eq!(data["limit"], 25);
        assert_eq!(data["remaining"], 24);

        let mut settings = BusinessSettings::defaults_for(OWNER, Utc::now());
        settings.plan = Plan::Pro;
        dispatcher.context().db.settings().upsert(&settings).await.unwrap();

        let pro = dispatcher
            .execute("check_usage_limits", json!({}), OWNER)
            .await;
        assert!(pro.message.contains("no limit"));
        assert!(pro.data.unwrap()["limit"].is_null());
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask("12345678"), "****5678");
        assert_eq!(mask("123"), "123");
    }
}
