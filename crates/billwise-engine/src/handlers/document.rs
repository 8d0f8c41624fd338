//! Invoice and estimate handlers.
//!
//! Creation and duplication hold a creation permit for the whole write;
//! edits resolve their target through [`crate::lifecycle::resolve_target`]
//! and always recompute totals from the stored line items.

use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use billwise_core::calculator::DiscountType;
use billwise_core::status::ensure_manual_transition;
use billwise_core::validation::{
    validate_accent_color, validate_discount_value, validate_line_item_count, validate_name,
    validate_notes, validate_quantity, validate_tax_rate, validate_unit_price,
};
use billwise_core::{
    BusinessSettings, Document, DocumentKind, DocumentStatus, LineItem, PaymentMethod,
    DEFAULT_ESTIMATE_VALIDITY_DAYS,
};
use billwise_db::{generate_id, DbError};

use super::{describe, ensure_within_plan, limit, money, settings_for, DocumentDto, DocumentSummary, Outcome};
use crate::catalog::DocumentOp;
use crate::dispatcher::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{days_after, resolve_target, DocumentLifecycle, ResolvedTarget, TargetPolicy};
use crate::params::{
    self, AddLineItemParams, CreateDocumentParams, DeleteDocumentParams, DesignParams,
    DocumentTarget, LineItemInput, LineSelector, ListRecentParams, PaymentMethodsParams,
    RemoveLineItemParams, SearchDocumentsParams, UpdateDocumentParams, UpdateLineItemParams,
    UpdateStatusParams,
};
use crate::resolver::{non_blank, ClientInput, Resolution};

const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Inserts tried when a concurrent writer took the sequenced number.
const INSERT_ATTEMPTS: u32 = 3;

pub(crate) async fn handle(
    ctx: &EngineContext,
    kind: DocumentKind,
    op: DocumentOp,
    name: &str,
    owner_id: &str,
    arguments: Value,
) -> EngineResult<Outcome> {
    debug!(owner_id = %owner_id, function = %name, kind = %kind, "Handling document function");

    match op {
        DocumentOp::Create => create(ctx, kind, owner_id, params::parse(name, arguments)?).await,
        DocumentOp::Get => get(ctx, kind, owner_id, params::parse(name, arguments)?).await,
        DocumentOp::Search => search(ctx, kind, owner_id, params::parse(name, arguments)?).await,
        DocumentOp::ListRecent => {
            list_recent(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::Update => update(ctx, kind, owner_id, params::parse(name, arguments)?).await,
        DocumentOp::AddLineItem => {
            add_line_item(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::UpdateLineItem => {
            update_line_item(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::RemoveLineItem => {
            remove_line_item(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::UpdatePaymentMethods => {
            update_payment_methods(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::UpdateDesign => {
            update_design(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::Duplicate => duplicate(ctx, kind, owner_id, params::parse(name, arguments)?).await,
        DocumentOp::Delete => delete(ctx, kind, owner_id, params::parse(name, arguments)?).await,
        DocumentOp::UpdateStatus => {
            update_status(ctx, kind, owner_id, params::parse(name, arguments)?).await
        }
        DocumentOp::Convert => convert(ctx, kind, owner_id, params::parse(name, arguments)?).await,
    }
}

// =============================================================================
// Create / duplicate
// =============================================================================

#[derive(Debug, Serialize)]
struct Created {
    #[serde(flatten)]
    document: DocumentDto,
    client_resolution: Resolution,
}

async fn create(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: CreateDocumentParams,
) -> EngineResult<Outcome> {
    // Reject bad input before taking the creation slot
    let id = generate_id();
    let line_items = build_line_items(&id, &params.line_items)?;
    let (discount_type, discount_value) = if params.discount_type.is_some() || params.discount_value.is_some() {
        discount_from(None, Decimal::ZERO, params.discount_type.as_deref(), params.discount_value)?
    } else {
        (None, Decimal::ZERO)
    };
    if let Some(rate) = params.tax_rate {
        validate_tax_rate(rate)?;
    }
    let notes = validate_notes(params.notes.as_deref())?;
    let accent_color = params
        .accent_color
        .as_deref()
        .map(validate_accent_color)
        .transpose()?;

    let fingerprint = fingerprint(kind, &params)?;
    let permit = ctx.guard.acquire(owner_id, kind, &fingerprint).await?;
    // Client lookup and numbering are shared by both kinds
    let lease = ctx.sequencer.lease(owner_id).await;

    let settings = settings_for(ctx, owner_id).await?;
    ensure_within_plan(ctx, &settings).await?;
    let payment = ctx.db.payment_options().get_or_default(owner_id).await?;

    let client = ctx
        .resolver
        .resolve(
            owner_id,
            &ClientInput {
                name: params.client_name.clone(),
                email: params.client_email.clone(),
                phone: params.client_phone.clone(),
                address: params.client_address.clone(),
            },
        )
        .await?;

    let issue_date = params.issue_date.unwrap_or_else(today);
    let due_date = params
        .due_date
        .unwrap_or_else(|| default_due_date(kind, issue_date, &settings));
    let reference_number = ctx.sequencer.next_reference(owner_id, kind, issue_date).await;
    let now = Utc::now();

    let mut doc = Document {
        id,
        owner_id: owner_id.to_string(),
        kind,
        reference_number,
        client_id: client.client.id.clone(),
        client_name: client.client.name.clone(),
        status: DocumentStatus::Draft,
        issue_date,
        due_date: Some(due_date),
        subtotal: Decimal::ZERO,
        discount_type,
        discount_value,
        tax_percentage: settings.effective_tax_rate(params.tax_rate),
        tax_amount: Decimal::ZERO,
        total: Decimal::ZERO,
        notes,
        design_id: non_blank(params.design_id.as_deref()).or_else(|| settings.default_design_id.clone()),
        accent_color: accent_color.or_else(|| settings.default_accent_color.clone()),
        payment_flags: payment.default_flags(),
        is_accepted: false,
        accepted_at: None,
        converted_to_invoice_id: None,
        converted_at: None,
        source_estimate_id: None,
        created_at: now,
        updated_at: now,
        line_items,
    };
    recalculate(&mut doc);
    insert_new(ctx, &mut doc).await?;
    drop(lease);
    permit.complete();

    info!(
        owner_id = %owner_id,
        kind = %kind,
        reference = %doc.reference_number,
        client = %doc.client_name,
        items = doc.line_items.len(),
        "Document created"
    );

    let message = format!(
        "Created {} {} for {}: total {} ({}).",
        kind,
        doc.reference_number,
        doc.client_name,
        money(doc.total, &settings.currency),
        client.resolution.describe()
    );
    Outcome::new(
        message,
        Created {
            document: DocumentDto::from(&doc),
            client_resolution: client.resolution,
        },
    )
}

async fn duplicate(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: DocumentTarget,
) -> EngineResult<Outcome> {
    let target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let source = &target.document;

    let permit = ctx
        .guard
        .acquire(owner_id, kind, &format!("duplicate:{}", source.id))
        .await?;
    let lease = ctx.sequencer.lease(owner_id).await;

    let settings = settings_for(ctx, owner_id).await?;
    ensure_within_plan(ctx, &settings).await?;
    let payment = ctx.db.payment_options().get_or_default(owner_id).await?;

    let issue_date = today();
    let id = generate_id();
    let now = Utc::now();
    let mut copy = Document {
        id: id.clone(),
        reference_number: ctx.sequencer.next_reference(owner_id, kind, issue_date).await,
        status: DocumentStatus::Draft,
        issue_date,
        due_date: Some(default_due_date(kind, issue_date, &settings)),
        is_accepted: false,
        accepted_at: None,
        converted_to_invoice_id: None,
        converted_at: None,
        source_estimate_id: None,
        created_at: now,
        updated_at: now,
        line_items: source
            .line_items
            .iter()
            .map(|item| LineItem {
                id: generate_id(),
                document_id: id.clone(),
                ..item.clone()
            })
            .collect(),
        ..source.clone()
    };
    // Methods switched off since the original was written stay off
    for method in PaymentMethod::ALL {
        if !payment.is_configured(method) {
            copy.payment_flags.set(method, false);
        }
    }
    recalculate(&mut copy);
    insert_new(ctx, &mut copy).await?;
    drop(lease);
    permit.complete();

    info!(
        owner_id = %owner_id,
        kind = %kind,
        source = %source.reference_number,
        reference = %copy.reference_number,
        "Document duplicated"
    );

    let base = format!(
        "Copied {} {} into new draft {} for {}: total {}.",
        kind,
        source.reference_number,
        copy.reference_number,
        copy.client_name,
        money(copy.total, &settings.currency)
    );
    Outcome::new(target.message(base), DocumentDto::from(&copy))
}

/// Inserts a new document and its lines. Callers hold the owner's
/// sequence lease. A number taken by another process writing to the same
/// database is re-sequenced; failed lines remove the document again.
async fn insert_new(ctx: &EngineContext, doc: &mut Document) -> EngineResult<()> {
    let repo = ctx.db.documents(doc.kind);

    let mut attempt = 1;
    loop {
        match repo.insert(doc).await {
            Ok(()) => break,
            Err(DbError::UniqueViolation { value, .. }) if attempt < INSERT_ATTEMPTS => {
                attempt += 1;
                warn!(reference = %value, attempt, "Reference already taken, sequencing again");
                doc.reference_number = ctx
                    .sequencer
                    .next_reference(&doc.owner_id, doc.kind, doc.issue_date)
                    .await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Err(e) = repo.insert_items(&doc.owner_id, &doc.line_items).await {
        error!(
            reference = %doc.reference_number,
            error = %e,
            "Line items failed, removing document"
        );
        if let Err(cleanup) = repo.delete(&doc.owner_id, &doc.id).await {
            error!(reference = %doc.reference_number, error = %cleanup, "Compensating delete failed");
        }
        return Err(EngineError::PartialFailure(format!(
            "Could not save the line items of {} {}; nothing was created",
            doc.kind, doc.reference_number
        )));
    }
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

async fn get(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: DocumentTarget,
) -> EngineResult<Outcome> {
    let target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let settings = settings_for(ctx, owner_id).await?;
    let doc = &target.document;

    let base = format!(
        "{} {} for {}: {} line item(s), total {}, status {}.",
        kind.label(),
        doc.reference_number,
        doc.client_name,
        doc.line_items.len(),
        money(doc.total, &settings.currency),
        doc.status
    );
    Outcome::new(target.message(base), DocumentDto::from(doc))
}

async fn search(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: SearchDocumentsParams,
) -> EngineResult<Outcome> {
    let status = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(DocumentStatus::from_str)
        .transpose()?;
    let query = params.query.unwrap_or_default();

    let docs = ctx
        .db
        .documents(kind)
        .search(owner_id, &query, status, limit(params.limit, DEFAULT_SEARCH_LIMIT))
        .await?;
    let settings = settings_for(ctx, owner_id).await?;

    let message = if docs.is_empty() {
        format!("No {}s match.", kind)
    } else {
        format!("Found {} {}(s): {}.", docs.len(), kind, listing(&docs, &settings))
    };
    Outcome::new(message, summaries(&docs))
}

async fn list_recent(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: ListRecentParams,
) -> EngineResult<Outcome> {
    let docs = ctx
        .db
        .documents(kind)
        .recent(owner_id, limit(params.limit, ctx.config.recent_window))
        .await?;
    let settings = settings_for(ctx, owner_id).await?;

    let message = if docs.is_empty() {
        format!("There are no {}s yet.", kind)
    } else {
        format!("Most recent {}s: {}.", kind, listing(&docs, &settings))
    };
    Outcome::new(message, summaries(&docs))
}

fn listing(docs: &[Document], settings: &BusinessSettings) -> String {
    docs.iter()
        .map(|doc| describe(doc, &settings.currency))
        .collect::<Vec<_>>()
        .join(", ")
}

fn summaries(docs: &[Document]) -> Value {
    json!({
        "count": docs.len(),
        "documents": docs.iter().map(DocumentSummary::from).collect::<Vec<_>>(),
    })
}

// =============================================================================
// Edits
// =============================================================================

async fn update(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: UpdateDocumentParams,
) -> EngineResult<Outcome> {
    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let doc = &mut target.document;
    let mut changed = Vec::new();

    if let Some(name) = params.client_name.as_deref() {
        let input = ClientInput {
            name: name.to_string(),
            email: params.client_email.clone(),
            ..ClientInput::default()
        };
        let client = {
            let _lease = ctx.sequencer.lease(owner_id).await;
            ctx.resolver.resolve(owner_id, &input).await?
        };
        doc.client_id = client.client.id;
        doc.client_name = client.client.name;
        changed.push("client");
    }
    if let Some(rate) = params.tax_rate {
        validate_tax_rate(rate)?;
        doc.tax_percentage = rate;
        changed.push("tax rate");
    }
    if params.discount_type.is_some() || params.discount_value.is_some() {
        let (discount_type, discount_value) = discount_from(
            doc.discount_type,
            doc.discount_value,
            params.discount_type.as_deref(),
            params.discount_value,
        )?;
        doc.discount_type = discount_type;
        doc.discount_value = discount_value;
        changed.push("discount");
    }
    if let Some(date) = params.issue_date {
        doc.issue_date = date;
        changed.push("issue date");
    }
    if let Some(date) = params.due_date {
        doc.due_date = Some(date);
        changed.push(match kind {
            DocumentKind::Invoice => "due date",
            DocumentKind::Estimate => "valid-until date",
        });
    }
    if params.notes.is_some() {
        doc.notes = validate_notes(params.notes.as_deref())?;
        changed.push("notes");
    }

    if changed.is_empty() {
        return Err(EngineError::validation(format!(
            "Nothing to change on {} {}: give at least one field",
            kind, doc.reference_number
        )));
    }

    recalculate(doc);
    ctx.db.documents(kind).update(doc).await?;
    info!(owner_id = %owner_id, reference = %doc.reference_number, changed = ?changed, "Document updated");

    let settings = settings_for(ctx, owner_id).await?;
    let base = format!(
        "Updated {} of {} {}. Total is now {}.",
        changed.join(", "),
        kind,
        doc.reference_number,
        money(doc.total, &settings.currency)
    );
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn add_line_item(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: AddLineItemParams,
) -> EngineResult<Outcome> {
    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let doc = &mut target.document;

    validate_line_item_count(doc.line_items.len() + 1)?;
    let item = new_line_item(
        &doc.id,
        doc.line_items.len(),
        &LineItemInput {
            name: params.name,
            description: params.description,
            quantity: params.quantity,
            unit_price: params.unit_price,
        },
    )?;
    let item_name = item.name.clone();
    doc.line_items.push(item);
    save_lines(ctx, doc).await?;

    let settings = settings_for(ctx, owner_id).await?;
    let base = format!(
        "Added {} to {} {}. Total is now {}.",
        item_name,
        kind,
        doc.reference_number,
        money(doc.total, &settings.currency)
    );
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn update_line_item(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: UpdateLineItemParams,
) -> EngineResult<Outcome> {
    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let doc = &mut target.document;

    let index = select_line(&doc.line_items, &params.selector)?;
    let item = &mut doc.line_items[index];
    let mut touched = false;

    if let Some(name) = params.new_name.as_deref() {
        item.name = validate_name("new_name", name)?;
        touched = true;
    }
    if params.description.is_some() {
        item.description = non_blank(params.description.as_deref());
        touched = true;
    }
    if let Some(quantity) = params.quantity {
        validate_quantity(quantity)?;
        item.quantity = quantity;
        touched = true;
    }
    if let Some(price) = params.unit_price {
        validate_unit_price(price)?;
        item.unit_price = price;
        touched = true;
    }
    if !touched {
        return Err(EngineError::validation(
            "Nothing to change on the line item: give new_name, description, quantity or unit_price",
        ));
    }

    let item_name = item.name.clone();
    save_lines(ctx, doc).await?;

    let settings = settings_for(ctx, owner_id).await?;
    let base = format!(
        "Updated {} on {} {}. Total is now {}.",
        item_name,
        kind,
        doc.reference_number,
        money(doc.total, &settings.currency)
    );
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn remove_line_item(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: RemoveLineItemParams,
) -> EngineResult<Outcome> {
    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let doc = &mut target.document;

    let index = select_line(&doc.line_items, &params.selector)?;
    let removed = doc.line_items.remove(index);
    save_lines(ctx, doc).await?;

    let settings = settings_for(ctx, owner_id).await?;
    let base = format!(
        "Removed {} from {} {}. Total is now {}.",
        removed.name,
        kind,
        doc.reference_number,
        money(doc.total, &settings.currency)
    );
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn update_payment_methods(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: PaymentMethodsParams,
) -> EngineResult<Outcome> {
    let requested = [
        (PaymentMethod::Bank, params.bank),
        (PaymentMethod::Card, params.card),
        (PaymentMethod::Wallet, params.wallet),
    ];
    if requested.iter().all(|(_, enabled)| enabled.is_none()) {
        return Err(EngineError::validation(
            "Say which payment methods to turn on or off: bank, card or wallet",
        ));
    }

    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let options = ctx.db.payment_options().get_or_default(owner_id).await?;
    let doc = &mut target.document;

    for (method, enabled) in requested {
        let Some(enabled) = enabled else { continue };
        if enabled && !options.is_configured(method) {
            let (label, command) = method.setup_hint();
            return Err(EngineError::validation(format!(
                "{} is not set up yet. Use {} to configure it first.",
                label, command
            )));
        }
        doc.payment_flags.set(method, enabled);
    }
    ctx.db.documents(kind).update(doc).await?;

    let enabled = doc.payment_flags.enabled();
    let listed = if enabled.is_empty() {
        "none".to_string()
    } else {
        enabled
            .iter()
            .map(PaymentMethod::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let base = format!("Payment methods on {} {}: {}.", kind, doc.reference_number, listed);
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn update_design(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: DesignParams,
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

    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let doc = &mut target.document;
    if design_id.is_some() {
        doc.design_id = design_id;
    }
    if accent_color.is_some() {
        doc.accent_color = accent_color;
    }
    ctx.db.documents(kind).update(doc).await?;

    let base = format!(
        "Design of {} {} is now {}{}.",
        kind,
        doc.reference_number,
        doc.design_id.as_deref().unwrap_or("the default template"),
        doc.accent_color
            .as_deref()
            .map(|color| format!(" with accent {}", color))
            .unwrap_or_default()
    );
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn delete(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: DeleteDocumentParams,
) -> EngineResult<Outcome> {
    let reference = validate_name("reference_number", &params.reference_number)?;
    let target = resolve_target(
        &ctx.db,
        owner_id,
        kind,
        Some(&reference),
        ctx.config.recent_window,
        TargetPolicy::Strict,
    )
    .await?;
    let doc = &target.document;

    ctx.db.documents(kind).delete(owner_id, &doc.id).await?;
    info!(owner_id = %owner_id, kind = %kind, reference = %doc.reference_number, "Document deleted");

    let base = format!("Deleted {} {} for {}.", kind, doc.reference_number, doc.client_name);
    Outcome::new(
        target.message(base),
        json!({ "deleted": doc.reference_number, "id": doc.id }),
    )
}

// =============================================================================
// Estimate lifecycle
// =============================================================================

async fn update_status(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: UpdateStatusParams,
) -> EngineResult<Outcome> {
    let to = DocumentStatus::from_str(&params.status)?;
    let mut target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;
    let doc = &mut target.document;
    let from = doc.status;

    ensure_manual_transition(kind, &doc.reference_number, from, to)?;
    doc.status = to;
    if to == DocumentStatus::Accepted {
        doc.is_accepted = true;
        doc.accepted_at.get_or_insert_with(Utc::now);
    }
    ctx.db.documents(kind).update(doc).await?;
    info!(owner_id = %owner_id, reference = %doc.reference_number, from = %from, to = %to, "Status changed");

    let base = format!(
        "{} {} moved from {} to {}.",
        kind.label(),
        doc.reference_number,
        from,
        to
    );
    let data = DocumentDto::from(&*doc);
    Outcome::new(target.message(base), data)
}

async fn convert(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    params: DocumentTarget,
) -> EngineResult<Outcome> {
    let target = resolve(ctx, kind, owner_id, params.reference_number.as_deref()).await?;

    // One conversion of an estimate at a time, and no instant repeat
    let permit = ctx
        .guard
        .acquire(
            owner_id,
            DocumentKind::Invoice,
            &format!("convert:{}", target.document.id),
        )
        .await?;
    // The estimate's number moves into the invoice table
    let lease = ctx.sequencer.lease(owner_id).await;

    let settings = settings_for(ctx, owner_id).await?;
    let conversion = DocumentLifecycle::new(ctx.db.clone())
        .convert(target.document.clone(), settings.payment_terms_days)
        .await?;
    drop(lease);
    permit.complete();

    let base = format!(
        "Converted estimate {} into invoice {} for {}: total {}.",
        conversion.estimate.reference_number,
        conversion.invoice.reference_number,
        conversion.invoice.client_name,
        money(conversion.invoice.total, &settings.currency)
    );
    Outcome::new(
        target.message(base),
        json!({
            "estimate": DocumentDto::from(&conversion.estimate),
            "invoice": DocumentDto::from(&conversion.invoice),
        }),
    )
}

// =============================================================================
// Helpers
// =============================================================================

async fn resolve(
    ctx: &EngineContext,
    kind: DocumentKind,
    owner_id: &str,
    reference: Option<&str>,
) -> EngineResult<ResolvedTarget> {
    resolve_target(
        &ctx.db,
        owner_id,
        kind,
        reference,
        ctx.config.recent_window,
        TargetPolicy::FallbackToRecent,
    )
    .await
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn default_due_date(kind: DocumentKind, issue_date: NaiveDate, settings: &BusinessSettings) -> NaiveDate {
    let days = match kind {
        DocumentKind::Invoice => settings.payment_terms_days,
        DocumentKind::Estimate => DEFAULT_ESTIMATE_VALIDITY_DAYS,
    };
    days_after(issue_date, days)
}

/// Same kind and arguments, lower-cased.
fn fingerprint(kind: DocumentKind, params: &impl Serialize) -> EngineResult<String> {
    let body = serde_json::to_string(params)
        .map_err(|e| EngineError::internal(format!("Could not fingerprint request: {}", e)))?;
    Ok(format!("{}:{}", kind, body.to_lowercase()))
}

fn build_line_items(document_id: &str, inputs: &[LineItemInput]) -> EngineResult<Vec<LineItem>> {
    validate_line_item_count(inputs.len())?;
    inputs
        .iter()
        .enumerate()
        .map(|(position, input)| new_line_item(document_id, position, input))
        .collect()
}

fn new_line_item(document_id: &str, position: usize, input: &LineItemInput) -> EngineResult<LineItem> {
    let name = validate_name("line_items.name", &input.name)?;
    validate_quantity(input.quantity)?;
    validate_unit_price(input.unit_price)?;
    Ok(LineItem {
        id: generate_id(),
        document_id: document_id.to_string(),
        name,
        description: non_blank(input.description.as_deref()),
        quantity: input.quantity,
        unit_price: input.unit_price,
        position: position as i64,
    })
}

/// Discount after applying a requested change. `none` removes it; a value
/// without a type keeps the current type (percentage when there is none).
fn discount_from(
    current_type: Option<DiscountType>,
    current_value: Decimal,
    requested_type: Option<&str>,
    requested_value: Option<Decimal>,
) -> EngineResult<(Option<DiscountType>, Decimal)> {
    let requested_type = requested_type.map(str::trim).filter(|t| !t.is_empty());
    if requested_type.is_some_and(|t| t.eq_ignore_ascii_case("none")) {
        return Ok((None, Decimal::ZERO));
    }

    let value = requested_value.unwrap_or(current_value);
    validate_discount_value(value)?;
    let discount_type = match requested_type {
        Some(t) => DiscountType::from_str(t)?,
        None => current_type.unwrap_or(DiscountType::Percentage),
    };
    Ok((Some(discount_type), value))
}

/// Line picked by 1-based position, else by name: exact first, then partial.
fn select_line(items: &[LineItem], selector: &LineSelector) -> EngineResult<usize> {
    if let Some(position) = selector.position {
        if position == 0 || position > items.len() {
            return Err(EngineError::not_found(
                "Line item",
                format!("position {} (there are {})", position, items.len()),
            ));
        }
        return Ok(position - 1);
    }

    let Some(name) = selector
        .item_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    else {
        return Err(EngineError::validation(
            "Give item_name or position to pick a line item",
        ));
    };

    let needle = name.to_lowercase();
    items
        .iter()
        .position(|item| item.name.to_lowercase() == needle)
        .or_else(|| {
            items
                .iter()
                .position(|item| item.name.to_lowercase().contains(&needle))
        })
        .ok_or_else(|| EngineError::not_found("Line item", name))
}

fn recalculate(doc: &mut Document) {
    let totals = doc.recalculate();
    if totals.is_over_discounted() {
        warn!(
            reference = %doc.reference_number,
            subtotal = %totals.subtotal,
            discount = %totals.discount_amount,
            "Discount exceeds subtotal, taxable amount is negative"
        );
    }
}

/// Renumbers positions, recomputes totals and writes lines then header.
async fn save_lines(ctx: &EngineContext, doc: &mut Document) -> EngineResult<()> {
    for (position, item) in doc.line_items.iter_mut().enumerate() {
        item.position = position as i64;
    }
    recalculate(doc);

    let repo = ctx.db.documents(doc.kind);
    repo.replace_items(&doc.owner_id, &doc.id, &doc.line_items).await?;
    repo.update(doc).await?;
    info!(
        reference = %doc.reference_number,
        items = doc.line_items.len(),
        total = %doc.total,
        "Line items saved"
    );
    Ok(())
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
    use billwise_core::PaymentOptions;
    use billwise_db::{Database, DbConfig};

    const OWNER: &str = "owner-1";

    async fn setup() -> Dispatcher {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Dispatcher::new(db, EngineConfig::for_tests())
    }

    async fn invoice(dispatcher: &Dispatcher, client: &str, price: u32) -> String {
        let result = dispatcher
            .execute(
                "create_invoice",
                json!({
                    "client_name": client,
                    "line_items": [{ "name": "Work", "quantity": 1, "unit_price": price }]
                }),
                OWNER,
            )
            .await;
        assert!(result.success, "{}", result.message);
        result.data.unwrap()["reference_number"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_invoice_computes_totals() {
        let dispatcher = setup().await;
        let result = dispatcher
            .execute(
                "create_invoice",
                json!({
                    "client_name": "Acme",
                    "line_items": [{ "name": "Design", "quantity": 2, "unit_price": 50 }],
                    "tax_rate": 10
                }),
                OWNER,
            )
            .await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "Created invoice INV-001 for Acme: total $110.00 (new client).");

        let db = &dispatcher.context().db;
        let doc = db.invoices().get_by_reference(OWNER, "INV-001").await.unwrap().unwrap();
        assert_eq!(doc.subtotal, dec("100"));
        assert_eq!(doc.tax_amount, dec("10"));
        assert_eq!(doc.total, dec("110"));
        assert_eq!(doc.line_items.len(), 1);
        assert_eq!(doc.status, DocumentStatus::Draft);
    }

    #[tokio::test]
    async fn test_create_applies_default_tax_and_payment_methods() {
        let dispatcher = setup().await;
        let db = &dispatcher.context().db;

        let mut settings = BusinessSettings::defaults_for(OWNER, Utc::now());
        settings.default_tax_rate = dec("8");
        settings.auto_apply_tax = true;
        db.settings().upsert(&settings).await.unwrap();

        let mut options = PaymentOptions::empty(OWNER, Utc::now());
        options.card_enabled = true;
        options.card_account_id = Some("acct_1".to_string());
        db.payment_options().upsert(&options).await.unwrap();

        let reference = invoice(&dispatcher, "Globex", 100).await;
        let doc = db.invoices().get_by_reference(OWNER, &reference).await.unwrap().unwrap();
        assert_eq!(doc.tax_percentage, dec("8"));
        assert_eq!(doc.total, dec("108"));
        assert!(doc.payment_flags.card);
        assert!(!doc.payment_flags.bank);
    }

    #[tokio::test]
    async fn test_references_increase_across_kinds() {
        let dispatcher = setup().await;
        let mut seen = Vec::new();
        for function in ["create_invoice", "create_estimate", "create_invoice", "create_estimate"] {
            let result = dispatcher
                .execute(
                    function,
                    json!({
                        "client_name": format!("Client {}", seen.len()),
                        "line_items": [{ "name": "Item", "unit_price": 10 }]
                    }),
                    OWNER,
                )
                .await;
            assert!(result.success, "{}", result.message);
            seen.push(result.data.unwrap()["reference_number"].as_str().unwrap().to_string());
        }
        assert_eq!(seen, vec!["INV-001", "INV-002", "INV-003", "INV-004"]);
    }

    #[tokio::test]
    async fn test_missing_client_name_is_validation_error() {
        let dispatcher = setup().await;
        let result = dispatcher
            .execute("create_invoice", json!({ "line_items": [] }), OWNER)
            .await;
        assert!(!result.success);
        assert_eq!(result.code, Some(ErrorCode::ValidationError));
        assert!(result.error.unwrap().contains("client_name"));
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_validation_errors() {
        let dispatcher = setup().await;
        let result = dispatcher
            .execute(
                "create_invoice",
                json!({
                    "client_name": "Acme",
                    "line_items": [{
                        "name": "Everything",
                        "quantity": "1000000000000000",
                        "unit_price": "1000000000000000"
                    }]
                }),
                OWNER,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.code, Some(ErrorCode::ValidationError));
        assert!(result.error.unwrap().contains("quantity"));

        let reference = invoice(&dispatcher, "Acme", 100).await;
        let update = dispatcher
            .execute(
                "update_invoice_line_item",
                json!({
                    "reference_number": reference,
                    "item_name": "Work",
                    "unit_price": "1000000000000000"
                }),
                OWNER,
            )
            .await;
        assert_eq!(update.code, Some(ErrorCode::ValidationError));

        let count = dispatcher.context().db.invoices().count(OWNER).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_creates_persist_once() {
        let dispatcher = setup().await;
        let args = json!({
            "client_name": "Acme",
            "line_items": [{ "name": "Design", "quantity": 2, "unit_price": 50 }]
        });

        let (first, second) = tokio::join!(
            dispatcher.execute("create_invoice", args.clone(), OWNER),
            dispatcher.execute("create_invoice", args.clone(), OWNER),
        );

        assert_eq!(
            [first.success, second.success].iter().filter(|ok| **ok).count(),
            1
        );
        let rejected = if first.success { &second } else { &first };
        assert_eq!(rejected.code, Some(ErrorCode::Conflict));
        assert!(rejected.message.contains("in progress"), "{}", rejected.message);

        let count = dispatcher.context().db.invoices().count(OWNER).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_identical_create_waiting_out_the_grace_reports_in_progress() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = EngineConfig {
            guard_grace_ms: 1000,
            ..EngineConfig::for_tests()
        };
        let dispatcher = Dispatcher::new(db, config);
        let args = json!({
            "client_name": "Acme",
            "line_items": [{ "name": "Design", "unit_price": 80 }]
        });

        // The first finishes inside the grace interval of the second
        let (first, second) = tokio::join!(
            dispatcher.execute("create_invoice", args.clone(), OWNER),
            dispatcher.execute("create_invoice", args.clone(), OWNER),
        );

        assert_ne!(first.success, second.success);
        let rejected = if first.success { &second } else { &first };
        assert_eq!(rejected.code, Some(ErrorCode::Conflict));
        assert!(rejected.message.contains("in progress"), "{}", rejected.message);
    }

    #[tokio::test]
    async fn test_concurrent_invoice_and_estimate_get_distinct_numbers() {
        let dispatcher = setup().await;

        let (invoice, estimate) = tokio::join!(
            dispatcher.execute(
                "create_invoice",
                json!({ "client_name": "Acme", "line_items": [{ "name": "Work", "unit_price": 10 }] }),
                OWNER,
            ),
            dispatcher.execute(
                "create_estimate",
                json!({ "client_name": "Beta", "line_items": [{ "name": "Work", "unit_price": 20 }] }),
                OWNER,
            ),
        );

        assert!(invoice.success, "{}", invoice.message);
        assert!(estimate.success, "{}", estimate.message);
        let mut numbers = vec![
            invoice.data.unwrap()["reference_number"].as_str().unwrap().to_string(),
            estimate.data.unwrap()["reference_number"].as_str().unwrap().to_string(),
        ];
        numbers.sort();
        assert_eq!(numbers, vec!["INV-001", "INV-002"]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_for_new_client_make_one_client() {
        let dispatcher = setup().await;
        let args = json!({
            "client_name": "Newco Ltd",
            "line_items": [{ "name": "Work", "unit_price": 10 }]
        });

        let (invoice, estimate) = tokio::join!(
            dispatcher.execute("create_invoice", args.clone(), OWNER),
            dispatcher.execute("create_estimate", args.clone(), OWNER),
        );
        assert!(invoice.success, "{}", invoice.message);
        assert!(estimate.success, "{}", estimate.message);

        let clients = dispatcher.context().db.clients().count(OWNER).await.unwrap();
        assert_eq!(clients, 1);

        let invoice_client = invoice.data.unwrap()["client_id"].clone();
        assert_eq!(invoice_client, estimate.data.unwrap()["client_id"]);
    }

    #[tokio::test]
    async fn test_create_while_another_is_in_flight_reports_in_progress() {
        let dispatcher = setup().await;
        let _held = dispatcher
            .context()
            .guard
            .acquire(OWNER, DocumentKind::Invoice, "something else")
            .await
            .unwrap();

        let result = dispatcher
            .execute("create_invoice", json!({ "client_name": "Acme" }), OWNER)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("in progress"), "{}", result.message);

        // Estimates are a different slot
        let estimate = dispatcher
            .execute("create_estimate", json!({ "client_name": "Acme" }), OWNER)
            .await;
        assert!(estimate.success, "{}", estimate.message);
    }

    #[tokio::test]
    async fn test_free_plan_limit_blocks_creation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = EngineConfig {
            free_plan_document_limit: 1,
            ..EngineConfig::for_tests()
        };
        let dispatcher = Dispatcher::new(db, config);

        invoice(&dispatcher, "Acme", 10).await;
        let result = dispatcher
            .execute("create_estimate", json!({ "client_name": "Acme" }), OWNER)
            .await;
        assert!(!result.success);
        assert_eq!(result.code, Some(ErrorCode::Conflict));
        assert!(result.message.contains("Upgrade to Pro"));
    }

    #[tokio::test]
    async fn test_update_falls_back_to_most_recent_and_says_so() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;
        invoice(&dispatcher, "Globex", 200).await;

        let result = dispatcher
            .execute(
                "update_invoice",
                json!({ "reference_number": "INV-999", "notes": "Thanks!" }),
                OWNER,
            )
            .await;
        assert!(result.success, "{}", result.message);
        assert!(result.message.contains("INV-002"));
        assert!(result.message.contains("most recent"));
    }

    #[tokio::test]
    async fn test_estimate_number_finds_invoice_by_digits() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;
        invoice(&dispatcher, "Globex", 200).await;

        let result = dispatcher
            .execute("get_invoice", json!({ "reference_number": "EST-001" }), OWNER)
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["client_name"], "Acme");
        assert!(result.message.contains("same number"));
    }

    #[tokio::test]
    async fn test_discount_and_tax_update_recalculates() {
        let dispatcher = setup().await;
        let reference = invoice(&dispatcher, "Acme", 200).await;

        let result = dispatcher
            .execute(
                "update_invoice",
                json!({
                    "reference_number": reference,
                    "discount_type": "percentage",
                    "discount_value": 10,
                    "tax_rate": 5
                }),
                OWNER,
            )
            .await;
        assert!(result.success, "{}", result.message);

        let doc = dispatcher
            .context()
            .db
            .invoices()
            .get_by_reference(OWNER, &reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.total, dec("189"));

        let cleared = dispatcher
            .execute(
                "update_invoice",
                json!({ "reference_number": reference, "discount_type": "none" }),
                OWNER,
            )
            .await;
        assert!(cleared.success);
        assert!(cleared.message.contains("$210.00"), "{}", cleared.message);
    }

    #[tokio::test]
    async fn test_over_discount_is_kept_negative() {
        let dispatcher = setup().await;
        let result = dispatcher
            .execute(
                "create_invoice",
                json!({
                    "client_name": "Acme",
                    "line_items": [{ "name": "Tiny", "unit_price": 10 }],
                    "discount_type": "fixed",
                    "discount_value": 15
                }),
                OWNER,
            )
            .await;
        assert!(result.success);

        let doc = dispatcher
            .context()
            .db
            .invoices()
            .get_by_reference(OWNER, "INV-001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.total, dec("-5"));
    }

    #[tokio::test]
    async fn test_line_item_add_update_remove() {
        let dispatcher = setup().await;
        let reference = invoice(&dispatcher, "Acme", 100).await;

        let added = dispatcher
            .execute(
                "add_invoice_line_item",
                json!({ "name": "Hosting", "quantity": 3, "unit_price": 20 }),
                OWNER,
            )
            .await;
        assert!(added.success, "{}", added.message);
        assert!(added.message.contains("$160.00"));

        let updated = dispatcher
            .execute(
                "update_invoice_line_item",
                json!({ "reference_number": reference, "item_name": "host", "quantity": 1 }),
                OWNER,
            )
            .await;
        assert!(updated.success, "{}", updated.message);
        assert!(updated.message.contains("$120.00"));

        let removed = dispatcher
            .execute(
                "remove_invoice_line_item",
                json!({ "reference_number": reference, "position": 1 }),
                OWNER,
            )
            .await;
        assert!(removed.success, "{}", removed.message);

        let doc = dispatcher
            .context()
            .db
            .invoices()
            .get_by_reference(OWNER, &reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.line_items.len(), 1);
        assert_eq!(doc.line_items[0].name, "Hosting");
        assert_eq!(doc.line_items[0].position, 0);
        assert_eq!(doc.total, dec("20"));
    }

    #[tokio::test]
    async fn test_unknown_line_item_is_not_found() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;

        let result = dispatcher
            .execute(
                "remove_invoice_line_item",
                json!({ "item_name": "Catering" }),
                OWNER,
            )
            .await;
        assert_eq!(result.code, Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_enabling_unconfigured_payment_method_names_setup_command() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;

        let result = dispatcher
            .execute("update_invoice_payment_methods", json!({ "bank": true }), OWNER)
            .await;
        assert!(!result.success);
        assert_eq!(result.code, Some(ErrorCode::ValidationError));
        assert!(result.message.contains("setup_bank_transfer"));
    }

    #[tokio::test]
    async fn test_design_rejects_bad_color() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;

        let bad = dispatcher
            .execute("update_invoice_design", json!({ "accent_color": "blue-ish" }), OWNER)
            .await;
        assert_eq!(bad.code, Some(ErrorCode::ValidationError));

        let good = dispatcher
            .execute(
                "update_invoice_design",
                json!({ "design_id": "modern", "accent_color": "#1a73e8" }),
                OWNER,
            )
            .await;
        assert!(good.success);
        assert_eq!(good.data.unwrap()["accent_color"], "#1A73E8");
    }

    #[tokio::test]
    async fn test_duplicate_makes_new_draft() {
        let dispatcher = setup().await;
        let original = invoice(&dispatcher, "Acme", 100).await;

        let result = dispatcher
            .execute("duplicate_invoice", json!({ "reference_number": original }), OWNER)
            .await;
        assert!(result.success, "{}", result.message);
        let data = result.data.unwrap();
        assert_eq!(data["reference_number"], "INV-002");
        assert_eq!(data["client_name"], "Acme");
        assert_eq!(data["status"], "draft");

        // An immediate identical repeat is refused
        let again = dispatcher
            .execute("duplicate_invoice", json!({ "reference_number": original }), OWNER)
            .await;
        assert_eq!(again.code, Some(ErrorCode::Conflict));
    }

    #[tokio::test]
    async fn test_delete_requires_real_reference() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;

        let missing = dispatcher
            .execute("delete_invoice", json!({ "reference_number": "INV-404" }), OWNER)
            .await;
        assert_eq!(missing.code, Some(ErrorCode::NotFound));

        let deleted = dispatcher
            .execute("delete_invoice", json!({ "reference_number": "inv-001" }), OWNER)
            .await;
        assert!(deleted.success, "{}", deleted.message);
        let count = dispatcher.context().db.invoices().count(OWNER).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_estimate_status_rules() {
        let dispatcher = setup().await;
        let created = dispatcher
            .execute("create_estimate", json!({ "client_name": "Acme" }), OWNER)
            .await;
        assert!(created.success);

        let sent = dispatcher
            .execute("update_estimate_status", json!({ "status": "sent" }), OWNER)
            .await;
        assert!(sent.success, "{}", sent.message);

        let converted = dispatcher
            .execute("update_estimate_status", json!({ "status": "converted" }), OWNER)
            .await;
        assert_eq!(converted.code, Some(ErrorCode::Conflict));

        let accepted = dispatcher
            .execute("update_estimate_status", json!({ "status": "approved" }), OWNER)
            .await;
        assert!(accepted.success, "{}", accepted.message);
        let data = accepted.data.unwrap();
        assert_eq!(data["status"], "accepted");
        assert!(data.get("accepted_at").is_some());
    }

    #[tokio::test]
    async fn test_search_by_client_and_status() {
        let dispatcher = setup().await;
        invoice(&dispatcher, "Acme", 100).await;
        invoice(&dispatcher, "Globex", 200).await;

        let result = dispatcher
            .execute("search_invoices", json!({ "query": "glob", "status": "draft" }), OWNER)
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["count"], 1);

        let bad_status = dispatcher
            .execute("search_invoices", json!({ "status": "lost" }), OWNER)
            .await;
        assert_eq!(bad_status.code, Some(ErrorCode::ValidationError));
    }

    #[test]
    fn test_discount_from_keeps_type_when_only_value_changes() {
        let (kind, value) =
            discount_from(Some(DiscountType::Fixed), dec("5"), None, Some(dec("7"))).unwrap();
        assert_eq!(kind, Some(DiscountType::Fixed));
        assert_eq!(value, dec("7"));

        let (kind, value) = discount_from(None, Decimal::ZERO, None, Some(dec("10"))).unwrap();
        assert_eq!(kind, Some(DiscountType::Percentage));
        assert_eq!(value, dec("10"));

        assert!(discount_from(None, Decimal::ZERO, Some("bogus"), None).is_err());
        assert!(discount_from(None, Decimal::ZERO, None, Some(dec("-1"))).is_err());
    }

    #[test]
    fn test_select_line_prefers_exact_name() {
        let item = |name: &str| LineItem {
            id: generate_id(),
            document_id: "doc".to_string(),
            name: name.to_string(),
            description: None,
            quantity: Decimal::ONE,
            unit_price: Decimal::ONE,
            position: 0,
        };
        let items = vec![item("Web hosting"), item("Hosting")];

        let by_name = LineSelector {
            item_name: Some("hosting".to_string()),
            position: None,
        };
        assert_eq!(select_line(&items, &by_name).unwrap(), 1);

        let by_position = LineSelector {
            item_name: None,
            position: Some(1),
        };
        assert_eq!(select_line(&items, &by_position).unwrap(), 0);

        assert!(select_line(&items, &LineSelector::default()).is_err());
    }
}
