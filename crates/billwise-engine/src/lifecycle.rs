//! # Document Lifecycle
//!
//! Picks the document a command means and runs estimate → invoice
//! conversion.
//!
//! ## Target Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reference given?                                                       │
//! │     │ yes                                  │ no                         │
//! │     ▼                                      │                            │
//! │  exact (case-insensitive) ──found──► Exact │                            │
//! │     │ miss                                 │                            │
//! │     ▼                                      │                            │
//! │  same digits (EST-003 ~ INV-003) ─► Digits │                            │
//! │     │ miss                                 ▼                            │
//! │     └──── Strict? ──yes──► NotFound    newest of recent(N) ─► MostRecent│
//! │                  └─no───────────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exact and digit matching look at the whole collection. The message of
//! every command that edits a resolved document names the document that
//! was actually touched, and says so when the fallback was used.
//!
//! ## Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. estimate not terminal?                 ── else Conflict             │
//! │  2. invoice number = estimate number       ── taken? Conflict           │
//! │  3. insert invoice                         ── fails? nothing to undo    │
//! │  4. insert invoice items                   ── fails? delete invoice,    │
//! │                                               PartialFailure            │
//! │  5. estimate → accepted, link invoice id   ── fails? delete invoice     │
//! │  6. re-read invoice + items                ── missing? PartialFailure   │
//! │  7. estimate → converted                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use billwise_core::reference::same_reference;
use billwise_core::status::ensure_convertible;
use billwise_core::{Document, DocumentKind, DocumentStatus, LineItem};
use billwise_db::{generate_id, Database, DocumentRepository};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Target resolution
// =============================================================================

/// How a document was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum ResolutionPath {
    Exact,
    Digits { requested: String },
    MostRecent { requested: Option<String> },
}

/// Whether a miss may fall back to the most recent document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPolicy {
    FallbackToRecent,
    Strict,
}

#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub document: Document,
    pub path: ResolutionPath,
}

impl ResolvedTarget {
    /// Sentence appended to a handler message when the target was not
    /// the one literally asked for.
    pub fn note(&self) -> Option<String> {
        let kind = self.document.kind;
        match &self.path {
            ResolutionPath::Exact => None,
            ResolutionPath::Digits { requested } => Some(format!(
                "No {} is numbered {}; used {} which has the same number.",
                kind, requested, self.document.reference_number
            )),
            ResolutionPath::MostRecent {
                requested: Some(requested),
            } => Some(format!(
                "No {} matched {}, so the most recent one ({}) was used.",
                kind, requested, self.document.reference_number
            )),
            ResolutionPath::MostRecent { requested: None } => None,
        }
    }

    /// `base` plus the fallback note, if any.
    pub fn message(&self, base: impl Into<String>) -> String {
        let base = base.into();
        match self.note() {
            Some(note) => format!("{} {}", base, note),
            None => base,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(
            self.path,
            ResolutionPath::MostRecent {
                requested: Some(_)
            }
        )
    }
}

/// Resolves the document a command refers to.
pub async fn resolve_target(
    db: &Database,
    owner_id: &str,
    kind: DocumentKind,
    reference: Option<&str>,
    recent_window: u32,
    policy: TargetPolicy,
) -> EngineResult<ResolvedTarget> {
    let repo = db.documents(kind);
    let requested = reference.map(str::trim).filter(|r| !r.is_empty());

    if let Some(requested) = requested {
        if let Some(document) = repo.get_by_reference(owner_id, requested).await? {
            debug!(owner_id = %owner_id, kind = %kind, reference = %requested, "Target resolved exactly");
            return Ok(ResolvedTarget {
                document,
                path: ResolutionPath::Exact,
            });
        }

        if let Some(document) = repo.find_by_digits(owner_id, requested).await? {
            info!(
                owner_id = %owner_id,
                kind = %kind,
                requested = %requested,
                reference = %document.reference_number,
                "Target resolved by digits"
            );
            return Ok(ResolvedTarget {
                document,
                path: ResolutionPath::Digits {
                    requested: requested.to_string(),
                },
            });
        }

        if policy == TargetPolicy::Strict {
            return Err(EngineError::not_found(kind.label(), requested));
        }
    }

    let recent = repo.recent(owner_id, recent_window).await?;
    let Some(document) = recent.into_iter().next() else {
        return Err(match requested {
            Some(requested) => EngineError::not_found(kind.label(), requested),
            None => EngineError::not_found(kind.label(), "no documents yet"),
        });
    };

    if let Some(requested) = requested {
        warn!(
            owner_id = %owner_id,
            kind = %kind,
            requested = %requested,
            reference = %document.reference_number,
            "No match for reference, falling back to most recent"
        );
    } else {
        debug!(
            owner_id = %owner_id,
            kind = %kind,
            reference = %document.reference_number,
            "No reference given, using most recent"
        );
    }

    Ok(ResolvedTarget {
        document,
        path: ResolutionPath::MostRecent {
            requested: requested.map(str::to_string),
        },
    })
}

// =============================================================================
// Conversion
// =============================================================================

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub estimate: Document,
    pub invoice: Document,
}

/// Runs conversions against one database.
#[derive(Debug, Clone)]
pub struct DocumentLifecycle {
    db: Database,
}

impl DocumentLifecycle {
    pub fn new(db: Database) -> Self {
        DocumentLifecycle { db }
    }

    /// Converts `estimate` into an invoice carrying the same number.
    ///
    /// `payment_terms_days` sets the new invoice's due date.
    pub async fn convert(
        &self,
        mut estimate: Document,
        payment_terms_days: i64,
    ) -> EngineResult<Conversion> {
        let owner_id = estimate.owner_id.clone();
        ensure_convertible(&estimate.reference_number, estimate.status)?;

        let invoices = self.db.invoices();
        let estimates = self.db.estimates();

        let reference = same_reference(&estimate.reference_number);
        if invoices.get_by_reference(&owner_id, &reference).await?.is_some() {
            return Err(EngineError::conflict(format!(
                "An invoice numbered {} already exists",
                reference
            )));
        }

        let today = Utc::now().date_naive();
        let invoice = invoice_from_estimate(&estimate, reference, today, payment_terms_days);

        // Phase 1: the invoice and its lines
        invoices.insert(&invoice).await?;
        if let Err(e) = invoices.insert_items(&owner_id, &invoice.line_items).await {
            error!(
                owner_id = %owner_id,
                reference = %invoice.reference_number,
                error = %e,
                "Line items failed during conversion, removing invoice"
            );
            self.compensate(&invoices, &invoice).await;
            return Err(EngineError::PartialFailure(format!(
                "Could not copy the line items of estimate {}; the invoice was not created and the estimate is unchanged",
                estimate.reference_number
            )));
        }

        // Phase 2: mark the estimate accepted and linked
        let now = Utc::now();
        estimate.status = DocumentStatus::Accepted;
        estimate.is_accepted = true;
        estimate.accepted_at.get_or_insert(now);
        estimate.converted_to_invoice_id = Some(invoice.id.clone());
        if let Err(e) = estimates.update(&estimate).await {
            error!(owner_id = %owner_id, error = %e, "Could not link estimate, removing invoice");
            self.compensate(&invoices, &invoice).await;
            return Err(EngineError::PartialFailure(format!(
                "Could not update estimate {}; the invoice was not created",
                estimate.reference_number
            )));
        }

        // Confirm what was written before closing the estimate
        let stored = invoices.get_by_id(&owner_id, &invoice.id).await?;
        let confirmed = stored
            .as_ref()
            .is_some_and(|doc| doc.line_items.len() == invoice.line_items.len());
        if !confirmed {
            return Err(EngineError::PartialFailure(format!(
                "Invoice {} could not be confirmed; estimate left as accepted",
                invoice.reference_number
            )));
        }

        estimate.status = DocumentStatus::Converted;
        estimate.converted_at = Some(Utc::now());
        estimates.update(&estimate).await?;

        info!(
            owner_id = %owner_id,
            reference = %invoice.reference_number,
            items = invoice.line_items.len(),
            "Converted estimate to invoice"
        );

        Ok(Conversion {
            estimate,
            invoice: stored.unwrap_or(invoice),
        })
    }

    async fn compensate(&self, invoices: &DocumentRepository, invoice: &Document) {
        if let Err(e) = invoices.delete(&invoice.owner_id, &invoice.id).await {
            error!(
                reference = %invoice.reference_number,
                error = %e,
                "Compensating delete failed"
            );
        }
    }
}

/// `date` plus `days`; negative counts are treated as zero.
pub fn days_after(date: NaiveDate, days: i64) -> NaiveDate {
    let days = u64::try_from(days).unwrap_or(0);
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

/// The invoice a conversion writes: same client, lines, modifiers and number.
fn invoice_from_estimate(
    estimate: &Document,
    reference: String,
    today: NaiveDate,
    payment_terms_days: i64,
) -> Document {
    let now = Utc::now();
    let id = generate_id();
    let line_items: Vec<LineItem> = estimate
        .line_items
        .iter()
        .map(|item| LineItem {
            id: generate_id(),
            document_id: id.clone(),
            ..item.clone()
        })
        .collect();

    let mut invoice = Document {
        id,
        owner_id: estimate.owner_id.clone(),
        kind: DocumentKind::Invoice,
        reference_number: reference,
        client_id: estimate.client_id.clone(),
        client_name: estimate.client_name.clone(),
        status: DocumentStatus::Draft,
        issue_date: today,
        due_date: Some(days_after(today, payment_terms_days)),
        subtotal: estimate.subtotal,
        discount_type: estimate.discount_type,
        discount_value: estimate.discount_value,
        tax_percentage: estimate.tax_percentage,
        tax_amount: estimate.tax_amount,
        total: estimate.total,
        notes: estimate.notes.clone(),
        design_id: estimate.design_id.clone(),
        accent_color: estimate.accent_color.clone(),
        payment_flags: estimate.payment_flags,
        is_accepted: false,
        accepted_at: None,
        converted_to_invoice_id: None,
        converted_at: None,
        source_estimate_id: Some(estimate.id.clone()),
        created_at: now,
        updated_at: now,
        line_items,
    };
    invoice.recalculate();
    invoice
}
