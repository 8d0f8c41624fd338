//! # Document Status Rules
//!
//! ```text
//! Estimate
//!   draft ──► sent ──► accepted ──► converted      (conversion only)
//!     │        │          │
//!     │        ├──► declined
//!     │        ├──► expired
//!     │        └──► cancelled ◄── (draft, accepted)
//!     └──► accepted | declined | cancelled
//!
//! Invoice
//!   draft ──► sent ──► paid | overdue ──► paid
//! ```
//!
//! `converted`, `declined`, `expired` and `cancelled` are terminal for
//! estimates.

use crate::error::{CoreError, CoreResult};
use crate::types::{DocumentKind, DocumentStatus};

use DocumentStatus::*;

/// Statuses a document of `kind` may carry at all.
pub fn statuses_for(kind: DocumentKind) -> &'static [DocumentStatus] {
    match kind {
        DocumentKind::Invoice => &[Draft, Sent, Paid, Overdue],
        DocumentKind::Estimate => &[Draft, Sent, Accepted, Declined, Expired, Cancelled, Converted],
    }
}

/// Whether an estimate in `status` can never move again.
pub fn is_terminal(kind: DocumentKind, status: DocumentStatus) -> bool {
    match kind {
        DocumentKind::Estimate => matches!(status, Converted | Declined | Expired | Cancelled),
        DocumentKind::Invoice => status == Paid,
    }
}

/// Raw state-machine edge check. Staying in place is always allowed.
pub fn can_transition(kind: DocumentKind, from: DocumentStatus, to: DocumentStatus) -> bool {
    if from == to {
        return statuses_for(kind).contains(&to);
    }
    match kind {
        DocumentKind::Estimate => matches!(
            (from, to),
            (Draft, Sent | Accepted | Declined | Cancelled)
                | (Sent, Accepted | Declined | Expired | Cancelled)
                | (Accepted, Converted | Cancelled)
        ),
        DocumentKind::Invoice => {
            matches!((from, to), (Draft, Sent) | (Sent, Paid | Overdue) | (Overdue, Paid))
        }
    }
}

/// Validates a status change requested by a command.
///
/// `converted` is never accepted here; it is reached only through the
/// two-phase conversion.
pub fn ensure_manual_transition(
    kind: DocumentKind,
    reference: &str,
    from: DocumentStatus,
    to: DocumentStatus,
) -> CoreResult<()> {
    if to != Converted && can_transition(kind, from, to) {
        return Ok(());
    }
    Err(CoreError::InvalidTransition {
        kind,
        reference: reference.to_string(),
        from,
        to,
    })
}

/// Checks an estimate may start a conversion.
pub fn ensure_convertible(reference: &str, status: DocumentStatus) -> CoreResult<()> {
    if is_terminal(DocumentKind::Estimate, status) {
        return Err(CoreError::NotConvertible {
            reference: reference.to_string(),
            status,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_happy_path() {
        let kind = DocumentKind::Estimate;
        assert!(can_transition(kind, Draft, Sent));
        assert!(can_transition(kind, Sent, Accepted));
        assert!(can_transition(kind, Accepted, Converted));
    }

    #[test]
    fn test_terminal_estimates_do_not_move() {
        for from in [Converted, Declined, Expired, Cancelled] {
            assert!(is_terminal(DocumentKind::Estimate, from));
            assert!(!can_transition(DocumentKind::Estimate, from, Sent));
            assert!(ensure_convertible("EST-001", from).is_err());
        }
        assert!(ensure_convertible("EST-001", Sent).is_ok());
    }

    #[test]
    fn test_converted_only_via_conversion() {
        let err =
            ensure_manual_transition(DocumentKind::Estimate, "EST-002", Accepted, Converted)
                .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_invoice_rejects_estimate_statuses() {
        assert!(!can_transition(DocumentKind::Invoice, Draft, Accepted));
        assert!(!can_transition(DocumentKind::Invoice, Accepted, Accepted));
        assert!(can_transition(DocumentKind::Invoice, Overdue, Paid));
    }

    #[test]
    fn test_same_status_is_noop() {
        assert!(ensure_manual_transition(DocumentKind::Estimate, "EST-003", Sent, Sent).is_ok());
    }
}
