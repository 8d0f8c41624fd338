//! # Validation Module
//!
//! Business rule checks run on parsed command arguments, before anything
//! touches the database.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Function catalog (JSON schema shown to the model)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Typed parameter structs (serde, at the dispatcher)           │
//! │  └── THIS MODULE: value rules (positive quantity, hex colour, ...)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite (NOT NULL, UNIQUE(owner_id, reference_number))        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use billwise_core::validation::{validate_quantity, validate_accent_color};
//! use rust_decimal::Decimal;
//!
//! validate_quantity(Decimal::from(2)).unwrap();
//! assert!(validate_accent_color("#1E40AF").is_ok());
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::reference::ReferenceFormat;
use crate::MAX_LINE_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 2000;

// Upper bounds keep every total of a full document (MAX_LINE_ITEMS lines)
// inside Decimal's range.
pub const MAX_QUANTITY: i64 = 1_000_000;
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;
pub const MAX_TAX_RATE: i64 = 100;
pub const MAX_DISCOUNT_VALUE: i64 = 1_000_000_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required name-like field and returns it trimmed.
///
/// ## Example
/// ```rust
/// use billwise_core::validation::validate_name;
///
/// assert_eq!(validate_name("client_name", "  Acme ").unwrap(), "Acme");
/// assert!(validate_name("client_name", "").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(value.to_string())
}

/// Free-text notes: optional, bounded.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > MAX_NOTES_LEN => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        }),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Loose email shape check: one `@`, something on each side, a dot after it.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(email.to_string())
}

/// `#RGB` or `#RRGGBB`; returned upper-cased.
pub fn validate_accent_color(color: &str) -> ValidationResult<String> {
    let color = color.trim();
    let hex = color.strip_prefix('#').unwrap_or(color);
    if !matches!(hex.len(), 3 | 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field: "accent_color".to_string(),
            reason: "must be a hex colour such as #1E40AF".to_string(),
        });
    }
    Ok(format!("#{}", hex.to_uppercase()))
}

/// ISO 4217 style: three ASCII letters, returned upper-cased.
pub fn validate_currency(code: &str) -> ValidationResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter code such as USD".to_string(),
        });
    }
    Ok(code.to_uppercase())
}

/// Parses a reference template, reporting failures as validation errors.
pub fn validate_reference_format(template: &str) -> ValidationResult<ReferenceFormat> {
    ReferenceFormat::parse(template).map_err(|e| ValidationError::InvalidFormat {
        field: "reference_format".to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Quantity must be > 0. Fractions are fine (1.5 hours).
pub fn validate_quantity(quantity: Decimal) -> ValidationResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    at_most("quantity", quantity, MAX_QUANTITY)
}

/// Unit price must be ≥ 0. Zero is allowed (free items).
pub fn validate_unit_price(price: Decimal) -> ValidationResult<()> {
    non_negative("unit_price", price)?;
    at_most("unit_price", price, MAX_UNIT_PRICE)
}

/// Percent, 0 to [`MAX_TAX_RATE`].
pub fn validate_tax_rate(rate: Decimal) -> ValidationResult<()> {
    non_negative("tax_rate", rate)?;
    at_most("tax_rate", rate, MAX_TAX_RATE)
}

/// Discount value must be ≥ 0; a percentage above 100 is still allowed
/// through and produces a negative taxable amount.
pub fn validate_discount_value(value: Decimal) -> ValidationResult<()> {
    non_negative("discount_value", value)?;
    at_most("discount_value", value, MAX_DISCOUNT_VALUE)
}

pub fn validate_payment_terms(days: i64) -> ValidationResult<()> {
    if days < 0 {
        return Err(ValidationError::Negative {
            field: "payment_terms_days".to_string(),
        });
    }
    Ok(())
}

fn non_negative(field: &str, value: Decimal) -> ValidationResult<()> {
    if value < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn at_most(field: &str, value: Decimal, max: i64) -> ValidationResult<()> {
    if value > Decimal::from(max) {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// A document holds at most [`MAX_LINE_ITEMS`] lines.
pub fn validate_line_item_count(count: usize) -> ValidationResult<()> {
    if count > MAX_LINE_ITEMS {
        return Err(ValidationError::TooMany {
            field: "line_items".to_string(),
            max: MAX_LINE_ITEMS,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
