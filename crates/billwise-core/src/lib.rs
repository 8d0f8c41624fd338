//! # billwise-core: Pure Business Logic for Billwise
//!
//! This crate is the **heart** of Billwise. It contains every rule that does
//! not need a database: money math, reference numbers, client matching and
//! the estimate state machine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Billwise Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Chat orchestration (external, picks a function)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ (name, JSON args, owner id)            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 billwise-engine (dispatcher)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ billwise-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐ ┌───────────┐ ┌───────────┐ ┌──────────────┐   │   │
//! │  │  │ calculator │ │ reference │ │ matching  │ │    status    │   │   │
//! │  │  │  Totals    │ │ Format    │ │ Strategy  │ │ transitions  │   │   │
//! │  │  └────────────┘ └───────────┘ └───────────┘ └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  billwise-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Document, LineItem, Client, settings)
//! - [`money`] - Decimal money with presentation-time rounding
//! - [`calculator`] - subtotal → discount → tax → total pipeline
//! - [`reference`] - Reference number templates and suffix parsing
//! - [`matching`] - Client name matching cascade
//! - [`status`] - Document status rules
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use billwise_core::calculator::{calculate_totals, LineAmount};
//! use rust_decimal::Decimal;
//!
//! let items = [LineAmount::new(Decimal::from(2), Decimal::from(50))];
//! let totals = calculate_totals(&items, None, Decimal::from(10));
//!
//! assert_eq!(totals.subtotal, Decimal::from(100));
//! assert_eq!(totals.total, Decimal::from(110));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calculator;
pub mod error;
pub mod matching;
pub mod money;
pub mod reference;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use calculator::{calculate_totals, Discount, LineAmount, Totals};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use reference::ReferenceFormat;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Reference template used when an owner never configured one.
pub const DEFAULT_REFERENCE_FORMAT: &str = "INV-001";

/// How many recent documents the edit heuristic looks at.
pub const RECENT_DOCUMENT_WINDOW: u32 = 5;

/// Maximum line items on a single document.
///
/// ## Business Reason
/// Keeps a runaway model from writing hundreds of rows in one command.
pub const MAX_LINE_ITEMS: usize = 200;

/// Days an estimate stays valid when the caller gives no date.
pub const DEFAULT_ESTIMATE_VALIDITY_DAYS: i64 = 30;
