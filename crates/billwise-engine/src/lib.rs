//! # billwise-engine: Command Execution Engine
//!
//! Executes the functions a language model picks from the Billwise catalog
//! against one owner's invoices, estimates, clients and settings.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Function Call                               │
//! │                                                                         │
//! │  model ──► ("create_invoice", {...}, owner id)                          │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Dispatcher                                                      │  │
//! │  │   catalog lookup ──► typed params ──► handler (own task)         │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 │                                       │
//! │        ┌────────────────┬───────┴────────┬──────────────────┐          │
//! │        ▼                ▼                ▼                  ▼          │
//! │  ┌────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────────────┐  │
//! │  │ Creation   │  │ Entity      │  │ Reference   │  │ Document       │  │
//! │  │ Guard      │  │ Resolver    │  │ Sequencer   │  │ Lifecycle      │  │
//! │  │            │  │             │  │             │  │                │  │
//! │  │ one create │  │ fuzzy       │  │ shared      │  │ fallback       │  │
//! │  │ per owner  │  │ client      │  │ INV-/EST-   │  │ lookup,        │  │
//! │  │ and kind   │  │ matching    │  │ numbering   │  │ conversion     │  │
//! │  └────────────┘  └─────────────┘  └─────────────┘  └────────────────┘  │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │                   CommandResult { success, data, message }              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`catalog`] - the 45 function definitions offered to the model
//! - [`dispatcher`] - routing, task isolation, logging
//! - [`handlers`] - one handler per catalog entry
//! - [`guard`] - duplicate-creation guard
//! - [`resolver`] - client find-or-create
//! - [`sequencer`] - next reference number
//! - [`lifecycle`] - document lookup and estimate conversion
//! - [`params`] - typed arguments
//! - [`config`] - TOML + environment configuration
//! - [`error`] / [`result`] - error taxonomy and the result envelope
//!
//! ## Example
//! ```rust,no_run
//! use billwise_db::{Database, DbConfig};
//! use billwise_engine::{Dispatcher, EngineConfig};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DbConfig::in_memory()).await?;
//! let dispatcher = Dispatcher::new(db, EngineConfig::default());
//!
//! let result = dispatcher
//!     .execute(
//!         "create_invoice",
//!         json!({ "client_name": "Acme", "line_items": [{ "name": "Design", "unit_price": 100 }] }),
//!         "owner-1",
//!     )
//!     .await;
//! println!("{}", result.message);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod lifecycle;
pub mod params;
pub mod resolver;
pub mod result;
pub mod sequencer;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{catalog_json, definitions, Function, FunctionDefinition, CATALOG_VERSION};
pub use config::{ConfigError, EngineConfig};
pub use dispatcher::{Dispatcher, EngineContext};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use guard::{CreationGuard, CreationPermit, GuardConfig, GuardRejection, LocalCreationGuard};
pub use lifecycle::{DocumentLifecycle, ResolutionPath, TargetPolicy};
pub use resolver::{EntityResolver, Resolution};
pub use result::CommandResult;
pub use sequencer::{ReferenceSequencer, SequenceLease};

use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Calling it twice is
/// harmless; the second call is ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
