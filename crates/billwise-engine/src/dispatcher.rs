//! # Command Dispatcher
//!
//! Entry point of the engine: `(function name, JSON arguments, owner id)`
//! in, [`CommandResult`] out.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  execute("create_invoice", {...}, "owner-1")                            │
//! │     │                                                                   │
//! │     ├── owner id blank? ─────────────────────────► VALIDATION_ERROR     │
//! │     ├── name not in catalog? ────────────────────► NOT_FOUND            │
//! │     ▼                                                                   │
//! │  tokio::spawn(handler)  ── panic? ───────────────► INTERNAL             │
//! │     │                                                                   │
//! │     ├── Err(EngineError) ────────────────────────► { success: false }   │
//! │     └── Ok(Outcome) ─────────────────────────────► { success: true }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatcher owns no state of its own beyond the injected
//! collaborators and is cheap to clone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use billwise_db::{ClientRepository, Database};

use crate::catalog::Function;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::guard::{CreationGuard, LocalCreationGuard};
use crate::handlers::{self, Outcome};
use crate::resolver::EntityResolver;
use crate::result::CommandResult;
use crate::sequencer::ReferenceSequencer;

/// Collaborators shared by every handler.
pub struct EngineContext {
    pub db: Database,
    pub config: EngineConfig,
    pub guard: Arc<dyn CreationGuard>,
    pub resolver: EntityResolver<ClientRepository>,
    pub sequencer: ReferenceSequencer,
}

#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<EngineContext>,
    routes: Arc<HashMap<String, Function>>,
}

impl Dispatcher {
    /// Dispatcher with an in-process creation guard configured from `config`.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let guard = Arc::new(LocalCreationGuard::new(config.guard_config()));
        Self::with_guard(db, config, guard)
    }

    /// Dispatcher with a caller-supplied guard.
    pub fn with_guard(db: Database, config: EngineConfig, guard: Arc<dyn CreationGuard>) -> Self {
        let routes = Function::all()
            .into_iter()
            .map(|function| (function.name(), function))
            .collect::<HashMap<_, _>>();

        let context = EngineContext {
            resolver: EntityResolver::new(db.clients()),
            sequencer: ReferenceSequencer::new(db.clone()),
            db,
            config,
            guard,
        };

        Dispatcher {
            context: Arc::new(context),
            routes: Arc::new(routes),
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Whether `name` is routable.
    pub fn knows(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Runs one function call. Never panics and never returns an error:
    /// every failure is an envelope with `success: false`.
    pub async fn execute(&self, name: &str, arguments: Value, owner_id: &str) -> CommandResult {
        let start = Instant::now();
        let owner_id = owner_id.trim();
        debug!(owner_id = %owner_id, function = %name, "Executing function");

        let result = self.route(name, arguments, owner_id).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                info!(owner_id = %owner_id, function = %name, elapsed_ms, "Function succeeded");
                CommandResult::ok(outcome.message, outcome.data)
            }
            Err(err) => {
                warn!(
                    owner_id = %owner_id,
                    function = %name,
                    code = ?err.code(),
                    error = %err,
                    elapsed_ms,
                    "Function failed"
                );
                CommandResult::failure(&err)
            }
        }
    }

    async fn route(&self, name: &str, arguments: Value, owner_id: &str) -> EngineResult<Outcome> {
        if owner_id.is_empty() {
            return Err(EngineError::validation("An owner id is required"));
        }
        let function = *self
            .routes
            .get(name)
            .ok_or_else(|| EngineError::UnknownFunction {
                name: name.to_string(),
            })?;

        let context = Arc::clone(&self.context);
        let owner_id = owner_id.to_string();
        let task = tokio::spawn(async move {
            handlers::handle(&context, function, &owner_id, arguments).await
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                error!(function = %name, error = %join_error, "Handler task failed");
                Err(EngineError::internal(format!(
                    "{} did not complete: {}",
                    name, join_error
                )))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::guard::{CreationPermit, GuardRejection};
    use async_trait::async_trait;
    use billwise_core::{DocumentKind, DocumentStatus};
    use billwise_db::DbConfig;
    use serde_json::json;

    const OWNER: &str = "owner-1";

    async fn setup() -> Dispatcher {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Dispatcher::new(db, EngineConfig::for_tests())
    }

    fn document(client: &str, item: &str, price: i64) -> Value {
        json!({
            "client_name": client,
            "line_items": [{ "name": item, "quantity": 1, "unit_price": price }]
        })
    }

    struct PanickingGuard;

    #[async_trait]
    impl CreationGuard for PanickingGuard {
        async fn acquire(
            &self,
            _owner_id: &str,
            _kind: DocumentKind,
            _fingerprint: &str,
        ) -> Result<CreationPermit, GuardRejection> {
            panic!("guard exploded");
        }
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let dispatcher = setup().await;
        let result = dispatcher.execute("send_fax", json!({}), OWNER).await;

        assert!(!result.success);
        assert_eq!(result.code, Some(ErrorCode::NotFound));
        assert_eq!(result.error.as_deref(), Some("Function not found"));
    }

    #[tokio::test]
    async fn test_blank_owner_is_rejected() {
        let dispatcher = setup().await;
        let result = dispatcher.execute("list_recent_invoices", json!({}), "  ").await;
        assert_eq!(result.code, Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn test_every_catalog_entry_is_routable() {
        let dispatcher = setup().await;
        for definition in crate::catalog::definitions() {
            assert!(dispatcher.knows(&definition.name), "{}", definition.name);
        }
        assert!(!dispatcher.knows("create_receipt"));
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_internal_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dispatcher = Dispatcher::with_guard(db, EngineConfig::for_tests(), Arc::new(PanickingGuard));

        let result = dispatcher
            .execute("create_invoice", document("Acme", "Work", 100), OWNER)
            .await;
        assert!(!result.success);
        assert_eq!(result.code, Some(ErrorCode::Internal));

        // The dispatcher keeps working afterwards
        let after = dispatcher.execute("list_recent_invoices", json!({}), OWNER).await;
        assert!(after.success, "{}", after.message);
    }

    #[tokio::test]
    async fn test_convert_estimate_keeps_shared_number() {
        let dispatcher = setup().await;
        for (kind, item) in [
            ("create_invoice", "Audit"),
            ("create_estimate", "Survey"),
            ("create_invoice", "Repairs"),
            ("create_estimate", "Roofing"),
        ] {
            let created = dispatcher.execute(kind, document("Beta Ltd", item, 250), OWNER).await;
            assert!(created.success, "{}", created.message);
        }

        let estimate = dispatcher
            .execute("create_estimate", document("Beta Ltd", "Fencing", 400), OWNER)
            .await;
        assert_eq!(estimate.data.unwrap()["reference_number"], "INV-005");

        let converted = dispatcher
            .execute("convert_estimate_to_invoice", json!({ "reference_number": "INV-005" }), OWNER)
            .await;
        assert!(converted.success, "{}", converted.message);
        let data = converted.data.unwrap();
        assert_eq!(data["invoice"]["reference_number"], "INV-005");
        assert_eq!(data["estimate"]["status"], "converted");
        assert_eq!(data["invoice"]["status"], "draft");
        assert_eq!(
            data["estimate"]["converted_to_invoice_id"],
            data["invoice"]["id"]
        );
        assert_eq!(data["invoice"]["source_estimate_id"], data["estimate"]["id"]);

        let db = &dispatcher.context().db;
        assert_eq!(db.invoices().count(OWNER).await.unwrap(), 3);
        let stored = db.estimates().get_by_reference(OWNER, "INV-005").await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Converted);
        assert!(stored.is_accepted);
    }

    #[tokio::test]
    async fn test_converting_twice_is_a_conflict() {
        let dispatcher = setup().await;
        dispatcher
            .execute("create_estimate", document("Beta Ltd", "Fencing", 400), OWNER)
            .await;

        let first = dispatcher
            .execute("convert_estimate_to_invoice", json!({}), OWNER)
            .await;
        assert!(first.success, "{}", first.message);

        let second = dispatcher
            .execute("convert_estimate_to_invoice", json!({}), OWNER)
            .await;
        assert_eq!(second.code, Some(ErrorCode::Conflict));
        assert_eq!(dispatcher.context().db.invoices().count(OWNER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_item_copy_rolls_back_conversion() {
        let dispatcher = setup().await;
        dispatcher
            .execute("create_estimate", document("Beta Ltd", "Fencing", 400), OWNER)
            .await;

        sqlx::query(
            "CREATE TRIGGER block_invoice_items BEFORE INSERT ON invoice_items \
             BEGIN SELECT RAISE(ABORT, 'items unavailable'); END;",
        )
        .execute(dispatcher.context().db.pool())
        .await
        .unwrap();

        let result = dispatcher
            .execute("convert_estimate_to_invoice", json!({ "reference_number": "INV-001" }), OWNER)
            .await;
        assert_eq!(result.code, Some(ErrorCode::PartialFailure));

        let db = &dispatcher.context().db;
        assert_eq!(db.invoices().count(OWNER).await.unwrap(), 0);
        let estimate = db.estimates().get_by_reference(OWNER, "INV-001").await.unwrap().unwrap();
        assert_eq!(estimate.status, DocumentStatus::Draft);
        assert!(estimate.converted_to_invoice_id.is_none());
    }
}
