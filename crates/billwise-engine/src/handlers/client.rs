//! Client handlers.
//!
//! Lookups by name go through the resolver's matching cascade, except
//! `delete_client`, which only accepts an id or an exact name.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use billwise_core::matching::MatchStrategy;
use billwise_core::validation::{validate_email, validate_name, validate_notes};
use billwise_core::Client;

use super::{limit, Outcome};
use crate::catalog::ClientOp;
use crate::dispatcher::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::handlers::DocumentSummary;
use crate::params::{
    self, ClientLookupParams, CreateClientParams, FindOrCreateClientParams, SearchClientsParams,
    UpdateClientParams,
};
use crate::resolver::{non_blank, ClientInput};

const DEFAULT_SEARCH_LIMIT: u32 = 20;

pub(crate) async fn handle(
    ctx: &EngineContext,
    op: ClientOp,
    name: &str,
    owner_id: &str,
    arguments: Value,
) -> EngineResult<Outcome> {
    debug!(owner_id = %owner_id, function = %name, "Handling client function");

    match op {
        ClientOp::Create => create(ctx, owner_id, params::parse(name, arguments)?).await,
        ClientOp::FindOrCreate => find_or_create(ctx, owner_id, params::parse(name, arguments)?).await,
        ClientOp::Get => get(ctx, owner_id, params::parse(name, arguments)?).await,
        ClientOp::Search => search(ctx, owner_id, params::parse(name, arguments)?).await,
        ClientOp::Update => update(ctx, owner_id, params::parse(name, arguments)?).await,
        ClientOp::Delete => delete(ctx, owner_id, params::parse(name, arguments)?).await,
        ClientOp::Documents => documents(ctx, owner_id, params::parse(name, arguments)?).await,
    }
}

async fn create(
    ctx: &EngineContext,
    owner_id: &str,
    params: CreateClientParams,
) -> EngineResult<Outcome> {
    let name = validate_name("name", &params.name)?;
    let email = optional_email(params.email.as_deref())?;

    let clients = ctx.db.clients();
    if let Some(existing) = clients.find_by_name(owner_id, &name).await? {
        return Err(EngineError::conflict(format!(
            "A client named {} already exists",
            existing.name
        )));
    }

    let now = Utc::now();
    let client = Client {
        id: billwise_db::generate_id(),
        owner_id: owner_id.to_string(),
        name,
        email,
        phone: non_blank(params.phone.as_deref()),
        address: non_blank(params.address.as_deref()),
        tax_id: non_blank(params.tax_id.as_deref()),
        notes: validate_notes(params.notes.as_deref())?,
        created_at: now,
        updated_at: now,
    };
    clients.insert(&client).await?;
    info!(owner_id = %owner_id, client = %client.name, "Client created");

    Outcome::new(format!("Added client {}.", client.name), &client)
}

async fn find_or_create(
    ctx: &EngineContext,
    owner_id: &str,
    params: FindOrCreateClientParams,
) -> EngineResult<Outcome> {
    let input = ClientInput {
        name: params.name,
        email: params.email,
        phone: params.phone,
        address: params.address,
    };
    let resolved = {
        let _lease = ctx.sequencer.lease(owner_id).await;
        ctx.resolver.resolve(owner_id, &input).await?
    };

    Outcome::new(
        format!("{} ({}).", resolved.client.name, resolved.resolution.describe()),
        json!({
            "client": resolved.client,
            "client_resolution": resolved.resolution,
        }),
    )
}

async fn get(ctx: &EngineContext, owner_id: &str, params: ClientLookupParams) -> EngineResult<Outcome> {
    let (client, strategy) = lookup(ctx, owner_id, &params).await?;

    let mut details = Vec::new();
    if let Some(email) = &client.email {
        details.push(email.clone());
    }
    if let Some(phone) = &client.phone {
        details.push(phone.clone());
    }
    let message = match details.is_empty() {
        true => format!("{}.", client.name),
        false => format!("{}: {}.", client.name, details.join(", ")),
    };
    Outcome::new(with_match_note(message, &params, &client, strategy), &client)
}

async fn search(
    ctx: &EngineContext,
    owner_id: &str,
    params: SearchClientsParams,
) -> EngineResult<Outcome> {
    let query = params.query.unwrap_or_default();
    let clients = ctx
        .db
        .clients()
        .search(owner_id, &query, limit(params.limit, DEFAULT_SEARCH_LIMIT))
        .await?;

    let message = if clients.is_empty() {
        "No clients match.".to_string()
    } else {
        format!(
            "Found {} client(s): {}.",
            clients.len(),
            clients
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    Outcome::new(message, json!({ "count": clients.len(), "clients": clients }))
}

async fn update(
    ctx: &EngineContext,
    owner_id: &str,
    params: UpdateClientParams,
) -> EngineResult<Outcome> {
    let lookup_params = ClientLookupParams {
        client_id: params.client_id.clone(),
        name: params.name.clone(),
    };
    let (mut client, _) = lookup(ctx, owner_id, &lookup_params).await?;
    let clients = ctx.db.clients();
    let mut changed = Vec::new();

    if let Some(new_name) = params.new_name.as_deref() {
        let new_name = validate_name("new_name", new_name)?;
        if let Some(other) = clients.find_by_name(owner_id, &new_name).await? {
            if other.id != client.id {
                return Err(EngineError::conflict(format!(
                    "A client named {} already exists",
                    other.name
                )));
            }
        }
        client.name = new_name;
        changed.push("name");
    }
    if params.email.is_some() {
        client.email = optional_email(params.email.as_deref())?;
        changed.push("email");
    }
    if params.phone.is_some() {
        client.phone = non_blank(params.phone.as_deref());
        changed.push("phone");
    }
    if params.address.is_some() {
        client.address = non_blank(params.address.as_deref());
        changed.push("address");
    }
    if params.tax_id.is_some() {
        client.tax_id = non_blank(params.tax_id.as_deref());
        changed.push("tax id");
    }
    if params.notes.is_some() {
        client.notes = validate_notes(params.notes.as_deref())?;
        changed.push("notes");
    }
    if changed.is_empty() {
        return Err(EngineError::validation(format!(
            "Nothing to change on client {}",
            client.name
        )));
    }

    client.updated_at = Utc::now();
    clients.update(&client).await?;
    info!(owner_id = %owner_id, client = %client.name, changed = ?changed, "Client updated");

    Outcome::new(
        format!("Updated {} of {}.", changed.join(", "), client.name),
        &client,
    )
}

async fn delete(
    ctx: &EngineContext,
    owner_id: &str,
    params: ClientLookupParams,
) -> EngineResult<Outcome> {
    let clients = ctx.db.clients();
    let client = match (non_blank(params.client_id.as_deref()), non_blank(params.name.as_deref())) {
        (Some(id), _) => clients
            .get_by_id(owner_id, &id)
            .await?
            .ok_or_else(|| EngineError::not_found("Client", id))?,
        (None, Some(name)) => clients
            .find_by_name(owner_id, &name)
            .await?
            .ok_or_else(|| EngineError::not_found("Client", name))?,
        (None, None) => return Err(EngineError::validation("Give the client_id or the exact name")),
    };

    clients.delete(owner_id, &client.id).await?;
    info!(owner_id = %owner_id, client = %client.name, "Client deleted");

    Outcome::new(
        format!(
            "Deleted client {}. Their invoices and estimates were kept.",
            client.name
        ),
        json!({ "deleted": client.name, "id": client.id }),
    )
}

#[derive(Debug, Serialize)]
struct ClientDocuments {
    client: Client,
    invoices: Vec<DocumentSummary>,
    estimates: Vec<DocumentSummary>,
}

async fn documents(
    ctx: &EngineContext,
    owner_id: &str,
    params: ClientLookupParams,
) -> EngineResult<Outcome> {
    let (client, strategy) = lookup(ctx, owner_id, &params).await?;
    let invoices = ctx.db.invoices().for_client(owner_id, &client.id).await?;
    let estimates = ctx.db.estimates().for_client(owner_id, &client.id).await?;

    let message = format!(
        "{} has {} invoice(s) and {} estimate(s).",
        client.name,
        invoices.len(),
        estimates.len()
    );
    let message = with_match_note(message, &params, &client, strategy);
    Outcome::new(
        message,
        ClientDocuments {
            client,
            invoices: invoices.iter().map(DocumentSummary::from).collect(),
            estimates: estimates.iter().map(DocumentSummary::from).collect(),
        },
    )
}

// =============================================================================
// Helpers
// =============================================================================

/// Client by id, or by name through the matching cascade.
async fn lookup(
    ctx: &EngineContext,
    owner_id: &str,
    params: &ClientLookupParams,
) -> EngineResult<(Client, Option<MatchStrategy>)> {
    if let Some(id) = non_blank(params.client_id.as_deref()) {
        let client = ctx
            .db
            .clients()
            .get_by_id(owner_id, &id)
            .await?
            .ok_or_else(|| EngineError::not_found("Client", id))?;
        return Ok((client, None));
    }

    let Some(name) = non_blank(params.name.as_deref()) else {
        return Err(EngineError::validation("Give the client_id or the client name"));
    };
    match ctx.resolver.find(owner_id, &name, None).await? {
        Some((client, strategy)) => Ok((client, Some(strategy))),
        None => Err(EngineError::not_found("Client", name)),
    }
}

/// Mentions a fuzzy match so the caller sees which client was used.
fn with_match_note(
    message: String,
    params: &ClientLookupParams,
    client: &Client,
    strategy: Option<MatchStrategy>,
) -> String {
    match (strategy, params.name.as_deref()) {
        (Some(MatchStrategy::Substring | MatchStrategy::Normalized), Some(asked)) => {
            format!("{} (closest match for \"{}\": {})", message, asked.trim(), client.name)
        }
        _ => message,
    }
}

fn optional_email(email: Option<&str>) -> EngineResult<Option<String>> {
    match email.map(str::trim) {
        Some(e) if !e.is_empty() => Ok(Some(validate_email(e)?)),
        _ => Ok(None),
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
    use billwise_db::{Database, DbConfig};

    const OWNER: &str = "owner-1";

    async fn setup() -> Dispatcher {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Dispatcher::new(db, EngineConfig::for_tests())
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let dispatcher = setup().await;
        let first = dispatcher
            .execute("create_client", json!({ "name": "Acme Corp", "email": "ap@acme.test" }), OWNER)
            .await;
        assert!(first.success, "{}", first.message);

        let second = dispatcher
            .execute("create_client", json!({ "name": "acme corp" }), OWNER)
            .await;
        assert!(!second.success);
        assert_eq!(second.code, Some(ErrorCode::Conflict));
    }

    #[tokio::test]
    async fn test_find_or_create_matches_normalized_name() {
        let dispatcher = setup().await;
        dispatcher
            .execute("create_client", json!({ "name": "ACME, Inc." }), OWNER)
            .await;

        let result = dispatcher
            .execute("find_or_create_client", json!({ "name": "Acme Corp" }), OWNER)
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["client"]["name"], "ACME, Inc.");
        assert_eq!(data["client_resolution"]["resolution"], "matched");
        assert_eq!(data["client_resolution"]["strategy"], "normalized");

        let count = dispatcher.context().db.clients().count(OWNER).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_find_or_create_racing_an_invoice_makes_one_client() {
        let dispatcher = setup().await;

        let (found, invoice) = tokio::join!(
            dispatcher.execute("find_or_create_client", json!({ "name": "Initech" }), OWNER),
            dispatcher.execute(
                "create_invoice",
                json!({ "client_name": "Initech", "line_items": [{ "name": "Work", "unit_price": 10 }] }),
                OWNER,
            ),
        );
        assert!(found.success, "{}", found.message);
        assert!(invoice.success, "{}", invoice.message);

        let count = dispatcher.context().db.clients().count(OWNER).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_get_by_partial_name_notes_the_match() {
        let dispatcher = setup().await;
        dispatcher
            .execute("create_client", json!({ "name": "Globex Corporation", "phone": "555-0100" }), OWNER)
            .await;

        let result = dispatcher
            .execute("get_client", json!({ "name": "globex" }), OWNER)
            .await;
        assert!(result.success);
        assert!(result.message.contains("555-0100"));
        assert!(result.message.contains("closest match"));

        let missing = dispatcher
            .execute("get_client", json!({ "name": "Initech" }), OWNER)
            .await;
        assert_eq!(missing.code, Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_update_and_clear_fields() {
        let dispatcher = setup().await;
        dispatcher
            .execute("create_client", json!({ "name": "Beta Ltd", "phone": "555" }), OWNER)
            .await;

        let result = dispatcher
            .execute(
                "update_client",
                json!({ "name": "Beta Ltd", "email": "billing@beta.test", "phone": "" }),
                OWNER,
            )
            .await;
        assert!(result.success, "{}", result.message);
        let data = result.data.unwrap();
        assert_eq!(data["email"], "billing@beta.test");
        assert!(data["phone"].is_null());

        let bad = dispatcher
            .execute("update_client", json!({ "name": "Beta Ltd", "email": "nope" }), OWNER)
            .await;
        assert_eq!(bad.code, Some(ErrorCode::ValidationError));
    }

    #[tokio::test]
    async fn test_delete_needs_exact_name_and_keeps_documents() {
        let dispatcher = setup().await;
        let created = dispatcher
            .execute("create_invoice", json!({ "client_name": "Acme Corp" }), OWNER)
            .await;
        assert!(created.success);

        let fuzzy = dispatcher
            .execute("delete_client", json!({ "name": "Acme" }), OWNER)
            .await;
        assert_eq!(fuzzy.code, Some(ErrorCode::NotFound));

        let exact = dispatcher
            .execute("delete_client", json!({ "name": "acme corp" }), OWNER)
            .await;
        assert!(exact.success, "{}", exact.message);

        let db = &dispatcher.context().db;
        assert_eq!(db.clients().count(OWNER).await.unwrap(), 0);
        assert_eq!(db.invoices().count(OWNER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_documents_lists_both_kinds() {
        let dispatcher = setup().await;
        for function in ["create_invoice", "create_estimate"] {
            let result = dispatcher
                .execute(function, json!({ "client_name": "Acme" }), OWNER)
                .await;
            assert!(result.success);
        }
        dispatcher
            .execute("create_invoice", json!({ "client_name": "Globex" }), OWNER)
            .await;

        let result = dispatcher
            .execute("get_client_documents", json!({ "name": "Acme" }), OWNER)
            .await;
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["invoices"].as_array().unwrap().len(), 1);
        assert_eq!(data["estimates"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_clients() {
        let dispatcher = setup().await;
        for name in ["Acme", "Globex", "Acme Labs"] {
            dispatcher
                .execute("create_client", json!({ "name": name }), OWNER)
                .await;
        }

        let result = dispatcher
            .execute("search_clients", json!({ "query": "acme" }), OWNER)
            .await;
        assert_eq!(result.data.unwrap()["count"], 2);
    }
}
