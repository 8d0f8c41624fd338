//! # Entity Resolver
//!
//! Finds the client a command talks about, or creates it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "invoice Acme corporation for 2 hours"                                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ClientStore::candidates(owner) ──► matching::find_match                │
//! │        │                            email → exact → substring → normal. │
//! │        ├── Some((client, strategy)) ──► Resolution::Matched(strategy)   │
//! │        └── None ──► ClientStore::insert ──► Resolution::Created         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use billwise_core::matching::{find_match, ClientQuery, MatchStrategy};
use billwise_core::validation::{validate_email, validate_name};
use billwise_core::Client;
use billwise_db::{generate_id, ClientRepository, DbResult};

use crate::error::EngineResult;

/// Where the resolver reads and writes clients.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Every client of the owner, oldest first.
    async fn candidates(&self, owner_id: &str) -> DbResult<Vec<Client>>;

    async fn insert(&self, client: &Client) -> DbResult<()>;
}

#[async_trait]
impl ClientStore for ClientRepository {
    async fn candidates(&self, owner_id: &str) -> DbResult<Vec<Client>> {
        self.list(owner_id).await
    }

    async fn insert(&self, client: &Client) -> DbResult<()> {
        ClientRepository::insert(self, client).await
    }
}

/// Client details as given in a command.
#[derive(Debug, Clone, Default)]
pub struct ClientInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ClientInput {
    pub fn named(name: impl Into<String>) -> Self {
        ClientInput {
            name: name.into(),
            ..ClientInput::default()
        }
    }
}

/// How the client was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", content = "strategy", rename_all = "snake_case")]
pub enum Resolution {
    Matched(MatchStrategy),
    Created,
}

impl Resolution {
    pub fn describe(&self) -> String {
        match self {
            Resolution::Matched(MatchStrategy::Email) => "matched by email".to_string(),
            Resolution::Matched(MatchStrategy::ExactName) => "matched by name".to_string(),
            Resolution::Matched(MatchStrategy::Substring) => "matched by partial name".to_string(),
            Resolution::Matched(MatchStrategy::Normalized) => {
                "matched ignoring company suffixes".to_string()
            }
            Resolution::Created => "new client".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedClient {
    pub client: Client,
    pub resolution: Resolution,
}

/// Find-or-create over any [`ClientStore`].
#[derive(Debug, Clone)]
pub struct EntityResolver<S> {
    store: S,
}

impl<S: ClientStore> EntityResolver<S> {
    pub fn new(store: S) -> Self {
        EntityResolver { store }
    }

    /// Existing client only; `None` when nothing matches.
    pub async fn find(
        &self,
        owner_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> EngineResult<Option<(Client, MatchStrategy)>> {
        let candidates = self.store.candidates(owner_id).await?;
        let query = ClientQuery::new(name, email);
        Ok(find_match(&query, &candidates).map(|(client, strategy)| (client.clone(), strategy)))
    }

    pub async fn resolve(&self, owner_id: &str, input: &ClientInput) -> EngineResult<ResolvedClient> {
        let name = validate_name("client_name", &input.name)?;
        let email = match input.email.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => Some(validate_email(e)?),
            _ => None,
        };

        if let Some((client, strategy)) = self.find(owner_id, &name, email.as_deref()).await? {
            debug!(
                owner_id = %owner_id,
                requested = %name,
                client = %client.name,
                strategy = %strategy,
                "Resolved existing client"
            );
            return Ok(ResolvedClient {
                client,
                resolution: Resolution::Matched(strategy),
            });
        }

        let now = Utc::now();
        let client = Client {
            id: generate_id(),
            owner_id: owner_id.to_string(),
            name,
            email,
            phone: non_blank(input.phone.as_deref()),
            address: non_blank(input.address.as_deref()),
            tax_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&client).await?;
        info!(owner_id = %owner_id, client = %client.name, "Created client");

        Ok(ResolvedClient {
            client,
            resolution: Resolution::Created,
        })
    }
}

/// `None` for missing or whitespace-only values.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        clients: Mutex<Vec<Client>>,
    }

    #[async_trait]
    impl ClientStore for MemoryStore {
        async fn candidates(&self, owner_id: &str) -> DbResult<Vec<Client>> {
            Ok(self
                .clients
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.owner_id == owner_id)
                .cloned()
                .collect())
        }

        async fn insert(&self, client: &Client) -> DbResult<()> {
            self.clients.lock().unwrap().push(client.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_creates_then_matches_suffix_variant() {
        let resolver = EntityResolver::new(MemoryStore::default());

        let first = resolver
            .resolve("owner-1", &ClientInput::named("ACME, Inc."))
            .await
            .unwrap();
        assert_eq!(first.resolution, Resolution::Created);

        let second = resolver
            .resolve("owner-1", &ClientInput::named("Acme Corp"))
            .await
            .unwrap();
        assert_eq!(second.client.id, first.client.id);
        assert_eq!(second.resolution, Resolution::Matched(MatchStrategy::Normalized));
    }

    #[tokio::test]
    async fn test_unrelated_name_creates_new_client() {
        let resolver = EntityResolver::new(MemoryStore::default());
        resolver
            .resolve("owner-1", &ClientInput::named("Acme Corp"))
            .await
            .unwrap();

        let other = resolver
            .resolve("owner-1", &ClientInput::named("Globex"))
            .await
            .unwrap();
        assert_eq!(other.resolution, Resolution::Created);
    }

    #[tokio::test]
    async fn test_owners_do_not_share_clients() {
        let resolver = EntityResolver::new(MemoryStore::default());
        resolver
            .resolve("owner-1", &ClientInput::named("Acme"))
            .await
            .unwrap();

        let elsewhere = resolver
            .resolve("owner-2", &ClientInput::named("Acme"))
            .await
            .unwrap();
        assert_eq!(elsewhere.resolution, Resolution::Created);
    }

    #[tokio::test]
    async fn test_email_wins_and_blank_fields_are_null() {
        let resolver = EntityResolver::new(MemoryStore::default());
        let input = ClientInput {
            name: "Beta Ltd".to_string(),
            email: Some("AP@beta.test".to_string()),
            phone: Some("  ".to_string()),
            address: None,
        };
        let created = resolver.resolve("owner-1", &input).await.unwrap();
        assert!(created.client.phone.is_none());

        let lookup = ClientInput {
            name: "Totally Different".to_string(),
            email: Some("ap@beta.test".to_string()),
            ..ClientInput::default()
        };
        let by_email = resolver.resolve("owner-1", &lookup).await.unwrap();
        assert_eq!(by_email.client.id, created.client.id);
        assert_eq!(by_email.resolution, Resolution::Matched(MatchStrategy::Email));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let resolver = EntityResolver::new(MemoryStore::default());
        assert!(resolver
            .resolve("owner-1", &ClientInput::named("   "))
            .await
            .is_err());

        let bad_email = ClientInput {
            name: "Acme".to_string(),
            email: Some("not-an-email".to_string()),
            ..ClientInput::default()
        };
        assert!(resolver.resolve("owner-1", &bad_email).await.is_err());
    }
}
