//! # Reference Number Sequencer
//!
//! Hands out the next reference number of an owner's shared
//! invoice/estimate sequence. Never fails: when the template cannot be
//! read or the datastore is unavailable it falls back to a
//! timestamp-suffixed reference.
//!
//! Invoices and estimates live in separate tables, so the database cannot
//! keep their numbers apart. Callers take the owner's [`SequenceLease`]
//! before sequencing and hold it until the document is stored.

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use billwise_core::reference::timestamp_reference;
use billwise_core::{DocumentKind, ReferenceFormat};
use billwise_db::Database;

use crate::error::{EngineError, EngineResult};

/// Candidates tried past an already-taken number before giving up.
const MAX_PROBES: u64 = 50;

type OwnerLocks = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Exclusive hold on one owner's reference sequence. Released on drop.
#[derive(Debug)]
pub struct SequenceLease {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Debug, Clone)]
pub struct ReferenceSequencer {
    db: Database,
    locks: Arc<Mutex<OwnerLocks>>,
}

impl ReferenceSequencer {
    pub fn new(db: Database) -> Self {
        ReferenceSequencer {
            db,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Waits for the owner's sequence. Allocation and insert both happen
    /// under the lease.
    pub async fn lease(&self, owner_id: &str) -> SequenceLease {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on
            locks.retain(|owner, lock| owner == owner_id || Arc::strong_count(lock) > 1);
            locks.entry(owner_id.to_string()).or_default().clone()
        };
        SequenceLease {
            _guard: lock.lock_owned().await,
        }
    }

    /// Next reference for a document issued on `issue_date`.
    pub async fn next_reference(
        &self,
        owner_id: &str,
        kind: DocumentKind,
        issue_date: NaiveDate,
    ) -> String {
        match self.sequenced(owner_id, issue_date).await {
            Ok(reference) => {
                debug!(owner_id = %owner_id, kind = %kind, reference = %reference, "Next reference");
                reference
            }
            Err(e) => {
                let prefix = self.prefix_for(owner_id, kind).await;
                let reference = timestamp_reference(&prefix, Utc::now().timestamp_millis());
                warn!(
                    owner_id = %owner_id,
                    kind = %kind,
                    error = %e,
                    reference = %reference,
                    "Sequencing failed, using timestamp reference"
                );
                reference
            }
        }
    }

    async fn sequenced(&self, owner_id: &str, issue_date: NaiveDate) -> EngineResult<String> {
        let settings = self.db.settings().get_or_default(owner_id).await?;
        let format = ReferenceFormat::parse(&settings.reference_format)?;
        let max = self.db.references().max_suffix(owner_id).await?;

        let references = self.db.references();
        for number in (max + 1)..=(max + MAX_PROBES) {
            let candidate = format.format(number, issue_date);
            // A template change can make an old number format the same way
            if !references.exists(owner_id, &candidate).await? {
                return Ok(candidate);
            }
        }
        Err(EngineError::internal(format!(
            "no free reference after {}",
            max + MAX_PROBES
        )))
    }

    /// Template prefix when it can be read, otherwise the kind's default.
    async fn prefix_for(&self, owner_id: &str, kind: DocumentKind) -> String {
        let template = match self.db.settings().get(owner_id).await {
            Ok(Some(settings)) => settings.reference_format,
            _ => return kind.fallback_prefix().to_string(),
        };
        match ReferenceFormat::parse(&template) {
            Ok(format) => format.fallback_prefix(kind.fallback_prefix()).to_string(),
            Err(_) => kind.fallback_prefix().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billwise_core::BusinessSettings;
    use billwise_db::DbConfig;
    use std::time::Duration;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[tokio::test]
    async fn test_first_reference_uses_default_template() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sequencer = ReferenceSequencer::new(db);

        let reference = sequencer
            .next_reference("owner-1", DocumentKind::Invoice, day())
            .await;
        assert_eq!(reference, "INV-001");
    }

    #[tokio::test]
    async fn test_template_with_year_and_month() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut settings = BusinessSettings::defaults_for("owner-1", Utc::now());
        settings.reference_format = "Q-YYYY-MM-0001".to_string();
        db.settings().upsert(&settings).await.unwrap();

        let sequencer = ReferenceSequencer::new(db);
        let reference = sequencer
            .next_reference("owner-1", DocumentKind::Estimate, day())
            .await;
        assert_eq!(reference, "Q-2026-10-0001");
    }

    #[tokio::test]
    async fn test_broken_template_falls_back_to_timestamp() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut settings = BusinessSettings::defaults_for("owner-1", Utc::now());
        settings.reference_format = "MY INVOICES".to_string();
        db.settings().upsert(&settings).await.unwrap();

        let sequencer = ReferenceSequencer::new(db);
        let reference = sequencer
            .next_reference("owner-1", DocumentKind::Estimate, day())
            .await;

        let (prefix, digits) = reference.split_once('-').unwrap();
        assert_eq!(prefix, "EST");
        assert_eq!(digits.len(), 6);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_per_owner() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sequencer = ReferenceSequencer::new(db);

        let held = sequencer.lease("owner-1").await;

        // Another owner is not blocked
        let other = tokio::time::timeout(Duration::from_millis(50), sequencer.lease("owner-2")).await;
        assert!(other.is_ok());

        let waiting = tokio::time::timeout(Duration::from_millis(50), sequencer.lease("owner-1")).await;
        assert!(waiting.is_err());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), sequencer.lease("owner-1")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_closed_database_falls_back_to_timestamp() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        let sequencer = ReferenceSequencer::new(db);
        let reference = sequencer
            .next_reference("owner-1", DocumentKind::Invoice, day())
            .await;
        assert!(reference.starts_with("INV-"));
        assert_eq!(reference.len(), "INV-".len() + 6);
    }
}
