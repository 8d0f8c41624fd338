//! # Creation Guard
//!
//! Keeps two creations of the same kind for the same owner from running at
//! once, and rejects an identical create that arrives right after one
//! finished.
//!
//! ## Acquire Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  acquire(owner, kind, fingerprint)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sweep entries past their deadline                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  same fingerprint completed < duplicate window ago? ──yes──► Duplicate  │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  (owner, kind) in flight? ──no──► register token ──► CreationPermit     │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  sleep(grace), check once more ─held or done─► Locked ("in progress")   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The permit releases its entry when dropped, whether the creation
//! succeeded or not. [`CreationPermit::complete`] additionally leaves the
//! fingerprint behind for the duplicate window.
//!
//! Semantics are best-effort and process-local. A shared implementation
//! (e.g. backed by a datastore) can be plugged in through [`CreationGuard`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use billwise_core::DocumentKind;

// =============================================================================
// Public API
// =============================================================================

/// Timing of the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// Wait before the second look at a held lock.
    pub grace: Duration,
    /// In-flight entries older than this are considered abandoned.
    pub stale_after: Duration,
    /// How long a completed fingerprint rejects an identical request.
    pub duplicate_window: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            grace: Duration::from_secs(1),
            stale_after: Duration::from_secs(30),
            duplicate_window: Duration::from_secs(10),
        }
    }
}

/// Why a creation was not allowed to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardRejection {
    #[error("Another {kind} is being created right now. Please wait a moment and try again; the first request is still in progress.")]
    Locked { kind: DocumentKind },

    #[error("An identical {kind} was just created. Please wait before repeating the same request.")]
    Duplicate { kind: DocumentKind },
}

/// Serialises document creation per (owner, kind).
#[async_trait]
pub trait CreationGuard: Send + Sync {
    async fn acquire(
        &self,
        owner_id: &str,
        kind: DocumentKind,
        fingerprint: &str,
    ) -> Result<CreationPermit, GuardRejection>;
}

/// Lock key: one creation per owner and document kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub owner_id: String,
    pub kind: DocumentKind,
}

impl LockKey {
    pub fn new(owner_id: &str, kind: DocumentKind) -> Self {
        LockKey {
            owner_id: owner_id.to_string(),
            kind,
        }
    }
}

/// Where a permit goes back to when dropped.
pub trait PermitRelease: Send + Sync {
    /// `completed` carries the fingerprint of a successful creation.
    fn release(&self, key: &LockKey, token: u64, completed: Option<String>);
}

/// Proof that the caller holds the (owner, kind) creation slot.
pub struct CreationPermit {
    key: LockKey,
    token: u64,
    fingerprint: String,
    completed: bool,
    releaser: Arc<dyn PermitRelease>,
}

impl CreationPermit {
    pub fn new(
        key: LockKey,
        token: u64,
        fingerprint: impl Into<String>,
        releaser: Arc<dyn PermitRelease>,
    ) -> Self {
        CreationPermit {
            key,
            token,
            fingerprint: fingerprint.into(),
            completed: false,
            releaser,
        }
    }

    /// Marks the creation as persisted and releases the slot.
    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for CreationPermit {
    fn drop(&mut self) {
        let completed = self.completed.then(|| std::mem::take(&mut self.fingerprint));
        self.releaser.release(&self.key, self.token, completed);
    }
}

impl std::fmt::Debug for CreationPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationPermit")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish()
    }
}

// =============================================================================
// Local (in-process) implementation
// =============================================================================

#[derive(Debug)]
struct InFlight {
    token: u64,
    deadline: Instant,
}

#[derive(Debug)]
struct Completed {
    fingerprint: String,
    expires: Instant,
}

#[derive(Debug, Default)]
struct GuardTable {
    in_flight: HashMap<LockKey, InFlight>,
    completed: HashMap<LockKey, Vec<Completed>>,
}

impl GuardTable {
    fn sweep(&mut self, now: Instant) {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, entry| entry.deadline > now);
        let swept = before - self.in_flight.len();
        if swept > 0 {
            warn!(swept, "Removed stale creation locks");
        }

        self.completed.retain(|_, tombstones| {
            tombstones.retain(|t| t.expires > now);
            !tombstones.is_empty()
        });
    }

    fn is_duplicate(&self, key: &LockKey, fingerprint: &str) -> bool {
        self.completed
            .get(key)
            .is_some_and(|tombstones| tombstones.iter().any(|t| t.fingerprint == fingerprint))
    }
}

#[derive(Debug)]
struct GuardState {
    config: GuardConfig,
    table: Mutex<GuardTable>,
    next_token: AtomicU64,
}

impl GuardState {
    fn table(&self) -> MutexGuard<'_, GuardTable> {
        // A panic while holding the lock leaves the map usable
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PermitRelease for GuardState {
    fn release(&self, key: &LockKey, token: u64, completed: Option<String>) {
        let now = Instant::now();
        let mut table = self.table();

        // A stale sweep may have handed the slot to someone else already
        if table.in_flight.get(key).is_some_and(|e| e.token == token) {
            table.in_flight.remove(key);
        }

        if let Some(fingerprint) = completed {
            table
                .completed
                .entry(key.clone())
                .or_default()
                .push(Completed {
                    fingerprint,
                    expires: now + self.config.duplicate_window,
                });
        }
        debug!(owner_id = %key.owner_id, kind = %key.kind, token, "Creation slot released");
    }
}

/// Process-local guard over a `std::sync::Mutex<HashMap>`.
///
/// The mutex is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct LocalCreationGuard {
    state: Arc<GuardState>,
}

impl LocalCreationGuard {
    pub fn new(config: GuardConfig) -> Self {
        LocalCreationGuard {
            state: Arc::new(GuardState {
                config,
                table: Mutex::new(GuardTable::default()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Single look at the table: register, or report why not.
    fn try_register(&self, key: &LockKey, fingerprint: &str) -> Result<u64, GuardRejection> {
        let now = Instant::now();
        let mut table = self.state.table();
        table.sweep(now);

        if table.is_duplicate(key, fingerprint) {
            return Err(GuardRejection::Duplicate { kind: key.kind });
        }
        if table.in_flight.contains_key(key) {
            return Err(GuardRejection::Locked { kind: key.kind });
        }

        let token = self.state.next_token.fetch_add(1, Ordering::Relaxed);
        table.in_flight.insert(
            key.clone(),
            InFlight {
                token,
                deadline: now + self.state.config.stale_after,
            },
        );
        Ok(token)
    }

    /// Number of creations currently in flight (all owners).
    pub fn in_flight(&self) -> usize {
        self.state.table().in_flight.len()
    }
}

impl Default for LocalCreationGuard {
    fn default() -> Self {
        LocalCreationGuard::new(GuardConfig::default())
    }
}

#[async_trait]
impl CreationGuard for LocalCreationGuard {
    async fn acquire(
        &self,
        owner_id: &str,
        kind: DocumentKind,
        fingerprint: &str,
    ) -> Result<CreationPermit, GuardRejection> {
        let key = LockKey::new(owner_id, kind);

        let token = match self.try_register(&key, fingerprint) {
            Ok(token) => token,
            Err(GuardRejection::Locked { .. }) => {
                debug!(owner_id = %owner_id, kind = %kind, "Creation in flight, waiting grace interval");
                tokio::time::sleep(self.state.config.grace).await;
                self.try_register(&key, fingerprint).map_err(|_| {
                    // Whatever finished meanwhile was the request this one waited on
                    let rejection = GuardRejection::Locked { kind };
                    warn!(owner_id = %owner_id, kind = %kind, %rejection, "Creation rejected by guard");
                    rejection
                })?
            }
            Err(rejection) => {
                warn!(owner_id = %owner_id, kind = %kind, %rejection, "Creation rejected by guard");
                return Err(rejection);
            }
        };

        let releaser: Arc<dyn PermitRelease> = self.state.clone();
        Ok(CreationPermit::new(key, token, fingerprint, releaser))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_guard() -> LocalCreationGuard {
        LocalCreationGuard::new(GuardConfig {
            grace: Duration::from_millis(20),
            stale_after: Duration::from_secs(30),
            duplicate_window: Duration::from_secs(10),
        })
    }

    #[tokio::test]
    async fn test_second_acquire_is_locked_while_held() {
        let guard = fast_guard();
        let permit = guard
            .acquire("owner-1", DocumentKind::Invoice, "a")
            .await
            .unwrap();

        let second = guard.acquire("owner-1", DocumentKind::Invoice, "b").await;
        assert_eq!(
            second.unwrap_err(),
            GuardRejection::Locked {
                kind: DocumentKind::Invoice
            }
        );
        drop(permit);
        assert_eq!(guard.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let guard = fast_guard();
        let _invoice = guard
            .acquire("owner-1", DocumentKind::Invoice, "a")
            .await
            .unwrap();

        assert!(guard.acquire("owner-1", DocumentKind::Estimate, "a").await.is_ok());
        assert!(guard.acquire("owner-2", DocumentKind::Invoice, "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_creation_releases_without_tombstone() {
        let guard = fast_guard();
        let permit = guard
            .acquire("owner-1", DocumentKind::Invoice, "same")
            .await
            .unwrap();
        drop(permit);

        // Same fingerprint may retry after a failure
        assert!(guard.acquire("owner-1", DocumentKind::Invoice, "same").await.is_ok());
    }

    #[tokio::test]
    async fn test_completed_fingerprint_rejects_identical_request() {
        let guard = fast_guard();
        guard
            .acquire("owner-1", DocumentKind::Invoice, "same")
            .await
            .unwrap()
            .complete();

        let again = guard.acquire("owner-1", DocumentKind::Invoice, "same").await;
        assert!(matches!(again, Err(GuardRejection::Duplicate { .. })));

        // A different request is fine
        assert!(guard.acquire("owner-1", DocumentKind::Invoice, "other").await.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_gets_slot_when_holder_finishes_in_grace() {
        let guard = LocalCreationGuard::new(GuardConfig {
            grace: Duration::from_millis(200),
            ..GuardConfig::default()
        });
        let permit = guard
            .acquire("owner-1", DocumentKind::Estimate, "first")
            .await
            .unwrap();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(permit);
        });

        let second = guard.acquire("owner-1", DocumentKind::Estimate, "second").await;
        releaser.await.unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_for_identical_request_reports_in_progress() {
        let guard = LocalCreationGuard::new(GuardConfig {
            grace: Duration::from_millis(200),
            ..GuardConfig::default()
        });
        let permit = guard
            .acquire("owner-1", DocumentKind::Invoice, "same")
            .await
            .unwrap();

        let finisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            permit.complete();
        });

        let second = guard.acquire("owner-1", DocumentKind::Invoice, "same").await;
        finisher.await.unwrap();
        assert_eq!(
            second.unwrap_err(),
            GuardRejection::Locked {
                kind: DocumentKind::Invoice
            }
        );

        // A fresh request after the wait still sees the duplicate
        let later = guard.acquire("owner-1", DocumentKind::Invoice, "same").await;
        assert!(matches!(later, Err(GuardRejection::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_stale_entries_are_swept() {
        let guard = LocalCreationGuard::new(GuardConfig {
            grace: Duration::from_millis(10),
            stale_after: Duration::from_millis(30),
            duplicate_window: Duration::from_secs(10),
        });
        let abandoned = guard
            .acquire("owner-1", DocumentKind::Invoice, "a")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let fresh = guard.acquire("owner-1", DocumentKind::Invoice, "b").await;
        assert!(fresh.is_ok());

        // The abandoned permit must not release the new holder's slot
        drop(abandoned);
        assert_eq!(guard.in_flight(), 1);
    }

    #[test]
    fn test_rejection_messages() {
        let locked = GuardRejection::Locked {
            kind: DocumentKind::Invoice,
        };
        assert!(locked.to_string().contains("in progress"));
        assert!(locked.to_string().contains("invoice"));
    }
}
