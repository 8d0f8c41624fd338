//! # Client Matching
//!
//! Decides whether a name (and optional email) the model produced refers to
//! a client the owner already has.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Strategy         Rule                                     first wins  │
//! │  ───────────────  ───────────────────────────────────────  ─────────── │
//! │  Email            emails equal (case-insensitive)               1      │
//! │  ExactName        names equal (case-insensitive)                2      │
//! │  Substring        one name contains the other                   3      │
//! │  Normalized       equal after stripping Corp/Inc/LLC/...        4      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cascade is permissive on purpose: "Acme" finds "Acme Corp East".
//! Within one strategy the earliest candidate wins, so callers pass
//! candidates oldest first.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Client;

/// Words dropped by [`normalize_company_name`].
pub const LEGAL_SUFFIXES: &[&str] = &[
    "corp",
    "corporation",
    "inc",
    "incorporated",
    "llc",
    "ltd",
    "limited",
    "co",
    "company",
    "group",
    "sales",
    "solutions",
    "services",
    "consulting",
    "enterprises",
    "holdings",
    "partners",
    "plc",
    "gmbh",
];

/// Which rule found the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Email,
    ExactName,
    Substring,
    Normalized,
}

impl MatchStrategy {
    /// The cascade, in the order it is tried.
    pub const CASCADE: [MatchStrategy; 4] = [
        MatchStrategy::Email,
        MatchStrategy::ExactName,
        MatchStrategy::Substring,
        MatchStrategy::Normalized,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Email => "email",
            MatchStrategy::ExactName => "exact_name",
            MatchStrategy::Substring => "substring",
            MatchStrategy::Normalized => "normalized",
        }
    }

    /// Runs this one strategy over `candidates`.
    pub fn find<'a>(&self, query: &ClientQuery<'_>, candidates: &'a [Client]) -> Option<&'a Client> {
        match self {
            MatchStrategy::Email => {
                let email = query.email.map(str::trim).filter(|e| !e.is_empty())?;
                candidates.iter().find(|c| {
                    c.email
                        .as_deref()
                        .is_some_and(|stored| stored.trim().eq_ignore_ascii_case(email))
                })
            }
            MatchStrategy::ExactName => {
                let name = query.name.trim().to_lowercase();
                candidates
                    .iter()
                    .find(|c| c.name.trim().to_lowercase() == name)
            }
            MatchStrategy::Substring => {
                let name = query.name.trim().to_lowercase();
                if name.is_empty() {
                    return None;
                }
                candidates.iter().find(|c| {
                    let stored = c.name.trim().to_lowercase();
                    !stored.is_empty() && (stored.contains(&name) || name.contains(&stored))
                })
            }
            MatchStrategy::Normalized => {
                let name = normalize_company_name(query.name);
                if name.is_empty() {
                    return None;
                }
                candidates
                    .iter()
                    .find(|c| normalize_company_name(&c.name) == name)
            }
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller is looking for.
#[derive(Debug, Clone, Copy)]
pub struct ClientQuery<'q> {
    pub name: &'q str,
    pub email: Option<&'q str>,
}

impl<'q> ClientQuery<'q> {
    pub fn new(name: &'q str, email: Option<&'q str>) -> Self {
        ClientQuery { name, email }
    }
}

/// Runs the whole cascade and reports the strategy that matched.
///
/// ## Example
/// ```rust
/// use billwise_core::matching::{find_match, ClientQuery, MatchStrategy};
/// # use billwise_core::Client;
/// # use chrono::Utc;
/// # let client = |name: &str| Client {
/// #     id: name.to_string(), owner_id: "o".into(), name: name.to_string(),
/// #     email: None, phone: None, address: None, tax_id: None, notes: None,
/// #     created_at: Utc::now(), updated_at: Utc::now(),
/// # };
/// let clients = vec![client("ACME, Inc.")];
/// let (found, strategy) = find_match(&ClientQuery::new("Acme Corp", None), &clients).unwrap();
///
/// assert_eq!(found.name, "ACME, Inc.");
/// assert_eq!(strategy, MatchStrategy::Normalized);
/// ```
pub fn find_match<'a>(
    query: &ClientQuery<'_>,
    candidates: &'a [Client],
) -> Option<(&'a Client, MatchStrategy)> {
    MatchStrategy::CASCADE
        .iter()
        .find_map(|strategy| strategy.find(query, candidates).map(|c| (c, *strategy)))
}

/// Lowercases, drops punctuation and legal-entity words, collapses spaces.
///
/// `"Acme Corp."` and `"ACME corporation"` both become `"acme"`.
pub fn normalize_company_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_lowercase()
            } else if c == '&' {
                ' '
            } else {
                // "A.C.M.E." stays one word
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| !LEGAL_SUFFIXES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Unit Tests
// =============================================================================
