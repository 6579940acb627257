//! Admin-managed allow-list entries.
//!
//! An entry is either an exact email address or a whole-domain pattern
//! (`@example.school.nz`). The authoritative gating happens in the
//! gateway's policy layer; this type exists so the admin screens can
//! manage the list and so the matching rule is testable.

use serde::{Deserialize, Serialize};

use crate::profile::Role;
use crate::types::Timestamp;

/// One allow-list row: an email or domain pattern plus the default
/// role assigned on signup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowedEmail {
    /// Exact address (`jan@example.school.nz`) or domain pattern
    /// (`@example.school.nz`).
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: Timestamp,
}

impl AllowedEmail {
    /// Whether this entry permits the given address.
    ///
    /// Matching is case-insensitive. Domain entries (leading `@`)
    /// match any address ending in that suffix.
    pub fn permits(&self, candidate: &str) -> bool {
        let entry = self.email.to_lowercase();
        let candidate = candidate.to_lowercase();
        if let Some(domain) = entry.strip_prefix('@') {
            candidate
                .rsplit_once('@')
                .is_some_and(|(_, d)| d == domain)
        } else {
            entry == candidate
        }
    }
}
