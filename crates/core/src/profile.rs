//! User profiles and roles.
//!
//! Profiles are created by an out-of-band allow-list/signup process;
//! this application only ever reads them and (as admin) changes the
//! role field.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// The role assigned to a profile.
///
/// Serialized as the snake_case strings stored by the gateway
/// (`"admin"`, `"teacher"`, `"whanau_leader"`, `"student"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    WhanauLeader,
    Student,
}

/// All roles, in the order they are offered in admin role pickers.
pub const ALL_ROLES: &[Role] = &[Role::Admin, Role::Teacher, Role::WhanauLeader, Role::Student];

impl Role {
    /// The stored string form of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::WhanauLeader => "whanau_leader",
            Role::Student => "student",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user profile row, keyed by the auth user's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Foreign key to the gateway's auth user.
    pub id: UserId,
    pub full_name: String,
    /// Present when the gateway exposes it; some deployments keep the
    /// email only on the auth record.
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}
