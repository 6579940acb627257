//! Sessions and auth-state change notifications.

use serde::{Deserialize, Serialize};

use houseboard_core::types::UserId;

/// The authenticated user as known to the gateway's auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// An authenticated session.
///
/// The access token is opaque to this application; it is attached to
/// requests and otherwise never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: AuthUser,
}

/// An auth-state transition pushed by the gateway.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}
