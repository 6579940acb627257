//! The session/identity holder.
//!
//! Resolves the current identity once on startup, then tracks the
//! gateway's auth-state notifications: `Loading -> Authenticated |
//! Anonymous`, with `sign_out` reachable from any state. A session
//! whose email falls outside the required domain is signed out
//! immediately (defense-in-depth; the authoritative gate is the
//! gateway's allow-list policy), and an authenticated user without a
//! profile row is treated as invalid the same way.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use houseboard_core::{Profile, Role};
use houseboard_gateway::{AuthEvent, AuthUser, Gateway, Session};

use crate::error::AppError;

/// The resolved identity state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Resolution in progress; nothing is known yet.
    Loading,
    /// No valid session.
    Anonymous,
    /// A signed-in user with its profile.
    Authenticated { user: AuthUser, profile: Profile },
}

impl SessionState {
    /// The signed-in role, if any. Feeds the navigation guard.
    pub fn role(&self) -> Option<Role> {
        match self {
            SessionState::Authenticated { profile, .. } => Some(profile.role),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

/// Holds the current identity and reacts to auth-state pushes.
pub struct SessionHolder {
    gateway: Arc<dyn Gateway>,
    email_domain: String,
    state_tx: Arc<watch::Sender<SessionState>>,
    // Retain a receiver so the watch channel always has one subscriber;
    // `watch::Sender::send` is a no-op when the receiver count is zero.
    _state_rx: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl SessionHolder {
    /// Resolve any existing session and start listening for auth
    /// changes. Never fails: every failure path settles in
    /// [`SessionState::Anonymous`].
    pub async fn start(gateway: Arc<dyn Gateway>, email_domain: impl Into<String>) -> Self {
        let email_domain = email_domain.into();
        let (state_tx, state_rx) = watch::channel(SessionState::Loading);
        let state_tx = Arc::new(state_tx);

        let initial = match gateway.session().await {
            Some(session) => admit(gateway.as_ref(), &email_domain, session).await,
            None => SessionState::Anonymous,
        };
        let _ = state_tx.send(initial);

        let cancel = CancellationToken::new();
        tokio::spawn(listen(
            Arc::clone(&gateway),
            email_domain.clone(),
            Arc::clone(&state_tx),
            cancel.clone(),
        ));

        Self {
            gateway,
            email_domain,
            state_tx,
            _state_rx: state_rx,
            cancel,
        }
    }

    /// Password sign-in. On success the state becomes
    /// [`SessionState::Authenticated`]; on failure the gateway's
    /// message is returned for inline display.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AppError> {
        let (session, profile) = self.gateway.sign_in(email, password).await?;

        if !email_in_domain(&session.user.email, &self.email_domain) {
            tracing::warn!(email = %session.user.email, "Signed-in email outside the allowed domain");
            if let Err(e) = self.gateway.sign_out().await {
                tracing::warn!(error = %e, "Sign-out after domain rejection failed");
            }
            let _ = self.state_tx.send(SessionState::Anonymous);
            return Err(AppError::Validation(format!(
                "Accounts must use the {} domain.",
                self.email_domain,
            )));
        }

        let _ = self.state_tx.send(SessionState::Authenticated {
            user: session.user,
            profile,
        });
        Ok(())
    }

    /// User-initiated sign-out; lands in `Anonymous` from any state.
    pub async fn sign_out(&self) {
        if let Err(e) = self.gateway.sign_out().await {
            tracing::warn!(error = %e, "Remote sign-out failed; clearing local identity anyway");
        }
        let _ = self.state_tx.send(SessionState::Anonymous);
    }

    /// The current identity state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Watch identity transitions.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Stop reacting to auth pushes. Idempotent; also runs on drop.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SessionHolder {
    fn drop(&mut self) {
        self.close();
    }
}

/// Case-insensitive required-suffix check.
fn email_in_domain(email: &str, domain: &str) -> bool {
    email.to_lowercase().ends_with(&domain.to_lowercase())
}

/// Validate a session and resolve its profile.
///
/// Domain violations and profileless users both invoke a gateway
/// sign-out and settle in `Anonymous`.
async fn admit(gateway: &dyn Gateway, email_domain: &str, session: Session) -> SessionState {
    if !email_in_domain(&session.user.email, email_domain) {
        tracing::warn!(email = %session.user.email, "Unauthorized domain; signing out");
        if let Err(e) = gateway.sign_out().await {
            tracing::warn!(error = %e, "Sign-out after domain rejection failed");
        }
        return SessionState::Anonymous;
    }

    match gateway.profile(session.user.id).await {
        Ok(Some(profile)) => SessionState::Authenticated {
            user: session.user,
            profile,
        },
        Ok(None) => {
            tracing::warn!(user_id = %session.user.id, "Session has no profile; signing out");
            if let Err(e) = gateway.sign_out().await {
                tracing::warn!(error = %e, "Sign-out after missing profile failed");
            }
            SessionState::Anonymous
        }
        Err(e) => {
            tracing::warn!(error = %e, "Profile fetch failed; signing out");
            if let Err(e) = gateway.sign_out().await {
                tracing::warn!(error = %e, "Sign-out after profile fetch failure failed");
            }
            SessionState::Anonymous
        }
    }
}

/// React to auth-state pushes until the holder is torn down.
async fn listen(
    gateway: Arc<dyn Gateway>,
    email_domain: String,
    state_tx: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
) {
    let mut events = gateway.auth_events();
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(AuthEvent::SignedIn(session)) => {
                // Re-resolve the profile on every push; a switch of
                // users must never keep the previous profile.
                let next = admit(gateway.as_ref(), &email_domain, session).await;
                if cancel.is_cancelled() {
                    break;
                }
                let _ = state_tx.send(next);
            }
            Ok(AuthEvent::SignedOut) => {
                let _ = state_tx.send(SessionState::Anonymous);
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Auth event stream lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
