//! The gateway contract.
//!
//! Everything the application knows how to ask of the hosted platform
//! lives behind this trait: row reads and writes, the three opaque
//! server-side procedures, auth, and realtime subscriptions. Handing
//! components an `Arc<dyn Gateway>` (instead of a global client)
//! keeps every surface testable against [`MemoryGateway`].
//!
//! [`MemoryGateway`]: crate::memory::MemoryGateway

use async_trait::async_trait;
use tokio::sync::broadcast;

use houseboard_core::allowed_email::AllowedEmail;
use houseboard_core::types::{RequestId, UserId};
use houseboard_core::validation::PointsInput;
use houseboard_core::{House, PointRequest, Profile, Role};

use crate::auth::{AuthEvent, Session};
use crate::change::{ChangeFilter, ChangeTable, Subscription};
use crate::error::GatewayError;

#[async_trait]
pub trait Gateway: Send + Sync {
    // ---- row reads/writes ----

    /// Fetch all houses.
    async fn houses(&self) -> Result<Vec<House>, GatewayError>;

    /// Admin direct edit of a house's point total.
    async fn set_house_points(&self, house_id: &str, points: i64) -> Result<(), GatewayError>;

    /// Fetch all profiles.
    async fn profiles(&self) -> Result<Vec<Profile>, GatewayError>;

    /// Fetch one profile by user id, `None` if it does not exist.
    async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, GatewayError>;

    /// Admin role change.
    async fn set_profile_role(&self, profile_id: UserId, role: Role) -> Result<(), GatewayError>;

    /// Fetch all point requests, newest first, with display joins
    /// (teacher name, house name, reviewer name) populated.
    async fn point_requests(&self) -> Result<Vec<PointRequest>, GatewayError>;

    /// Insert a new `Pending` point request for the given teacher.
    async fn insert_point_request(
        &self,
        teacher_id: UserId,
        input: &PointsInput,
    ) -> Result<(), GatewayError>;

    /// Reject a request: a plain row update stamping the reviewer.
    ///
    /// Unlike approval this is not wrapped in a server-side procedure
    /// -- rejection has no point effect, so there is nothing to keep
    /// atomic with it.
    async fn reject_request(
        &self,
        request_id: RequestId,
        reviewer_id: UserId,
    ) -> Result<(), GatewayError>;

    /// Fetch the admin allow-list, newest first.
    async fn allowed_emails(&self) -> Result<Vec<AllowedEmail>, GatewayError>;

    /// Insert or update an allow-list entry.
    async fn upsert_allowed_email(
        &self,
        email: &str,
        role: Role,
        note: Option<&str>,
    ) -> Result<(), GatewayError>;

    /// Delete an allow-list entry.
    async fn delete_allowed_email(&self, email: &str) -> Result<(), GatewayError>;

    // ---- server-side procedures (opaque, assumed atomic) ----

    /// Add points directly and record an approved request for audit.
    async fn add_manual_points(&self, input: &PointsInput) -> Result<(), GatewayError>;

    /// Mark a request approved and increment the referenced house's
    /// total, atomically.
    async fn approve_request(&self, request_id: RequestId) -> Result<(), GatewayError>;

    /// Delete all point requests, delete all profiles except the
    /// caller's, and zero all house totals.
    async fn reset_project(&self) -> Result<(), GatewayError>;

    // ---- auth ----

    /// Password sign-in returning the session and the resolved
    /// profile. An authenticated user without a profile is an error.
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Session, Profile), GatewayError>;

    /// Build the redirect URL that starts a federated sign-in flow.
    fn provider_sign_in_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, GatewayError>;

    /// The current session, if any.
    async fn session(&self) -> Option<Session>;

    /// End the current session. The local session is cleared even if
    /// the remote call fails.
    async fn sign_out(&self) -> Result<(), GatewayError>;

    /// Push stream of auth-state transitions.
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;

    // ---- realtime ----

    /// Register interest in one table's changes.
    async fn subscribe(
        &self,
        table: ChangeTable,
        filter: ChangeFilter,
    ) -> Result<Subscription, GatewayError>;
}
