//! In-memory implementation of the [`Gateway`] contract.
//!
//! Backs the application's tests (and local demos) with the same
//! observable behavior as the hosted platform: the three compound
//! procedures are atomic by construction, mutations publish change
//! events on the same feed the realtime channel would, and auth
//! resolves against seeded account fixtures.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use houseboard_core::allowed_email::AllowedEmail;
use houseboard_core::types::{RequestId, UserId};
use houseboard_core::validation::PointsInput;
use houseboard_core::{House, PointRequest, Profile, RequestStatus, Role};

use crate::auth::{AuthEvent, AuthUser, Session};
use crate::change::{ChangeEvent, ChangeFilter, ChangeKind, ChangeTable, Subscription};
use crate::client::Gateway;
use crate::error::GatewayError;

const CHANGE_CHANNEL_CAPACITY: usize = 256;
const AUTH_EVENT_CAPACITY: usize = 16;

/// Seeded login fixture.
struct Account {
    user_id: UserId,
    email: String,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    houses: Vec<House>,
    profiles: Vec<Profile>,
    requests: Vec<PointRequest>,
    allowed: Vec<AllowedEmail>,
    accounts: Vec<Account>,
    session: Option<Session>,
    sign_out_calls: usize,
    /// When set, the next `houses()` call fails with this message.
    fail_next_houses_fetch: Option<String>,
}

/// Test double for the hosted gateway.
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    change_tx: broadcast::Sender<ChangeEvent>,
    auth_tx: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// An empty gateway: no houses, no accounts, no session.
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (auth_tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            state: Mutex::new(MemoryState::default()),
            change_tx,
            auth_tx,
        }
    }

    /// A gateway seeded with the four competition houses at zero.
    pub fn with_default_houses() -> Self {
        let gateway = Self::new();
        for (id, name) in [
            ("pukeko", "Pūkeko"),
            ("keruru", "Kererū"),
            ("korimako", "Korimako"),
            ("kotuku", "Kōtuku"),
        ] {
            gateway.seed_house(id, name, 0);
        }
        gateway
    }

    // ---- fixtures ----

    pub fn seed_house(&self, id: &str, name: &str, points: i64) {
        self.lock().houses.push(House {
            id: id.to_string(),
            name: name.to_string(),
            points,
        });
    }

    /// Register a login fixture together with its profile row.
    pub fn seed_account(&self, profile: Profile, email: &str, password: &str) {
        let mut state = self.lock();
        state.accounts.push(Account {
            user_id: profile.id,
            email: email.to_string(),
            password: password.to_string(),
        });
        state.profiles.push(profile);
    }

    /// Register a login fixture with no matching profile row
    /// (an "authenticated but profileless" account).
    pub fn seed_profileless_account(&self, user_id: UserId, email: &str, password: &str) {
        self.lock().accounts.push(Account {
            user_id,
            email: email.to_string(),
            password: password.to_string(),
        });
    }

    /// Open a session for a seeded account, as if a persisted token
    /// had been restored.
    ///
    /// # Panics
    ///
    /// Panics if no account with that email was seeded; that is a
    /// fixture mistake, not a runtime condition.
    pub fn open_session(&self, email: &str) {
        let mut state = self.lock();
        let account = state
            .accounts
            .iter()
            .find(|a| a.email == email)
            .unwrap_or_else(|| panic!("no seeded account for {email}"));
        let session = Session {
            access_token: format!("memory-token-{}", Uuid::new_v4()),
            user: AuthUser {
                id: account.user_id,
                email: account.email.clone(),
            },
        };
        state.session = Some(session);
    }

    /// Make the next `houses()` fetch fail with the given message.
    pub fn fail_next_houses_fetch(&self, message: &str) {
        self.lock().fail_next_houses_fetch = Some(message.to_string());
    }

    /// How many times `sign_out` has been invoked.
    pub fn sign_out_calls(&self) -> usize {
        self.lock().sign_out_calls
    }

    /// Publish a raw event on the change feed, bypassing state. Lets
    /// tests exercise malformed or stale deliveries.
    pub fn push_change(&self, event: ChangeEvent) {
        let _ = self.change_tx.send(event);
    }

    // ---- internals ----

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_house(&self, house: &House) {
        let _ = self.change_tx.send(ChangeEvent {
            table: ChangeTable::Houses,
            kind: ChangeKind::Update,
            record: serde_json::json!({
                "id": house.id,
                "name": house.name,
                "points": house.points,
            }),
            old_record: serde_json::Value::Null,
        });
    }

    fn caller(state: &MemoryState) -> Result<AuthUser, GatewayError> {
        state
            .session
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or_else(|| GatewayError::Write("You must be logged in.".to_string()))
    }

    fn display_names(state: &MemoryState, request: &mut PointRequest) {
        request.teacher_name = state
            .profiles
            .iter()
            .find(|p| p.id == request.teacher_id)
            .map(|p| p.full_name.clone());
        request.house_name = state
            .houses
            .iter()
            .find(|h| h.id == request.house_id)
            .map(|h| h.name.clone());
        request.reviewed_by_name = request.reviewed_by.and_then(|reviewer| {
            state
                .profiles
                .iter()
                .find(|p| p.id == reviewer)
                .map(|p| p.full_name.clone())
        });
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn houses(&self) -> Result<Vec<House>, GatewayError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_houses_fetch.take() {
            return Err(GatewayError::Fetch(message));
        }
        Ok(state.houses.clone())
    }

    async fn set_house_points(&self, house_id: &str, points: i64) -> Result<(), GatewayError> {
        let updated = {
            let mut state = self.lock();
            let house = state
                .houses
                .iter_mut()
                .find(|h| h.id == house_id)
                .ok_or_else(|| GatewayError::Write(format!("No house with id {house_id}")))?;
            house.points = points;
            house.clone()
        };
        self.publish_house(&updated);
        Ok(())
    }

    async fn profiles(&self) -> Result<Vec<Profile>, GatewayError> {
        Ok(self.lock().profiles.clone())
    }

    async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, GatewayError> {
        Ok(self.lock().profiles.iter().find(|p| p.id == user_id).cloned())
    }

    async fn set_profile_role(&self, profile_id: UserId, role: Role) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or_else(|| GatewayError::Write(format!("No profile with id {profile_id}")))?;
        profile.role = role;
        Ok(())
    }

    async fn point_requests(&self) -> Result<Vec<PointRequest>, GatewayError> {
        let state = self.lock();
        let mut requests = state.requests.clone();
        for request in &mut requests {
            Self::display_names(&state, request);
        }
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    async fn insert_point_request(
        &self,
        teacher_id: UserId,
        input: &PointsInput,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if !state.houses.iter().any(|h| h.id == input.house_id) {
            return Err(GatewayError::Write(format!("No house with id {}", input.house_id)));
        }
        state.requests.push(PointRequest {
            id: Uuid::new_v4(),
            teacher_id,
            house_id: input.house_id.clone(),
            points: input.points,
            reason: input.reason.clone(),
            status: RequestStatus::Pending,
            submitted_at: chrono::Utc::now(),
            reviewed_by: None,
            teacher_name: None,
            house_name: None,
            reviewed_by_name: None,
        });
        Ok(())
    }

    async fn reject_request(
        &self,
        request_id: RequestId,
        reviewer_id: UserId,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| GatewayError::Write(format!("No request with id {request_id}")))?;
        request.status = request
            .status
            .transition_to(RequestStatus::Rejected)
            .map_err(|e| GatewayError::Write(e.to_string()))?;
        request.reviewed_by = Some(reviewer_id);
        Ok(())
    }

    async fn allowed_emails(&self) -> Result<Vec<AllowedEmail>, GatewayError> {
        let mut allowed = self.lock().allowed.clone();
        allowed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(allowed)
    }

    async fn upsert_allowed_email(
        &self,
        email: &str,
        role: Role,
        note: Option<&str>,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if let Some(existing) = state.allowed.iter_mut().find(|a| a.email == email) {
            existing.role = role;
            existing.note = note.map(str::to_string);
        } else {
            state.allowed.push(AllowedEmail {
                email: email.to_string(),
                role,
                note: note.map(str::to_string),
                created_at: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    async fn delete_allowed_email(&self, email: &str) -> Result<(), GatewayError> {
        self.lock().allowed.retain(|a| a.email != email);
        Ok(())
    }

    async fn add_manual_points(&self, input: &PointsInput) -> Result<(), GatewayError> {
        let updated = {
            let mut state = self.lock();
            let caller = Self::caller(&state)?;
            let house = state
                .houses
                .iter_mut()
                .find(|h| h.id == input.house_id)
                .ok_or_else(|| GatewayError::Write(format!("No house with id {}", input.house_id)))?;
            house.points += input.points;
            let updated = house.clone();

            // The audit trail: a pre-approved request recording the award.
            state.requests.push(PointRequest {
                id: Uuid::new_v4(),
                teacher_id: caller.id,
                house_id: input.house_id.clone(),
                points: input.points,
                reason: input.reason.clone(),
                status: RequestStatus::Approved,
                submitted_at: chrono::Utc::now(),
                reviewed_by: Some(caller.id),
                teacher_name: None,
                house_name: None,
                reviewed_by_name: None,
            });
            updated
        };
        self.publish_house(&updated);
        Ok(())
    }

    async fn approve_request(&self, request_id: RequestId) -> Result<(), GatewayError> {
        let updated = {
            let mut state = self.lock();
            let caller = Self::caller(&state)?;
            let request = state
                .requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| GatewayError::Write(format!("No request with id {request_id}")))?;
            request.status = request
                .status
                .transition_to(RequestStatus::Approved)
                .map_err(|e| GatewayError::Write(e.to_string()))?;
            request.reviewed_by = Some(caller.id);
            let house_id = request.house_id.clone();
            let points = request.points;

            let house = state
                .houses
                .iter_mut()
                .find(|h| h.id == house_id)
                .ok_or_else(|| GatewayError::Write(format!("No house with id {house_id}")))?;
            house.points += points;
            house.clone()
        };
        self.publish_house(&updated);
        Ok(())
    }

    async fn reset_project(&self) -> Result<(), GatewayError> {
        let zeroed = {
            let mut state = self.lock();
            let caller = Self::caller(&state)?;
            state.requests.clear();
            state.profiles.retain(|p| p.id == caller.id);
            for house in &mut state.houses {
                house.points = 0;
            }
            state.houses.clone()
        };
        for house in &zeroed {
            self.publish_house(house);
        }
        Ok(())
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Session, Profile), GatewayError> {
        let (session, profile) = {
            let mut state = self.lock();
            let account = state
                .accounts
                .iter()
                .find(|a| a.email == email && a.password == password)
                .ok_or_else(|| GatewayError::Auth("Invalid login credentials".to_string()))?;

            let user = AuthUser {
                id: account.user_id,
                email: account.email.clone(),
            };
            let profile = state
                .profiles
                .iter()
                .find(|p| p.id == user.id)
                .cloned()
                .ok_or_else(|| GatewayError::Auth("Could not find a user profile.".to_string()))?;

            let session = Session {
                access_token: format!("memory-token-{}", Uuid::new_v4()),
                user,
            };
            state.session = Some(session.clone());
            (session, profile)
        };
        let _ = self.auth_tx.send(AuthEvent::SignedIn(session.clone()));
        Ok((session, profile))
    }

    fn provider_sign_in_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, GatewayError> {
        match redirect_to {
            Some(redirect) => Ok(format!("memory://authorize?provider={provider}&redirect_to={redirect}")),
            None => Ok(format!("memory://authorize?provider={provider}")),
        }
    }

    async fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        let had_session = {
            let mut state = self.lock();
            state.sign_out_calls += 1;
            state.session.take().is_some()
        };
        if had_session {
            let _ = self.auth_tx.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_tx.subscribe()
    }

    async fn subscribe(
        &self,
        table: ChangeTable,
        filter: ChangeFilter,
    ) -> Result<Subscription, GatewayError> {
        Ok(Subscription::new(table, filter, self.change_tx.subscribe()))
    }
}
