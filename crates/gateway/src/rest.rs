//! HTTP implementation of the [`Gateway`] contract.
//!
//! Rows are read and written through the gateway's REST surface
//! (`{base}/rest/v1/{table}` with equality filters), compound
//! operations go through named procedures (`{base}/rest/v1/rpc/{name}`),
//! and auth through `{base}/auth/v1/*`. Every request carries the
//! publishable API key; requests made with an open session also carry
//! its bearer token. Non-2xx responses surface the gateway's error
//! message verbatim.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};

use houseboard_core::allowed_email::AllowedEmail;
use houseboard_core::types::{RequestId, Timestamp, UserId};
use houseboard_core::validation::PointsInput;
use houseboard_core::{House, PointRequest, Profile, RequestStatus, Role};

use crate::auth::{AuthEvent, AuthUser, Session};
use crate::change::{ChangeFilter, ChangeTable, Subscription};
use crate::client::Gateway;
use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::realtime::RealtimeFeed;

/// Broadcast channel capacity for auth-state events.
const AUTH_EVENT_CAPACITY: usize = 16;

/// Production gateway client over HTTP and WebSocket.
pub struct RestGateway {
    http: reqwest::Client,
    config: GatewayConfig,
    session: RwLock<Option<Session>>,
    auth_tx: broadcast::Sender<AuthEvent>,
    realtime: RealtimeFeed,
}

impl RestGateway {
    /// Create a client for the configured gateway. No connection is
    /// made until the first request or subscription.
    pub fn new(config: GatewayConfig) -> Self {
        let (auth_tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        let ws_url = format!(
            "{}/realtime/v1/changes?apikey={}",
            config.ws_url(),
            config.anon_key,
        );
        Self {
            http: reqwest::Client::new(),
            config,
            session: RwLock::new(None),
            auth_tx,
            realtime: RealtimeFeed::new(ws_url),
        }
    }

    /// Stop the realtime connection task. Idempotent; also on drop.
    pub fn shutdown(&self) {
        self.realtime.shutdown();
    }

    /// Restore a session persisted by the embedding application
    /// (e.g. a saved token from a previous run). Announced on the
    /// auth events channel like any other sign-in.
    pub async fn restore_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        let _ = self.auth_tx.send(AuthEvent::SignedIn(session));
    }

    fn rows_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.url)
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{name}", self.config.url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.url)
    }

    /// Attach the API key and, when a session is open, its bearer
    /// token.
    async fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("apikey", &self.config.anon_key);
        match self.session.read().await.as_ref() {
            Some(session) => builder.bearer_auth(&session.access_token),
            None => builder,
        }
    }

    /// GET rows from a table, decoding the JSON array response.
    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<Vec<T>, GatewayError> {
        let request = self.authed(self.http.get(self.rows_url(table))).await;
        let response = request
            .query(query)
            .send()
            .await
            .map_err(|e| GatewayError::Fetch(format!("{context}: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Fetch(format!(
                "{context}: {}",
                read_error(response).await
            )));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| GatewayError::Fetch(format!("{context}: {e}")))
    }

    /// Issue a write request and map any failure to [`GatewayError::Write`].
    async fn write(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .authed(request)
            .await
            .send()
            .await
            .map_err(|e| GatewayError::Write(format!("{context}: {e}")))?;

        if !response.status().is_success() {
            return Err(GatewayError::Write(format!(
                "{context}: {}",
                read_error(response).await
            )));
        }
        Ok(())
    }

    /// Invoke a named server-side procedure.
    async fn rpc(&self, name: &str, params: serde_json::Value) -> Result<(), GatewayError> {
        let request = self.http.post(self.rpc_url(name)).json(&params);
        self.write(request, name).await
    }
}

impl Drop for RestGateway {
    fn drop(&mut self) {
        self.realtime.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Wire rows
// ---------------------------------------------------------------------------

/// Embedded join carrying a profile's display name.
#[derive(Debug, Deserialize)]
struct FullNameJoin {
    full_name: String,
}

/// Embedded join carrying a house's display name.
#[derive(Debug, Deserialize)]
struct HouseNameJoin {
    name: String,
}

/// A `point_requests` row with its display joins.
#[derive(Debug, Deserialize)]
struct PointRequestRow {
    id: RequestId,
    teacher_id: UserId,
    house_id: String,
    points: i64,
    reason: String,
    status: RequestStatus,
    submitted_at: Timestamp,
    reviewed_by: Option<UserId>,
    #[serde(default)]
    teacher: Option<FullNameJoin>,
    #[serde(default)]
    house: Option<HouseNameJoin>,
    #[serde(default)]
    reviewer: Option<FullNameJoin>,
}

impl From<PointRequestRow> for PointRequest {
    fn from(row: PointRequestRow) -> Self {
        PointRequest {
            id: row.id,
            teacher_id: row.teacher_id,
            house_id: row.house_id,
            points: row.points,
            reason: row.reason,
            status: row.status,
            submitted_at: row.submitted_at,
            reviewed_by: row.reviewed_by,
            teacher_name: row.teacher.map(|j| j.full_name),
            house_name: row.house.map(|j| j.name),
            reviewed_by_name: row.reviewer.map(|j| j.full_name),
        }
    }
}

/// Response from the password-grant token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

// ---------------------------------------------------------------------------
// Gateway impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Gateway for RestGateway {
    async fn houses(&self) -> Result<Vec<House>, GatewayError> {
        self.get_rows(
            "houses",
            &[("select", "id,name,points".to_string())],
            "Failed to fetch houses",
        )
        .await
    }

    async fn set_house_points(&self, house_id: &str, points: i64) -> Result<(), GatewayError> {
        let request = self
            .http
            .patch(self.rows_url("houses"))
            .query(&[("id", format!("eq.{house_id}"))])
            .json(&serde_json::json!({ "points": points }));
        self.write(request, "Failed to update house points").await
    }

    async fn profiles(&self) -> Result<Vec<Profile>, GatewayError> {
        self.get_rows(
            "profiles",
            &[("select", "*".to_string())],
            "Failed to fetch profiles",
        )
        .await
    }

    async fn profile(&self, user_id: UserId) -> Result<Option<Profile>, GatewayError> {
        let rows: Vec<Profile> = self
            .get_rows(
                "profiles",
                &[
                    ("select", "*".to_string()),
                    ("id", format!("eq.{user_id}")),
                ],
                "Failed to fetch profile",
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn set_profile_role(&self, profile_id: UserId, role: Role) -> Result<(), GatewayError> {
        let request = self
            .http
            .patch(self.rows_url("profiles"))
            .query(&[("id", format!("eq.{profile_id}"))])
            .json(&serde_json::json!({ "role": role }));
        self.write(request, "Failed to update user role").await
    }

    async fn point_requests(&self) -> Result<Vec<PointRequest>, GatewayError> {
        let select = "*,teacher:profiles!teacher_id(full_name),\
                      house:houses!house_id(name),\
                      reviewer:profiles!reviewed_by(full_name)";
        let rows: Vec<PointRequestRow> = self
            .get_rows(
                "point_requests",
                &[
                    ("select", select.to_string()),
                    ("order", "submitted_at.desc".to_string()),
                ],
                "Failed to fetch point requests",
            )
            .await?;
        Ok(rows.into_iter().map(PointRequest::from).collect())
    }

    async fn insert_point_request(
        &self,
        teacher_id: UserId,
        input: &PointsInput,
    ) -> Result<(), GatewayError> {
        let request = self
            .http
            .post(self.rows_url("point_requests"))
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({
                "teacher_id": teacher_id,
                "house_id": input.house_id,
                "points": input.points,
                "reason": input.reason,
                "status": RequestStatus::Pending,
            }));
        self.write(request, "Failed to submit point request").await
    }

    async fn reject_request(
        &self,
        request_id: RequestId,
        reviewer_id: UserId,
    ) -> Result<(), GatewayError> {
        let request = self
            .http
            .patch(self.rows_url("point_requests"))
            .query(&[("id", format!("eq.{request_id}"))])
            .json(&serde_json::json!({
                "status": RequestStatus::Rejected,
                "reviewed_by": reviewer_id,
            }));
        self.write(request, "Failed to reject request").await
    }

    async fn allowed_emails(&self) -> Result<Vec<AllowedEmail>, GatewayError> {
        self.get_rows(
            "allowed_emails",
            &[
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ],
            "Failed to fetch allowed emails",
        )
        .await
    }

    async fn upsert_allowed_email(
        &self,
        email: &str,
        role: Role,
        note: Option<&str>,
    ) -> Result<(), GatewayError> {
        let request = self
            .http
            .post(self.rows_url("allowed_emails"))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&serde_json::json!({
                "email": email,
                "role": role,
                "note": note,
            }));
        self.write(request, "Failed to save allowed email").await
    }

    async fn delete_allowed_email(&self, email: &str) -> Result<(), GatewayError> {
        let request = self
            .http
            .delete(self.rows_url("allowed_emails"))
            .query(&[("email", format!("eq.{email}"))]);
        self.write(request, "Failed to delete allowed email").await
    }

    async fn add_manual_points(&self, input: &PointsInput) -> Result<(), GatewayError> {
        self.rpc(
            "add_manual_points",
            serde_json::json!({
                "p_house_id": input.house_id,
                "p_points": input.points,
                "p_reason": input.reason,
            }),
        )
        .await
    }

    async fn approve_request(&self, request_id: RequestId) -> Result<(), GatewayError> {
        self.rpc(
            "approve_request",
            serde_json::json!({ "request_id": request_id }),
        )
        .await
    }

    async fn reset_project(&self) -> Result<(), GatewayError> {
        self.rpc("reset_project", serde_json::json!({})).await
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Session, Profile), GatewayError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| GatewayError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(read_error(response).await));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Auth(e.to_string()))?;

        let session = Session {
            access_token: token.access_token,
            user: token.user,
        };

        // The profile fetch must carry the new bearer token, so the
        // session is stored before resolving the profile.
        *self.session.write().await = Some(session.clone());

        match self.profile(session.user.id).await {
            Ok(Some(profile)) => {
                let _ = self.auth_tx.send(AuthEvent::SignedIn(session.clone()));
                Ok((session, profile))
            }
            Ok(None) => {
                // Authenticated but profileless is invalid.
                *self.session.write().await = None;
                Err(GatewayError::Auth("Could not find a user profile.".to_string()))
            }
            Err(e) => {
                *self.session.write().await = None;
                Err(GatewayError::Auth(e.to_string()))
            }
        }
    }

    fn provider_sign_in_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut url = reqwest::Url::parse(&self.auth_url("authorize")).map_err(|e| {
            GatewayError::Config(ConfigError::Invalid {
                var: "HOUSEBOARD_GATEWAY_URL",
                reason: e.to_string(),
            })
        })?;
        url.query_pairs_mut().append_pair("provider", provider);
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        Ok(url.into())
    }

    async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        let Some(previous) = self.session.write().await.take() else {
            return Ok(());
        };
        let _ = self.auth_tx.send(AuthEvent::SignedOut);

        // The local session is already cleared; a failed remote call
        // is reported but cannot resurrect it.
        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&previous.access_token)
            .send()
            .await
            .map_err(|e| GatewayError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Auth(read_error(response).await));
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
        Ok(self.realtime.subscribe(table, filter).await)
    }
}

// ---------------------------------------------------------------------------
// Error bodies
// ---------------------------------------------------------------------------

/// Read a non-2xx response into the gateway's error message.
async fn read_error(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    parse_error_body(status, &body)
}

/// Extract the human-readable message from an error body.
///
/// The gateway's surfaces use different field names (`message` on the
/// rows/rpc endpoints, `error_description` / `msg` on auth), so each
/// is tried in turn before falling back to the raw body.
fn parse_error_body(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error_description", "msg", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            url: "https://gateway.test".to_string(),
            anon_key: "anon-key".to_string(),
            email_domain: "@aotea.school.nz".to_string(),
        }
    }

    #[test]
    fn urls_are_built_from_the_base() {
        let gateway = RestGateway::new(test_config());
        assert_eq!(gateway.rows_url("houses"), "https://gateway.test/rest/v1/houses");
        assert_eq!(
            gateway.rpc_url("approve_request"),
            "https://gateway.test/rest/v1/rpc/approve_request",
        );
        assert_eq!(gateway.auth_url("token"), "https://gateway.test/auth/v1/token");
    }

    #[test]
    fn provider_url_carries_provider_and_redirect() {
        let gateway = RestGateway::new(test_config());
        let url = gateway
            .provider_sign_in_url("google", Some("https://app.test/after"))
            .unwrap();
        assert!(url.starts_with("https://gateway.test/auth/v1/authorize?"));
        assert!(url.contains("provider=google"));
        assert!(url.contains("redirect_to=https%3A%2F%2Fapp.test%2Fafter"));
    }

    #[test]
    fn error_body_message_field_is_used_verbatim() {
        let message = parse_error_body(400, r#"{"message": "Invalid login credentials"}"#);
        assert_eq!(message, "Invalid login credentials");
    }

    #[test]
    fn auth_style_error_fields_are_recognized() {
        assert_eq!(
            parse_error_body(400, r#"{"error_description": "Email not confirmed"}"#),
            "Email not confirmed",
        );
        assert_eq!(parse_error_body(401, r#"{"msg": "JWT expired"}"#), "JWT expired");
    }

    #[test]
    fn unparseable_body_falls_back_to_status_and_raw_text() {
        assert_eq!(parse_error_body(502, ""), "HTTP 502");
        assert_eq!(parse_error_body(500, "boom"), "HTTP 500: boom");
    }
}
