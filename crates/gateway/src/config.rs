//! Gateway configuration loaded from environment variables.

/// Email domain accepted by default when none is configured.
pub const DEFAULT_EMAIL_DOMAIN: &str = "@aotea.school.nz";

/// Connection settings for the hosted gateway.
///
/// A missing or empty credential is a [`ConfigError`], not a panic:
/// a misconfigured deployment must degrade to a clearly broken state
/// with a persistent warning, never a crash.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base HTTP URL of the gateway, e.g. `https://xyz.gateway.example`.
    pub url: String,
    /// Publishable API key sent with every request.
    pub anon_key: String,
    /// Required email suffix for sessions (defense-in-depth; the
    /// authoritative check is the gateway's allow-list policy).
    pub email_domain: String,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Required | Default              |
    /// |--------------------------------|----------|----------------------|
    /// | `HOUSEBOARD_GATEWAY_URL`       | **yes**  | --                   |
    /// | `HOUSEBOARD_GATEWAY_ANON_KEY`  | **yes**  | --                   |
    /// | `HOUSEBOARD_EMAIL_DOMAIN`      | no       | `@aotea.school.nz`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var("HOUSEBOARD_GATEWAY_URL").ok(),
            std::env::var("HOUSEBOARD_GATEWAY_ANON_KEY").ok(),
            std::env::var("HOUSEBOARD_EMAIL_DOMAIN").ok(),
        )
    }

    fn from_vars(
        url: Option<String>,
        anon_key: Option<String>,
        email_domain: Option<String>,
    ) -> Result<Self, ConfigError> {
        let url = non_empty(url).ok_or(ConfigError::Missing("HOUSEBOARD_GATEWAY_URL"))?;
        let anon_key =
            non_empty(anon_key).ok_or(ConfigError::Missing("HOUSEBOARD_GATEWAY_ANON_KEY"))?;
        let email_domain =
            non_empty(email_domain).unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string());

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            email_domain,
        })
    }

    /// The WebSocket base URL derived from the HTTP base URL.
    pub fn ws_url(&self) -> String {
        if let Some(rest) = self.url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.url.clone()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A deployment configuration problem.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set (or empty).
    #[error("{0} is not set. Configure your .env or environment.")]
    Missing(&'static str),

    /// A variable is set but cannot be used as given.
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}
