//! Gateway configuration from process environment.
//!
//! The only hard requirement is the API key — every Platform call carries
//! it. OAuth client settings are optional at startup: tools that never
//! touch authenticated endpoints work without them, and an exchange
//! attempted without them fails at the token endpoint, not here.

use tracing::warn;

use crate::auth::OAuthConfig;
use crate::client::ApiClientConfig;
use crate::error::GatewayError;
use crate::limiter::RateLimiterConfig;

/// Default port for the socket transport.
pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// OAuth application + endpoint settings.
    pub oauth: OAuthConfig,
    /// HTTP client settings for the Platform API.
    pub api: ApiClientConfig,
    /// Sliding-window rate limit settings.
    pub rate: RateLimiterConfig,
    /// Listen port for the socket transport.
    pub listen_port: u16,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VANGUARD_API_KEY` (required): Bungie API key
    /// - `VANGUARD_CLIENT_ID` (default: empty): OAuth client id
    /// - `VANGUARD_CLIENT_SECRET` (default: empty): OAuth client secret
    /// - `VANGUARD_BASE_URL` (default: `https://www.bungie.net/Platform`)
    /// - `VANGUARD_LISTEN_PORT` (default: 3000)
    /// - `VANGUARD_RATE_LIMIT_MAX` / `VANGUARD_RATE_LIMIT_WINDOW_MS`
    ///   (see [`RateLimiterConfig::from_env`])
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidParams`] if `VANGUARD_API_KEY` is
    /// unset or empty, or if `VANGUARD_LISTEN_PORT` is set but not a valid
    /// port number.
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = std::env::var("VANGUARD_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GatewayError::InvalidParams {
                details: "VANGUARD_API_KEY environment variable is required".to_string(),
            })?;

        let client_id = std::env::var("VANGUARD_CLIENT_ID").unwrap_or_default();
        let client_secret = std::env::var("VANGUARD_CLIENT_SECRET").unwrap_or_default();
        if client_id.is_empty() {
            warn!("VANGUARD_CLIENT_ID not set; OAuth code exchange will be rejected upstream");
        }

        let base_url = match std::env::var("VANGUARD_BASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => ApiClientConfig::default().base_url,
        };

        let listen_port: u16 = match std::env::var("VANGUARD_LISTEN_PORT") {
            Ok(val) => val.parse().map_err(|_| GatewayError::InvalidParams {
                details: format!("VANGUARD_LISTEN_PORT must be a valid port, got: '{val}'"),
            })?,
            Err(_) => DEFAULT_LISTEN_PORT,
        };

        Ok(Self {
            oauth: OAuthConfig {
                client_id,
                client_secret,
                api_key: api_key.clone(),
                ..OAuthConfig::default()
            },
            api: ApiClientConfig {
                base_url,
                api_key,
                ..ApiClientConfig::default()
            },
            rate: RateLimiterConfig::from_env(),
            listen_port,
        })
    }
}
