//! OAuth2 credential lifecycle against the Bungie token endpoint.
//!
//! The [`Authenticator`] holds at most one live [`Credential`], replaced
//! wholesale by a successful exchange or refresh and never partially
//! mutated. Three states fall out of that: unauthenticated (no
//! credential), authenticated-valid, and authenticated-expired.
//!
//! Expiry is never acted on automatically. [`Authenticator::is_expired`]
//! answers the question; the governed call path fails an authenticated
//! call on an expired credential and leaves the refresh decision to the
//! operator. Tokens live only in process memory — a restart forgets them.

use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::GatewayError;

/// Placeholder anti-forgery state used when the caller supplies none.
/// Not forgery-safe; callers needing CSRF protection must pass their own.
const DEFAULT_AUTH_STATE: &str = "vanguard-state";

/// OAuth endpoint and application configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Bungie API key, sent as `X-API-Key` on token-endpoint calls.
    pub api_key: String,
    /// User-facing authorization page.
    pub authorize_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_key: String::new(),
            authorize_url: "https://www.bungie.net/en/OAuth/Authorize".to_string(),
            token_url: "https://www.bungie.net/Platform/App/OAuth/token/".to_string(),
        }
    }
}

/// Wire shape of the token endpoint's JSON response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    membership_id: Option<String>,
}

/// A live OAuth2 token bundle.
///
/// `expires_at` is an absolute instant derived from the issuance time plus
/// the endpoint's `expires_in` duration. Expiry is boundary-inclusive:
/// a credential is expired at exactly `expires_at`.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Bearer token for authenticated Platform calls.
    pub access_token: String,
    /// Refresh token, when the grant issued one.
    pub refresh_token: Option<String>,
    /// Token type as reported by the endpoint (`Bearer`).
    pub token_type: String,
    /// Instant at which the access token stops being valid.
    pub expires_at: Instant,
    /// Membership id of the authorizing user, when reported.
    pub membership_id: Option<String>,
}

impl Credential {
    fn from_response(resp: TokenResponse, issued_at: Instant) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            token_type: resp.token_type,
            expires_at: issued_at + Duration::from_secs(resp.expires_in),
            membership_id: resp.membership_id,
        }
    }

    /// True when `now` is at or past the expiry instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Owns the credential state and its exchange/refresh protocol.
pub struct Authenticator {
    config: OAuthConfig,
    http: reqwest::Client,
    credential: Mutex<Option<Credential>>,
}

impl Authenticator {
    /// Create an authenticator in the unauthenticated state.
    pub fn new(config: OAuthConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GatewayError::Transport {
                reason: format!("failed to build OAuth HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            http,
            credential: Mutex::new(None),
        })
    }

    /// Build the user-facing authorization URL.
    ///
    /// Pure function; no state change. The `state` value defaults to a
    /// fixed placeholder when not supplied.
    pub fn authorize_url(&self, state: Option<&str>) -> Result<String, GatewayError> {
        let url = reqwest::Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("state", state.unwrap_or(DEFAULT_AUTH_STATE)),
            ],
        )
        .map_err(|e| GatewayError::InvalidParams {
            details: format!("invalid authorize URL '{}': {e}", self.config.authorize_url),
        })?;
        Ok(url.into())
    }

    /// Exchange an authorization code for a credential.
    ///
    /// On any transport or non-2xx failure the stored state is untouched
    /// (still unauthenticated if this was the first exchange) and the call
    /// fails with [`GatewayError::TokenExchange`].
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, GatewayError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let credential = self
            .request_token(&form)
            .await
            .map_err(|reason| GatewayError::TokenExchange { reason })?;

        info!(
            expires_in_secs = credential
                .expires_at
                .saturating_duration_since(Instant::now())
                .as_secs(),
            has_refresh_token = credential.refresh_token.is_some(),
            "OAuth code exchange succeeded"
        );

        *self.credential.lock().await = Some(credential.clone());
        Ok(credential)
    }

    /// Refresh the stored credential.
    ///
    /// Requires a stored credential with a non-empty refresh token — checked
    /// before any network call; otherwise fails immediately with
    /// [`GatewayError::RefreshUnavailable`]. On a failed refresh the prior
    /// credential is retained unchanged.
    pub async fn refresh(&self) -> Result<Credential, GatewayError> {
        let refresh_token = {
            let credential = self.credential.lock().await;
            match credential
                .as_ref()
                .and_then(|c| c.refresh_token.as_deref())
                .filter(|t| !t.is_empty())
            {
                Some(token) => token.to_string(),
                None => return Err(GatewayError::RefreshUnavailable),
            }
        };

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let credential = self.request_token(&form).await.map_err(|reason| {
            warn!(reason = %reason, "token refresh failed, prior credential retained");
            GatewayError::TokenRefresh { reason }
        })?;

        debug!("token refresh succeeded, credential replaced");
        *self.credential.lock().await = Some(credential.clone());
        Ok(credential)
    }

    /// POST a form to the token endpoint and decode the token response.
    async fn request_token(&self, form: &[(&str, &str)]) -> Result<Credential, String> {
        let issued_at = Instant::now();

        let response = self
            .http
            .post(&self.config.token_url)
            .header("X-API-Key", &self.config.api_key)
            .form(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("token endpoint returned HTTP {status}: {body}"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to decode token response: {e}"))?;

        Ok(Credential::from_response(token, issued_at))
    }

    /// The current access token, if any credential is stored.
    ///
    /// Does not check expiry; pair with [`Authenticator::is_expired`].
    pub async fn access_token(&self) -> Option<String> {
        self.credential
            .lock()
            .await
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// True when no credential is stored, or the stored one has expired
    /// (boundary inclusive — equality counts as expired).
    pub async fn is_expired(&self) -> bool {
        match self.credential.lock().await.as_ref() {
            Some(credential) => credential.is_expired_at(Instant::now()),
            None => true,
        }
    }

    /// Install an externally obtained credential, replacing any stored one.
    pub async fn set_credential(&self, credential: Credential) {
        *self.credential.lock().await = Some(credential);
    }

    /// A clone of the stored credential, if any.
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(token_url: String) -> OAuthConfig {
        OAuthConfig {
            client_id: "12345".to_string(),
            client_secret: "s3cret".to_string(),
            api_key: "test-api-key".to_string(),
            token_url,
            ..OAuthConfig::default()
        }
    }

    fn token_body(expires_in: u64, refresh: Option<&str>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "expires_in": expires_in,
            "membership_id": "4611686018467260757"
        });
        if let Some(r) = refresh {
            body["refresh_token"] = serde_json::json!(r);
        }
        body
    }

    #[test]
    fn test_authorize_url_contains_client_and_state() {
        let auth = Authenticator::new(test_config("http://unused/token".to_string())).unwrap();
        let url = auth.authorize_url(Some("csrf-123")).unwrap();
        assert!(url.starts_with("https://www.bungie.net/en/OAuth/Authorize?"));
        assert!(url.contains("client_id=12345"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=csrf-123"));
    }

    #[test]
    fn test_authorize_url_default_state() {
        let auth = Authenticator::new(test_config("http://unused/token".to_string())).unwrap();
        let url = auth.authorize_url(None).unwrap();
        assert!(url.contains("state=vanguard-state"));
    }

    #[tokio::test]
    async fn test_exchange_code_installs_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("X-API-Key", "test-api-key"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3600, Some("ref-1"))))
            .expect(1)
            .mount(&server)
            .await;

        let auth = Authenticator::new(test_config(format!("{}/token", server.uri()))).unwrap();
        assert!(auth.is_expired().await);
        assert_eq!(auth.access_token().await, None);

        let credential = auth.exchange_code("the-code").await.unwrap();
        assert_eq!(credential.access_token, "access-1");
        assert_eq!(credential.token_type, "Bearer");
        assert_eq!(credential.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(
            credential.membership_id.as_deref(),
            Some("4611686018467260757")
        );

        assert_eq!(auth.access_token().await.as_deref(), Some("access-1"));
        assert!(!auth.is_expired().await);
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let auth = Authenticator::new(test_config(format!("{}/token", server.uri()))).unwrap();
        let err = auth.exchange_code("bad-code").await.unwrap_err();
        assert!(matches!(err, GatewayError::TokenExchange { .. }));
        assert!(err.to_string().contains("400"));

        // Still unauthenticated.
        assert_eq!(auth.access_token().await, None);
        assert!(auth.is_expired().await);
    }

    #[tokio::test]
    async fn test_refresh_without_credential_makes_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3600, None)))
            .expect(0)
            .mount(&server)
            .await;

        let auth = Authenticator::new(test_config(format!("{}/token", server.uri()))).unwrap();
        let err = auth.refresh().await.unwrap_err();
        assert_eq!(err, GatewayError::RefreshUnavailable);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_makes_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3600, None)))
            .expect(0)
            .mount(&server)
            .await;

        let auth = Authenticator::new(test_config(format!("{}/token", server.uri()))).unwrap();
        auth.set_credential(Credential {
            access_token: "access-1".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: Instant::now() + Duration::from_secs(60),
            membership_id: None,
        })
        .await;

        let err = auth.refresh().await.unwrap_err();
        assert_eq!(err, GatewayError::RefreshUnavailable);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_refresh_replaces_credential() {
        let server = MockServer::start().await;
        let mut new_token = token_body(7200, Some("ref-2"));
        new_token["access_token"] = serde_json::json!("access-2");
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=ref-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(new_token))
            .expect(1)
            .mount(&server)
            .await;

        let auth = Authenticator::new(test_config(format!("{}/token", server.uri()))).unwrap();
        auth.set_credential(Credential {
            access_token: "access-1".to_string(),
            refresh_token: Some("ref-1".to_string()),
            token_type: "Bearer".to_string(),
            // Refresh is valid regardless of expiry state.
            expires_at: Instant::now(),
            membership_id: None,
        })
        .await;

        let credential = auth.refresh().await.unwrap();
        assert_eq!(credential.access_token, "access-2");
        assert_eq!(credential.refresh_token.as_deref(), Some("ref-2"));
        assert_eq!(auth.access_token().await.as_deref(), Some("access-2"));
        assert!(!auth.is_expired().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_retains_prior_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let auth = Authenticator::new(test_config(format!("{}/token", server.uri()))).unwrap();
        auth.set_credential(Credential {
            access_token: "access-1".to_string(),
            refresh_token: Some("ref-1".to_string()),
            token_type: "Bearer".to_string(),
            expires_at: Instant::now() + Duration::from_secs(60),
            membership_id: None,
        })
        .await;

        let err = auth.refresh().await.unwrap_err();
        assert!(matches!(err, GatewayError::TokenRefresh { .. }));
        assert_eq!(auth.access_token().await.as_deref(), Some("access-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary_is_inclusive() {
        let credential = Credential {
            access_token: "access-1".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: Instant::now() + Duration::from_secs(10),
            membership_id: None,
        };

        assert!(!credential.is_expired_at(Instant::now()));

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert!(!credential.is_expired_at(Instant::now()));

        // Exactly at expires_at: expired.
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(credential.is_expired_at(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(credential.is_expired_at(Instant::now()));
    }

    #[tokio::test]
    async fn test_is_expired_true_before_any_credential() {
        let auth = Authenticator::new(test_config("http://unused/token".to_string())).unwrap();
        assert!(auth.is_expired().await);
    }
}
