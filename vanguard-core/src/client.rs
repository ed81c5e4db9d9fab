//! Governed HTTP client for the Bungie.net Platform API.
//!
//! Every outbound call follows the same path: acquire a rate-limiter
//! admission, pass the credential gate when the call needs auth, issue the
//! GET, classify the outcome. Classification here is authoritative — the
//! dispatcher converts error kinds into envelopes but never re-classifies.
//!
//! The endpoint methods at the bottom are pure URL/query construction over
//! [`ApiClient::call`]; response payloads are opaque `serde_json::Value`
//! pass-through, relayed to the caller verbatim.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Authenticator;
use crate::error::GatewayError;
use crate::limiter::RateLimiter;

/// Configuration for the governed API client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the Platform API (e.g. `https://www.bungie.net/Platform`).
    pub base_url: String,
    /// Bungie API key, sent as `X-API-Key` on every call.
    pub api_key: String,
    /// Request timeout (connection + response).
    pub timeout: Duration,
    /// Connection timeout (TCP + TLS handshake).
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Maximum response body size in bytes. Prevents unbounded allocation
    /// from oversized responses.
    pub max_response_size: usize,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.bungie.net/Platform".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 8,
            max_response_size: 10 * 1024 * 1024,
        }
    }
}

/// Query parameter list for one call.
pub type Query = Vec<(&'static str, String)>;

/// The governed API client.
///
/// Composes the shared [`RateLimiter`] and [`Authenticator`] with a pooled
/// HTTP client. `Clone`-free by design: exactly one instance exists per
/// gateway, shared via `Arc` so that every connection is paced by the same
/// window.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
    auth: Arc<Authenticator>,
    max_response_size: usize,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::InvalidParams`] when the base URL does not
    /// parse or the API key contains non-header characters, and
    /// [`GatewayError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        config: ApiClientConfig,
        limiter: Arc<RateLimiter>,
        auth: Arc<Authenticator>,
    ) -> Result<Self, GatewayError> {
        if let Err(e) = reqwest::Url::parse(&config.base_url) {
            return Err(GatewayError::InvalidParams {
                details: format!("invalid base URL '{}': {e}", config.base_url),
            });
        }

        let mut default_headers = HeaderMap::new();
        let api_key =
            HeaderValue::from_str(&config.api_key).map_err(|_| GatewayError::InvalidParams {
                details: "API key contains characters not valid in a header".to_string(),
            })?;
        default_headers.insert("X-API-Key", api_key);

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| GatewayError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter,
            auth,
            max_response_size: config.max_response_size,
        })
    }

    /// The shared rate limiter, for introspection.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The shared credential manager.
    pub fn auth(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    /// Perform one governed call and return the decoded response body.
    ///
    /// Steps, in order: rate-limiter admission (suspends until safe), the
    /// credential gate when `requires_auth`, the HTTP GET, and outcome
    /// classification:
    ///
    /// - body envelope with `ErrorCode != 1` → [`GatewayError::Provider`]
    /// - HTTP 401 → [`GatewayError::AuthRejected`]
    /// - HTTP 429 → [`GatewayError::RateLimited`]
    /// - HTTP 5xx → [`GatewayError::ProviderUnavailable`]
    /// - network failures → [`GatewayError::Transport`]
    ///
    /// The credential gate fails *before* any HTTP is attempted: absent
    /// credential → [`GatewayError::CredentialMissing`], expired →
    /// [`GatewayError::CredentialExpired`]. No automatic refresh.
    pub async fn call(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        requires_auth: bool,
    ) -> Result<Value, GatewayError> {
        self.limiter.acquire().await;

        let bearer = if requires_auth {
            let token = self
                .auth
                .access_token()
                .await
                .ok_or(GatewayError::CredentialMissing)?;
            if self.auth.is_expired().await {
                return Err(GatewayError::CredentialExpired);
            }
            Some(token)
        } else {
            None
        };

        let url = format!("{}{}", self.base_url, path);
        debug!(path, requires_auth, "issuing Platform request");

        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.classify_send_error(e, path))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(path, "Platform rejected credentials (HTTP 401)");
            return Err(GatewayError::AuthRejected);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!(path, ?retry_after_secs, "Platform rate limit hit (HTTP 429)");
            return Err(GatewayError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            warn!(path, status = status.as_u16(), "Platform server error");
            return Err(GatewayError::ProviderUnavailable {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::Transport {
                reason: format!("unexpected HTTP status {status} from {path}"),
            });
        }

        let body_bytes = self.read_body_limited(response, path).await?;
        let body: Value =
            serde_json::from_slice(&body_bytes).map_err(|e| GatewayError::Transport {
                reason: format!("failed to decode response body: {e}"),
            })?;

        // Platform envelope: ErrorCode 1 is success. Responses without the
        // envelope pass through untouched.
        if let Some(code) = body.get("ErrorCode").and_then(Value::as_i64) {
            if code != 1 {
                let status = body
                    .get("ErrorStatus")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string();
                let message = body
                    .get("Message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                warn!(path, code, error_status = %status, "Platform reported an application error");
                return Err(GatewayError::Provider {
                    code,
                    status,
                    message,
                });
            }
        }

        Ok(body)
    }

    /// Classify a send-level reqwest failure.
    fn classify_send_error(&self, error: reqwest::Error, path: &str) -> GatewayError {
        let reason = if error.is_timeout() {
            format!("request to {path} timed out")
        } else if error.is_connect() {
            format!("failed to connect to Platform: {error}")
        } else {
            error.to_string()
        };
        warn!(path, reason = %reason, "Platform request failed");
        GatewayError::Transport { reason }
    }

    /// Read the response body with a size cap.
    ///
    /// Checks `Content-Length` first for early rejection, then streams
    /// chunks with enforcement so chunked responses cannot grow unbounded.
    async fn read_body_limited(
        &self,
        response: reqwest::Response,
        path: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        let max_size = self.max_response_size;

        if let Some(content_length) = response.content_length() {
            if content_length as usize > max_size {
                return Err(GatewayError::Transport {
                    reason: format!(
                        "response too large: {content_length} bytes exceeds {max_size} byte limit"
                    ),
                });
            }
        }

        let mut buf = Vec::with_capacity(
            response
                .content_length()
                .map(|cl| cl as usize)
                .unwrap_or(8192)
                .min(max_size),
        );

        let mut response = response;
        while let Some(chunk) = response.chunk().await.map_err(|e| GatewayError::Transport {
            reason: format!("failed to read response body from {path}: {e}"),
        })? {
            if buf.len() + chunk.len() > max_size {
                return Err(GatewayError::Transport {
                    reason: format!(
                        "response too large: >={} bytes exceeds {max_size} byte limit",
                        buf.len() + chunk.len()
                    ),
                });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(buf)
    }
}

/// Comma-join a component/mode/group list the way the Platform expects.
fn csv(values: &[i64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// ============================================================================
// Endpoint surface — pure URL/query construction, no logic
// ============================================================================

impl ApiClient {
    /// Profile information for a player.
    pub async fn get_profile(
        &self,
        membership_type: i64,
        membership_id: &str,
        components: &[i64],
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/{membership_type}/Profile/{membership_id}/"),
            &[("components", csv(components))],
            false,
        )
        .await
    }

    /// Detailed information about one character.
    pub async fn get_character(
        &self,
        membership_type: i64,
        membership_id: &str,
        character_id: &str,
        components: &[i64],
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!(
                "/Destiny2/{membership_type}/Profile/{membership_id}/Character/{character_id}/"
            ),
            &[("components", csv(components))],
            false,
        )
        .await
    }

    /// Detailed information about one item instance.
    pub async fn get_item(
        &self,
        membership_type: i64,
        membership_id: &str,
        item_instance_id: &str,
        components: &[i64],
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/{membership_type}/Profile/{membership_id}/Item/{item_instance_id}/"),
            &[("components", csv(components))],
            false,
        )
        .await
    }

    /// Search for a player by display name.
    pub async fn search_player(
        &self,
        membership_type: i64,
        display_name: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/SearchDestinyPlayer/{membership_type}/{display_name}/"),
            &[],
            false,
        )
        .await
    }

    /// Search for a player by Bungie name and discriminator code.
    pub async fn search_player_by_bungie_name(
        &self,
        membership_type: i64,
        display_name: &str,
        display_name_code: i64,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/SearchDestinyPlayerByBungieName/{membership_type}/"),
            &[
                ("displayName", display_name.to_string()),
                ("displayNameCode", display_name_code.to_string()),
            ],
            false,
        )
        .await
    }

    /// Profiles linked across platforms.
    pub async fn get_linked_profiles(
        &self,
        membership_type: i64,
        membership_id: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/{membership_type}/Profile/{membership_id}/LinkedProfiles/"),
            &[],
            false,
        )
        .await
    }

    /// Activity history for a character, paginated.
    pub async fn get_activity_history(
        &self,
        membership_type: i64,
        membership_id: &str,
        character_id: &str,
        count: i64,
        mode: Option<i64>,
        page: Option<i64>,
    ) -> Result<Value, GatewayError> {
        let mut query: Query = vec![("count", count.to_string())];
        if let Some(mode) = mode {
            query.push(("mode", mode.to_string()));
        }
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        self.call(
            &format!(
                "/Destiny2/{membership_type}/Account/{membership_id}/Character/{character_id}/Stats/Activities/"
            ),
            &query,
            false,
        )
        .await
    }

    /// Historical stats for a character, optionally filtered.
    pub async fn get_historical_stats(
        &self,
        membership_type: i64,
        membership_id: &str,
        character_id: &str,
        period_type: Option<i64>,
        modes: Option<&[i64]>,
        groups: Option<&[i64]>,
    ) -> Result<Value, GatewayError> {
        let mut query: Query = Vec::new();
        if let Some(period_type) = period_type {
            query.push(("periodType", period_type.to_string()));
        }
        if let Some(modes) = modes.filter(|m| !m.is_empty()) {
            query.push(("modes", csv(modes)));
        }
        if let Some(groups) = groups.filter(|g| !g.is_empty()) {
            query.push(("groups", csv(groups)));
        }
        self.call(
            &format!(
                "/Destiny2/{membership_type}/Account/{membership_id}/Character/{character_id}/Stats/"
            ),
            &query,
            false,
        )
        .await
    }

    /// Aggregate activity stats for a character.
    pub async fn get_aggregate_activity_stats(
        &self,
        membership_type: i64,
        membership_id: &str,
        character_id: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!(
                "/Destiny2/{membership_type}/Account/{membership_id}/Character/{character_id}/Stats/AggregateActivityStats/"
            ),
            &[],
            false,
        )
        .await
    }

    /// Unique weapon usage history for a character.
    pub async fn get_unique_weapon_history(
        &self,
        membership_type: i64,
        membership_id: &str,
        character_id: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!(
                "/Destiny2/{membership_type}/Account/{membership_id}/Character/{character_id}/Stats/UniqueWeapons/"
            ),
            &[],
            false,
        )
        .await
    }

    /// Post-game carnage report for one activity instance.
    pub async fn get_post_game_carnage_report(
        &self,
        activity_id: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/Stats/PostGameCarnageReport/{activity_id}/"),
            &[],
            false,
        )
        .await
    }

    /// Leaderboards for a player.
    pub async fn get_leaderboards(
        &self,
        membership_type: i64,
        membership_id: &str,
        maxtop: Option<i64>,
        modes: Option<&str>,
        statid: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let mut query: Query = Vec::new();
        if let Some(maxtop) = maxtop {
            query.push(("maxtop", maxtop.to_string()));
        }
        if let Some(modes) = modes.filter(|m| !m.is_empty()) {
            query.push(("modes", modes.to_string()));
        }
        if let Some(statid) = statid.filter(|s| !s.is_empty()) {
            query.push(("statid", statid.to_string()));
        }
        self.call(
            &format!("/Destiny2/Stats/Leaderboards/{membership_type}/{membership_id}/"),
            &query,
            false,
        )
        .await
    }

    /// The manifest of game definitions and metadata.
    pub async fn get_manifest(&self) -> Result<Value, GatewayError> {
        self.call("/Destiny2/Manifest/", &[], false).await
    }

    /// Definition data for one entity by type and hash.
    pub async fn get_entity_definition(
        &self,
        entity_type: &str,
        hash_identifier: i64,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/Manifest/{entity_type}/{hash_identifier}/"),
            &[],
            false,
        )
        .await
    }

    /// Current public milestones.
    pub async fn get_public_milestones(&self) -> Result<Value, GatewayError> {
        self.call("/Destiny2/Milestones/", &[], false).await
    }

    /// Detailed content for one milestone.
    pub async fn get_public_milestone_content(
        &self,
        milestone_hash: i64,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/Milestones/{milestone_hash}/Content/"),
            &[],
            false,
        )
        .await
    }

    /// Public vendor information and inventories.
    pub async fn get_public_vendors(&self, components: &[i64]) -> Result<Value, GatewayError> {
        self.call(
            "/Destiny2/Vendors/",
            &[("components", csv(components))],
            false,
        )
        .await
    }

    /// Weekly reward state for a clan.
    pub async fn get_clan_weekly_reward_state(
        &self,
        group_id: &str,
    ) -> Result<Value, GatewayError> {
        self.call(
            &format!("/Destiny2/Clan/{group_id}/WeeklyRewardState/"),
            &[],
            false,
        )
        .await
    }

    /// Dictionary of available clan banner options.
    pub async fn get_clan_banner_source(&self) -> Result<Value, GatewayError> {
        self.call("/Destiny2/Clan/ClanBannerDictionary/", &[], false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, OAuthConfig};
    use crate::limiter::RateLimiterConfig;
    use tokio::time::Instant;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn envelope(response: Value) -> Value {
        serde_json::json!({
            "Response": response,
            "ErrorCode": 1,
            "ErrorStatus": "Success",
            "Message": "Ok"
        })
    }

    fn test_client(base_url: String) -> ApiClient {
        test_client_with_limit(base_url, 100)
    }

    fn test_client_with_limit(base_url: String, max_calls: usize) -> ApiClient {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
            max_calls,
            window: Duration::from_millis(10_000),
        }));
        let auth = Arc::new(Authenticator::new(OAuthConfig::default()).unwrap());
        ApiClient::new(
            ApiClientConfig {
                base_url,
                api_key: "test-api-key".to_string(),
                ..ApiClientConfig::default()
            },
            limiter,
            auth,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_body_passes_through_unmodified() {
        let server = MockServer::start().await;
        let body = envelope(serde_json::json!({"profile": {"data": {"characterIds": ["1"]}}}));
        Mock::given(method("GET"))
            .and(path("/Destiny2/Manifest/"))
            .and(header("X-API-Key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let result = client.get_manifest().await.unwrap();
        assert_eq!(result, body);
    }

    #[tokio::test]
    async fn test_provider_application_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ErrorCode": 7,
                "ErrorStatus": "ParameterParseFailure",
                "Message": "Unable to parse your parameters."
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client.get_manifest().await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Provider {
                code: 7,
                status: "ParameterParseFailure".to_string(),
                message: "Unable to parse your parameters.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_http_401_is_auth_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client.get_manifest().await.unwrap_err();
        assert_eq!(err, GatewayError::AuthRejected);
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limited_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client.get_manifest().await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::RateLimited {
                retry_after_secs: Some(17)
            }
        );
    }

    #[tokio::test]
    async fn test_http_5xx_is_provider_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client.get_manifest().await.unwrap_err();
        assert_eq!(err, GatewayError::ProviderUnavailable { status: 503 });
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport() {
        // Nothing is listening on this port.
        let client = test_client("http://127.0.0.1:1".to_string());
        let err = client.get_manifest().await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_auth_required_without_credential_skips_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let err = client
            .call("/Destiny2/Manifest/", &[], true)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::CredentialMissing);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_auth_required_with_expired_credential_skips_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        client
            .auth()
            .set_credential(Credential {
                access_token: "stale".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_at: Instant::now(),
                membership_id: None,
            })
            .await;

        let err = client
            .call("/Destiny2/Manifest/", &[], true)
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::CredentialExpired);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_auth_required_sends_bearer_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer live-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        client
            .auth()
            .set_credential(Credential {
                access_token: "live-token".to_string(),
                refresh_token: None,
                token_type: "Bearer".to_string(),
                expires_at: Instant::now() + Duration::from_secs(3600),
                membership_id: None,
            })
            .await;

        client
            .call("/Destiny2/Manifest/", &[], true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_profile_query_joins_components() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Destiny2/3/Profile/4611686018467260757/"))
            .and(query_param("components", "100,200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        client
            .get_profile(3, "4611686018467260757", &[100, 200])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_activity_history_omits_absent_optionals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/Destiny2/3/Account/m-1/Character/c-1/Stats/Activities/",
            ))
            .and(query_param("count", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        client
            .get_activity_history(3, "m-1", "c-1", 25, None, None)
            .await
            .unwrap();

        // The mock above matches; a mode/page param would fail the
        // query_param matcher only if asserted — check the request log.
        let requests = server.received_requests().await.unwrap();
        let query = requests[0].url.query().unwrap_or_default();
        assert!(!query.contains("mode"));
        assert!(!query.contains("page"));
    }

    #[tokio::test]
    async fn test_historical_stats_joins_filter_lists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Destiny2/2/Account/m-9/Character/c-9/Stats/"))
            .and(query_param("periodType", "2"))
            .and(query_param("modes", "5,10"))
            .and(query_param("groups", "1,2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        client
            .get_historical_stats(2, "m-9", "c-9", Some(2), Some(&[5, 10]), Some(&[1, 2]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_envelope_body_passes_through() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"anything": [1, 2, 3]});
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let result = client.get_manifest().await.unwrap();
        assert_eq!(result, body);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
            .mount(&server)
            .await;

        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
        let auth = Arc::new(Authenticator::new(OAuthConfig::default()).unwrap());
        let client = ApiClient::new(
            ApiClientConfig {
                base_url: server.uri(),
                api_key: "k".to_string(),
                max_response_size: 1024,
                ..ApiClientConfig::default()
            },
            limiter,
            auth,
        )
        .unwrap();

        let err = client.get_manifest().await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport { .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_calls_consume_limiter_slots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(Value::Null)))
            .mount(&server)
            .await;

        let client = test_client_with_limit(server.uri(), 5);
        assert_eq!(client.limiter().remaining().await, 5);
        client.get_manifest().await.unwrap();
        client.get_manifest().await.unwrap();
        assert_eq!(client.limiter().remaining().await, 3);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
        let auth = Arc::new(Authenticator::new(OAuthConfig::default()).unwrap());
        let result = ApiClient::new(
            ApiClientConfig {
                base_url: "not-a-url".to_string(),
                ..ApiClientConfig::default()
            },
            limiter,
            auth,
        );
        assert!(matches!(result, Err(GatewayError::InvalidParams { .. })));
    }

    #[test]
    fn test_csv_join() {
        assert_eq!(csv(&[100, 200, 300]), "100,200,300");
        assert_eq!(csv(&[400]), "400");
        assert_eq!(csv(&[]), "");
    }
}
