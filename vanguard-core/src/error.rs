//! Error handling for the Vanguard gateway.
//!
//! One enum covers every failure a tool invocation can hit, from argument
//! validation through the governed HTTP call. The taxonomy is deliberately
//! fine-grained: a calling agent needs to tell "your token expired" apart
//! from "the server is down" apart from "you asked for something that does
//! not exist", because each implies a different recovery action.
//!
//! Classification happens exactly once. The [`crate::client::ApiClient`]
//! decides the kind for HTTP-layer outcomes and nothing downstream
//! re-classifies; the dispatcher only converts the kind into a response
//! envelope.

use thiserror::Error;

/// All error kinds produced by the gateway.
///
/// Each variant maps to a JSON-RPC error code via [`GatewayError::to_jsonrpc_code`]
/// and a stable machine-readable name via [`GatewayError::error_type_name`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// The requested JSON-RPC method does not exist.
    #[error("Method '{method}' not found")]
    MethodNotFound {
        /// The method name that was not found
        method: String,
    },

    /// The invoked tool name is not in the catalog.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The tool name that was not found
        name: String,
    },

    /// A `tools/call` request arrived without an `arguments` object.
    #[error("Missing arguments for tool call")]
    MissingArguments,

    /// Tool arguments are present but fail validation.
    #[error("Invalid parameters: {details}")]
    InvalidParams {
        /// Description of the validation failure
        details: String,
    },

    /// The authorization-code exchange against the token endpoint failed.
    /// No credential is installed; the manager stays unauthenticated.
    #[error("OAuth token exchange failed: {reason}")]
    TokenExchange {
        /// Underlying transport or provider failure
        reason: String,
    },

    /// A refresh attempt failed. The prior credential is retained unchanged.
    #[error("Token refresh failed: {reason}")]
    TokenRefresh {
        /// Underlying transport or provider failure
        reason: String,
    },

    /// `refresh()` was called with no stored refresh token. Checked before
    /// any network call is attempted.
    #[error("No refresh token available")]
    RefreshUnavailable,

    /// An authenticated call was requested but no credential is stored.
    #[error("No valid access token available. Please authenticate first.")]
    CredentialMissing,

    /// An authenticated call was requested but the stored credential has
    /// expired. Refresh is caller-driven; retry after an explicit refresh.
    #[error("Access token has expired. Please refresh and retry.")]
    CredentialExpired,

    /// The provider accepted the HTTP call but reported a logical failure
    /// in the response envelope.
    #[error("Bungie API error {status}: {message}")]
    Provider {
        /// The provider's numeric error code
        code: i64,
        /// The provider's error status identifier
        status: String,
        /// The provider's human-readable message
        message: String,
    },

    /// The provider rejected the call with HTTP 401.
    #[error("Authentication failed. Token may be expired or invalid.")]
    AuthRejected,

    /// The provider returned HTTP 429. Distinct from local admission
    /// control, which waits instead of failing.
    #[error("Rate limit exceeded. Retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, when the provider says
        retry_after_secs: Option<u64>,
    },

    /// The provider returned HTTP 5xx.
    #[error("Bungie API server error (HTTP {status}). Please try again later.")]
    ProviderUnavailable {
        /// The HTTP status code
        status: u16,
    },

    /// A network or connection-level failure below the HTTP status line.
    #[error("Transport failure: {reason}")]
    Transport {
        /// Description of the failure
        reason: String,
    },
}

impl GatewayError {
    /// Maps the error to a JSON-RPC 2.0 error code.
    ///
    /// Standard codes (-32601/-32602) cover protocol-level failures;
    /// gateway-specific kinds use the -32000 range.
    pub fn to_jsonrpc_code(&self) -> i32 {
        match self {
            Self::MethodNotFound { .. } => -32601,
            Self::UnknownTool { .. } => -32601,
            Self::MissingArguments => -32602,
            Self::InvalidParams { .. } => -32602,

            Self::TokenExchange { .. } => -32000,
            Self::TokenRefresh { .. } => -32001,
            Self::RefreshUnavailable => -32002,
            Self::CredentialMissing => -32003,
            Self::CredentialExpired => -32004,
            Self::Provider { .. } => -32005,
            Self::AuthRejected => -32006,
            Self::RateLimited { .. } => -32007,
            Self::ProviderUnavailable { .. } => -32008,
            Self::Transport { .. } => -32009,
        }
    }

    /// Returns the stable error type name used in logs.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "method_not_found",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::MissingArguments => "missing_arguments",
            Self::InvalidParams { .. } => "invalid_params",
            Self::TokenExchange { .. } => "token_exchange_failed",
            Self::TokenRefresh { .. } => "token_refresh_failed",
            Self::RefreshUnavailable => "refresh_unavailable",
            Self::CredentialMissing => "credential_missing",
            Self::CredentialExpired => "credential_expired",
            Self::Provider { .. } => "provider_error",
            Self::AuthRejected => "auth_rejected",
            Self::RateLimited { .. } => "rate_limited",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::Transport { .. } => "transport_failure",
        }
    }

    /// Returns the retry-after hint for retriable errors.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }

    /// True for failures worth retrying without any caller-side change
    /// (transient provider or network conditions).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ProviderUnavailable { .. } | Self::Transport { .. }
        )
    }
}
