//! Vanguard Core — request-governance library for the Vanguard gateway.
//!
//! This library provides everything between a validated tool invocation and
//! the Bungie.net Platform API:
//!
//! - **Rate limiting** ([`limiter`]): a process-wide sliding-window admission
//!   controller. Callers suspend until admission is safe; calls are never
//!   dropped or reordered.
//! - **Credential lifecycle** ([`auth`]): OAuth2 authorization-code exchange
//!   and refresh against the Bungie token endpoint, with explicit expiry
//!   tracking. Refresh is always caller-driven — an expired credential fails
//!   the call rather than silently re-authenticating.
//! - **Governed calls** ([`client`]): the single outbound call path that
//!   composes admission, the credential gate, and HTTP outcome
//!   classification, plus the per-endpoint URL builders.
//! - **JSON-RPC plumbing** ([`jsonrpc`]): transport-agnostic message
//!   classification and response types shared by the stdio and socket
//!   transports in the `vanguard` binary.
//!
//! Error kinds are never collapsed on the way up: an expired token, a remote
//! rate limit, and an unreachable server each surface as distinct
//! [`error::GatewayError`] variants so calling agents can decide whether to
//! re-authenticate, back off, or give up.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod limiter;

pub use auth::{Authenticator, Credential};
pub use client::{ApiClient, ApiClientConfig};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use limiter::{RateLimiter, RateLimiterConfig};
