//! Vanguard — governed MCP gateway for the Bungie Destiny 2 API.
//!
//! This crate binds the governance library (`vanguard-core`) to the
//! outside world:
//!
//! - [`catalog`]: the static tool catalog served by `tools/list`, plus the
//!   explicit name-to-operation binding table validated at startup.
//! - [`dispatcher`]: JSON-RPC method routing. Every tool invocation yields
//!   exactly one response envelope, success or failure — errors never
//!   escape to a transport.
//! - [`transport`]: NDJSON framing over two interchangeable bindings: a
//!   single-peer stdio stream and a multi-connection TCP listener.

pub mod catalog;
pub mod dispatcher;
pub mod transport;
