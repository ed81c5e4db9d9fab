//! JSON-RPC method routing for one peer.
//!
//! Each transport connection owns its own `Dispatcher` instance; the
//! governed [`ApiClient`] behind it is shared process-wide, so every
//! connection is paced by the same rate-limiter window.
//!
//! The dispatch contract: every request yields exactly one response, and a
//! tool invocation yields exactly one result envelope — success, or a
//! failure envelope carrying the error message. No error kind escapes this
//! boundary; only protocol-level faults (unknown method, bad params shape)
//! become JSON-RPC error objects.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use vanguard_core::client::ApiClient;
use vanguard_core::error::GatewayError;
use vanguard_core::jsonrpc::{JsonRpcError, JsonRpcId, JsonRpcResponse, MessageKind};

use crate::catalog::{self, ToolOp};

/// MCP protocol revision implemented by the gateway.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Per-connection request router.
pub struct Dispatcher {
    client: Arc<ApiClient>,
}

impl Dispatcher {
    /// Create a dispatcher over the shared governed client.
    ///
    /// Catalog/binding consistency is a startup concern
    /// ([`catalog::verify_bindings`]), not re-checked per connection.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Route one classified message. Returns `None` when the message needs
    /// no reply (notifications, stray responses).
    pub async fn dispatch(
        &self,
        kind: MessageKind,
        params: Option<Value>,
    ) -> Option<JsonRpcResponse> {
        match kind {
            MessageKind::Request { id, method } => {
                Some(self.handle_request(id, &method, params).await)
            }
            MessageKind::Notification { method } => {
                debug!(method, "notification consumed");
                None
            }
            MessageKind::Response { .. } => {
                // The gateway never issues requests to its peers, so an
                // inbound response has nothing to correlate with.
                debug!("ignoring stray response message");
                None
            }
        }
    }

    async fn handle_request(
        &self,
        id: JsonRpcId,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        match method {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": { "listChanged": false }
                    },
                    "serverInfo": {
                        "name": "vanguard",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::success(id, json!({ "tools": catalog::catalog() }))
            }
            "tools/call" => self.handle_tools_call(id, params).await,
            _ => {
                debug!(method, "method not found");
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::from(&GatewayError::MethodNotFound {
                        method: method.to_string(),
                    }),
                )
            }
        }
    }

    /// Invoke a tool and wrap the outcome in a result envelope.
    ///
    /// Failures of any kind — validation, credentials, rate limits, the
    /// provider itself — become an `isError` envelope with the error's
    /// message, mirroring what a human would need to decide between
    /// retrying, re-authenticating, and giving up.
    async fn handle_tools_call(&self, id: JsonRpcId, params: Option<Value>) -> JsonRpcResponse {
        let tool_name = params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_string();

        match self.invoke_tool(params.as_ref()).await {
            Ok(payload) => {
                debug!(tool = %tool_name, "tool invocation succeeded");
                let text = serde_json::to_string_pretty(&payload)
                    .unwrap_or_else(|_| payload.to_string());
                JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": text }]
                    }),
                )
            }
            Err(err) => {
                warn!(
                    tool = %tool_name,
                    error_type = err.error_type_name(),
                    error = %err,
                    "tool invocation failed"
                );
                JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": format!("Error: {err}") }],
                        "isError": true
                    }),
                )
            }
        }
    }

    /// Validate a `tools/call` payload and run the bound operation.
    async fn invoke_tool(&self, params: Option<&Value>) -> Result<Value, GatewayError> {
        let params = params.ok_or_else(|| GatewayError::InvalidParams {
            details: "tools/call requires a params object".to_string(),
        })?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidParams {
                details: "tool name missing or not a string".to_string(),
            })?;

        let args = match params.get("arguments") {
            Some(args) if args.is_object() => args,
            Some(_) => {
                return Err(GatewayError::InvalidParams {
                    details: "arguments must be an object".to_string(),
                });
            }
            None => return Err(GatewayError::MissingArguments),
        };

        let op = ToolOp::from_name(name).ok_or_else(|| GatewayError::UnknownTool {
            name: name.to_string(),
        })?;

        self.run_op(op, args).await
    }

    /// Map validated arguments onto the gateway operation.
    ///
    /// Defaults here match the declared catalog schemas exactly.
    async fn run_op(&self, op: ToolOp, args: &Value) -> Result<Value, GatewayError> {
        let client = &self.client;
        match op {
            ToolOp::GetProfile => {
                client
                    .get_profile(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        &opt_i64_list(args, "components")?.unwrap_or_else(|| vec![100, 200]),
                    )
                    .await
            }
            ToolOp::GetCharacter => {
                client
                    .get_character(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        req_str(args, "characterId")?,
                        &opt_i64_list(args, "components")?.unwrap_or_else(|| vec![200]),
                    )
                    .await
            }
            ToolOp::GetItem => {
                client
                    .get_item(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        req_str(args, "itemInstanceId")?,
                        &opt_i64_list(args, "components")?.unwrap_or_else(|| vec![300]),
                    )
                    .await
            }
            ToolOp::SearchPlayer => {
                client
                    .search_player(
                        req_i64(args, "membershipType")?,
                        req_str(args, "displayName")?,
                    )
                    .await
            }
            ToolOp::GetActivityHistory => {
                client
                    .get_activity_history(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        req_str(args, "characterId")?,
                        opt_i64(args, "count")?.unwrap_or(25),
                        opt_i64(args, "mode")?,
                        opt_i64(args, "page")?,
                    )
                    .await
            }
            ToolOp::GetManifest => client.get_manifest().await,
            ToolOp::GetLinkedProfiles => {
                client
                    .get_linked_profiles(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                    )
                    .await
            }
            ToolOp::GetEntityDefinition => {
                client
                    .get_entity_definition(
                        req_str(args, "entityType")?,
                        req_i64(args, "hashIdentifier")?,
                    )
                    .await
            }
            ToolOp::GetPublicMilestones => client.get_public_milestones().await,
            ToolOp::GetPublicMilestoneContent => {
                client
                    .get_public_milestone_content(req_i64(args, "milestoneHash")?)
                    .await
            }
            ToolOp::GetPublicVendors => {
                client
                    .get_public_vendors(
                        &opt_i64_list(args, "components")?.unwrap_or_else(|| vec![400, 401, 402]),
                    )
                    .await
            }
            ToolOp::GetHistoricalStats => {
                client
                    .get_historical_stats(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        req_str(args, "characterId")?,
                        opt_i64(args, "periodType")?,
                        opt_i64_list(args, "modes")?.as_deref(),
                        opt_i64_list(args, "groups")?.as_deref(),
                    )
                    .await
            }
            ToolOp::GetLeaderboards => {
                client
                    .get_leaderboards(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        opt_i64(args, "maxtop")?,
                        opt_str(args, "modes")?,
                        opt_str(args, "statid")?,
                    )
                    .await
            }
            ToolOp::SearchPlayerByBungieName => {
                client
                    .search_player_by_bungie_name(
                        req_i64(args, "membershipType")?,
                        req_str(args, "displayName")?,
                        req_i64(args, "displayNameCode")?,
                    )
                    .await
            }
            ToolOp::GetClanWeeklyRewardState => {
                client
                    .get_clan_weekly_reward_state(req_str(args, "groupId")?)
                    .await
            }
            ToolOp::GetClanBannerSource => client.get_clan_banner_source().await,
            ToolOp::GetAggregateActivityStats => {
                client
                    .get_aggregate_activity_stats(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        req_str(args, "characterId")?,
                    )
                    .await
            }
            ToolOp::GetUniqueWeaponHistory => {
                client
                    .get_unique_weapon_history(
                        req_i64(args, "membershipType")?,
                        req_str(args, "membershipId")?,
                        req_str(args, "characterId")?,
                    )
                    .await
            }
            ToolOp::GetPostGameCarnageReport => {
                client
                    .get_post_game_carnage_report(req_str(args, "activityId")?)
                    .await
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument extraction
// ─────────────────────────────────────────────────────────────────────────────

fn req_i64(args: &Value, key: &str) -> Result<i64, GatewayError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| GatewayError::InvalidParams {
            details: format!("'{key}' is required and must be an integer"),
        })
}

fn req_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, GatewayError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidParams {
            details: format!("'{key}' is required and must be a string"),
        })
}

fn opt_i64(args: &Value, key: &str) -> Result<Option<i64>, GatewayError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| GatewayError::InvalidParams {
                details: format!("'{key}' must be an integer"),
            }),
    }
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Result<Option<&'a str>, GatewayError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| GatewayError::InvalidParams {
                details: format!("'{key}' must be a string"),
            }),
    }
}

fn opt_i64_list(args: &Value, key: &str) -> Result<Option<Vec<i64>>, GatewayError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_i64().ok_or_else(|| GatewayError::InvalidParams {
                    details: format!("'{key}' must be an array of integers"),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(GatewayError::InvalidParams {
            details: format!("'{key}' must be an array of integers"),
        }),
    }
}
