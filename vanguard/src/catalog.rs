//! The static tool catalog and its operation binding table.
//!
//! The catalog is descriptive metadata: names, descriptions, and JSON-schema
//! input shapes served verbatim by `tools/list`. The binding from a tool
//! name to a gateway operation is a separate, explicit table ([`ToolOp`]).
//! [`verify_bindings`] cross-checks the two at startup so that a catalog
//! entry without an operation (or vice versa) is a load-time failure, not a
//! runtime surprise.

use std::sync::LazyLock;

use serde_json::{Value, json};

use vanguard_core::error::GatewayError;

/// Every operation the dispatcher can bind a tool invocation to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOp {
    GetProfile,
    GetCharacter,
    GetItem,
    SearchPlayer,
    GetActivityHistory,
    GetManifest,
    GetLinkedProfiles,
    GetEntityDefinition,
    GetPublicMilestones,
    GetPublicMilestoneContent,
    GetPublicVendors,
    GetHistoricalStats,
    GetLeaderboards,
    SearchPlayerByBungieName,
    GetClanWeeklyRewardState,
    GetClanBannerSource,
    GetAggregateActivityStats,
    GetUniqueWeaponHistory,
    GetPostGameCarnageReport,
}

impl ToolOp {
    /// All bound operations, in catalog order.
    pub const ALL: [ToolOp; 19] = [
        ToolOp::GetProfile,
        ToolOp::GetCharacter,
        ToolOp::GetItem,
        ToolOp::SearchPlayer,
        ToolOp::GetActivityHistory,
        ToolOp::GetManifest,
        ToolOp::GetLinkedProfiles,
        ToolOp::GetEntityDefinition,
        ToolOp::GetPublicMilestones,
        ToolOp::GetPublicMilestoneContent,
        ToolOp::GetPublicVendors,
        ToolOp::GetHistoricalStats,
        ToolOp::GetLeaderboards,
        ToolOp::SearchPlayerByBungieName,
        ToolOp::GetClanWeeklyRewardState,
        ToolOp::GetClanBannerSource,
        ToolOp::GetAggregateActivityStats,
        ToolOp::GetUniqueWeaponHistory,
        ToolOp::GetPostGameCarnageReport,
    ];

    /// Resolve a tool name from the wire to its bound operation.
    pub fn from_name(name: &str) -> Option<ToolOp> {
        ToolOp::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// The wire name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            ToolOp::GetProfile => "get_destiny_profile",
            ToolOp::GetCharacter => "get_destiny_character",
            ToolOp::GetItem => "get_destiny_item",
            ToolOp::SearchPlayer => "search_destiny_player",
            ToolOp::GetActivityHistory => "get_activity_history",
            ToolOp::GetManifest => "get_destiny_manifest",
            ToolOp::GetLinkedProfiles => "get_linked_profiles",
            ToolOp::GetEntityDefinition => "get_destiny_entity_definition",
            ToolOp::GetPublicMilestones => "get_public_milestones",
            ToolOp::GetPublicMilestoneContent => "get_public_milestone_content",
            ToolOp::GetPublicVendors => "get_public_vendors",
            ToolOp::GetHistoricalStats => "get_historical_stats",
            ToolOp::GetLeaderboards => "get_leaderboards",
            ToolOp::SearchPlayerByBungieName => "search_destiny_player_by_bungie_name",
            ToolOp::GetClanWeeklyRewardState => "get_clan_weekly_reward_state",
            ToolOp::GetClanBannerSource => "get_clan_banner_source",
            ToolOp::GetAggregateActivityStats => "get_aggregate_activity_stats",
            ToolOp::GetUniqueWeaponHistory => "get_unique_weapon_history",
            ToolOp::GetPostGameCarnageReport => "get_post_game_carnage_report",
        }
    }
}

static CATALOG: LazyLock<Value> = LazyLock::new(|| {
    json!([
        {
            "name": "get_destiny_profile",
            "description": "Get Destiny 2 profile information for a player",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {
                        "type": "number",
                        "description": "Platform membership type (1=Xbox, 2=PSN, 3=Steam, 4=Blizzard, 5=Stadia, 6=Epic, 254=BungieNext)"
                    },
                    "membershipId": {
                        "type": "string",
                        "description": "Platform-specific membership ID"
                    },
                    "components": {
                        "type": "array",
                        "items": {"type": "number"},
                        "description": "Component types to include (100=Profiles, 200=Characters, 201=CharacterInventories, etc.)",
                        "default": [100, 200]
                    }
                },
                "required": ["membershipType", "membershipId"]
            }
        },
        {
            "name": "get_destiny_character",
            "description": "Get detailed information about a specific Destiny 2 character",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "characterId": {"type": "string", "description": "Character ID"},
                    "components": {
                        "type": "array",
                        "items": {"type": "number"},
                        "description": "Component types to include",
                        "default": [200]
                    }
                },
                "required": ["membershipType", "membershipId", "characterId"]
            }
        },
        {
            "name": "get_destiny_item",
            "description": "Get detailed information about a specific Destiny 2 item",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "itemInstanceId": {"type": "string", "description": "Item instance ID"},
                    "components": {
                        "type": "array",
                        "items": {"type": "number"},
                        "description": "Component types to include",
                        "default": [300]
                    }
                },
                "required": ["membershipType", "membershipId", "itemInstanceId"]
            }
        },
        {
            "name": "search_destiny_player",
            "description": "Search for a Destiny 2 player by display name",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type to search on"},
                    "displayName": {"type": "string", "description": "Player display name to search for"}
                },
                "required": ["membershipType", "displayName"]
            }
        },
        {
            "name": "get_activity_history",
            "description": "Get activity history for a Destiny 2 character",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "characterId": {"type": "string", "description": "Character ID"},
                    "count": {"type": "number", "description": "Number of activities to return", "default": 25},
                    "mode": {"type": "number", "description": "Activity mode filter (optional)"},
                    "page": {"type": "number", "description": "Page number for pagination (optional)"}
                },
                "required": ["membershipType", "membershipId", "characterId"]
            }
        },
        {
            "name": "get_destiny_manifest",
            "description": "Get the Destiny 2 manifest containing game definitions and metadata",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        },
        {
            "name": "get_linked_profiles",
            "description": "Get linked profiles for a Destiny 2 player across platforms",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"}
                },
                "required": ["membershipType", "membershipId"]
            }
        },
        {
            "name": "get_destiny_entity_definition",
            "description": "Get definition data for a specific Destiny 2 entity (weapons, armor, etc.)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "entityType": {"type": "string", "description": "Entity type (DestinyInventoryItemDefinition, DestinyActivityDefinition, etc.)"},
                    "hashIdentifier": {"type": "number", "description": "Hash identifier for the entity"}
                },
                "required": ["entityType", "hashIdentifier"]
            }
        },
        {
            "name": "get_public_milestones",
            "description": "Get current public milestones available to all players",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        },
        {
            "name": "get_public_milestone_content",
            "description": "Get detailed content for a specific milestone",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "milestoneHash": {"type": "number", "description": "Milestone hash identifier"}
                },
                "required": ["milestoneHash"]
            }
        },
        {
            "name": "get_public_vendors",
            "description": "Get public vendor information and their current inventories",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "components": {
                        "type": "array",
                        "items": {"type": "number"},
                        "description": "Vendor component types (400=Vendors, 401=VendorCategories, 402=VendorSales)",
                        "default": [400, 401, 402]
                    }
                },
                "required": []
            }
        },
        {
            "name": "get_historical_stats",
            "description": "Get historical game statistics for a character",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "characterId": {"type": "string", "description": "Character ID"},
                    "periodType": {"type": "number", "description": "Period type (0=None, 1=Daily, 2=Weekly, 3=Monthly)"},
                    "modes": {"type": "array", "items": {"type": "number"}, "description": "Game mode filters"},
                    "groups": {"type": "array", "items": {"type": "number"}, "description": "Stat group filters"}
                },
                "required": ["membershipType", "membershipId", "characterId"]
            }
        },
        {
            "name": "get_leaderboards",
            "description": "Get leaderboard data for a player",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "maxtop": {"type": "number", "description": "Maximum number of top entries to return"},
                    "modes": {"type": "string", "description": "Game modes to include"},
                    "statid": {"type": "string", "description": "Stat ID to query"}
                },
                "required": ["membershipType", "membershipId"]
            }
        },
        {
            "name": "search_destiny_player_by_bungie_name",
            "description": "Search for a Destiny player using their Bungie Name and discriminator",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "displayName": {"type": "string", "description": "Bungie display name"},
                    "displayNameCode": {"type": "number", "description": "Bungie name code (discriminator)"}
                },
                "required": ["membershipType", "displayName", "displayNameCode"]
            }
        },
        {
            "name": "get_clan_weekly_reward_state",
            "description": "Get weekly reward state for a clan",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "groupId": {"type": "string", "description": "Clan group ID"}
                },
                "required": ["groupId"]
            }
        },
        {
            "name": "get_clan_banner_source",
            "description": "Get the dictionary of available clan banner options",
            "inputSchema": {
                "type": "object",
                "properties": {},
                "required": []
            }
        },
        {
            "name": "get_aggregate_activity_stats",
            "description": "Get aggregate activity statistics for a character",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "characterId": {"type": "string", "description": "Character ID"}
                },
                "required": ["membershipType", "membershipId", "characterId"]
            }
        },
        {
            "name": "get_unique_weapon_history",
            "description": "Get unique weapon usage history for a character",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "membershipType": {"type": "number", "description": "Platform membership type"},
                    "membershipId": {"type": "string", "description": "Platform-specific membership ID"},
                    "characterId": {"type": "string", "description": "Character ID"}
                },
                "required": ["membershipType", "membershipId", "characterId"]
            }
        },
        {
            "name": "get_post_game_carnage_report",
            "description": "Get detailed Post-Game Carnage Report (PGCR) for a specific activity instance, including all participants, their stats, loadouts, and performance data",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "activityId": {
                        "type": "string",
                        "description": "The unique activity instance ID (obtained from activity history instanceId field)"
                    }
                },
                "required": ["activityId"]
            }
        }
    ])
});

/// The catalog served by `tools/list`, as a JSON array.
pub fn catalog() -> &'static Value {
    &CATALOG
}

/// Tool names declared in the catalog, in order.
pub fn catalog_names() -> Vec<&'static str> {
    CATALOG
        .as_array()
        .map(|tools| {
            tools
                .iter()
                .filter_map(|t| t.get("name").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Cross-check the catalog against the binding table.
///
/// Every declared tool must resolve to a [`ToolOp`] and every [`ToolOp`]
/// must be declared. Run once at startup; a mismatch aborts the gateway
/// before any transport accepts traffic.
pub fn verify_bindings() -> Result<(), GatewayError> {
    let names = catalog_names();

    for name in &names {
        if ToolOp::from_name(name).is_none() {
            return Err(GatewayError::InvalidParams {
                details: format!("catalog declares tool '{name}' with no bound operation"),
            });
        }
    }

    for op in ToolOp::ALL {
        if !names.contains(&op.name()) {
            return Err(GatewayError::InvalidParams {
                details: format!("operation '{}' is not declared in the catalog", op.name()),
            });
        }
    }

    Ok(())
}
