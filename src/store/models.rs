use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, RoleId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Guild configuration as it sits at rest.
///
/// `channel_id` and `role_id` hold cipher text; both backends store this
/// shape unchanged.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StoredGuildConfig {
    pub guild_id: String,
    pub channel_id: Option<String>,
    pub role_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted guild configuration, only held for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildConfig {
    pub guild_id: GuildId,
    /// Channel where verification is accepted. `None` means any channel.
    pub channel_id: Option<ChannelId>,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse a Discord snowflake. Zero is rejected since serenity ids are non-zero.
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id != 0)
}
