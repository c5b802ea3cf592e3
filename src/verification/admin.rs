//! Administrator operations on guild configuration.
//!
//! Capability is checked before the store is touched.

use crate::store::{ConfigStore, GuildConfig};
use crate::verification::VerifyError;
use poise::serenity_prelude::{ChannelId, GuildId, RoleId};
use tracing::{info, warn};

/// Store the designated channel and role, returning the record as stored.
pub async fn configure(
    store: &ConfigStore,
    caller_is_admin: bool,
    guild_id: GuildId,
    channel_id: Option<ChannelId>,
    role_id: RoleId,
) -> Result<GuildConfig, VerifyError> {
    if !caller_is_admin {
        warn!(guild_id = %guild_id, "Rejected configuration change from non-admin");
        return Err(VerifyError::PermissionDenied);
    }

    store.upsert(guild_id, channel_id, role_id).await?;
    let stored = store
        .get(guild_id)
        .await?
        .ok_or(VerifyError::ConfigurationMissing)?;

    info!(guild_id = %guild_id, role_id = %stored.role_id, "Verification configured");
    Ok(stored)
}

/// Remove a guild's configuration. Returns false when nothing was stored.
pub async fn clear(
    store: &ConfigStore,
    caller_is_admin: bool,
    guild_id: GuildId,
) -> Result<bool, VerifyError> {
    if !caller_is_admin {
        warn!(guild_id = %guild_id, "Rejected configuration clear from non-admin");
        return Err(VerifyError::PermissionDenied);
    }
    Ok(store.clear(guild_id).await?)
}

/// Current configuration for a guild.
pub async fn status(store: &ConfigStore, guild_id: GuildId) -> Result<GuildConfig, VerifyError> {
    store
        .get(guild_id)
        .await?
        .ok_or(VerifyError::ConfigurationMissing)
}
