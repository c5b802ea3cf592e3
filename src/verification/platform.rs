use crate::error::AppResult;
use async_trait::async_trait;
use poise::serenity_prelude::{GuildId, RoleId, UserId};

/// Outbound platform operations the engine depends on.
///
/// Granting a role the member already holds must succeed.
#[async_trait]
pub trait GuildPlatform: Send + Sync {
    /// Every guild the bot is installed in
    async fn installed_guilds(&self) -> AppResult<Vec<GuildId>>;

    async fn is_member(&self, guild_id: GuildId, user_id: UserId) -> AppResult<bool>;

    async fn role_exists(&self, guild_id: GuildId, role_id: RoleId) -> AppResult<bool>;

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<()>;
}
