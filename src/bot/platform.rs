use crate::error::AppResult;
use crate::verification::GuildPlatform;
use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, Cache, GuildId, Http, RoleId, UserId};
use std::sync::Arc;
use tracing::debug;

const GRANT_REASON: &str = "Passed verification";

/// [`GuildPlatform`] over serenity's cache, falling back to the HTTP API
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityPlatform {
    pub fn new(ctx: &serenity::Context) -> Self {
        Self {
            http: ctx.http.clone(),
            cache: ctx.cache.clone(),
        }
    }
}

#[async_trait]
impl GuildPlatform for SerenityPlatform {
    async fn installed_guilds(&self) -> AppResult<Vec<GuildId>> {
        Ok(self.cache.guilds())
    }

    async fn is_member(&self, guild_id: GuildId, user_id: UserId) -> AppResult<bool> {
        let cached = self.cache.member(guild_id, user_id).is_some();
        if cached {
            return Ok(true);
        }

        match self.http.get_member(guild_id, user_id).await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(guild_id = %guild_id, user_id = %user_id, "Not a member: {}", e);
                Ok(false)
            }
        }
    }

    async fn role_exists(&self, guild_id: GuildId, role_id: RoleId) -> AppResult<bool> {
        let cached = self
            .cache
            .guild(guild_id)
            .map(|guild| guild.roles.contains_key(&role_id));
        if cached == Some(true) {
            return Ok(true);
        }

        let roles = guild_id.roles(&self.http).await?;
        Ok(roles.contains_key(&role_id))
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some(GRANT_REASON))
            .await?;
        Ok(())
    }
}
