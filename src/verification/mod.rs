//! Verification workflow.
//!
//! A single-guild attempt walks `Start → ConfigLoaded → ChannelChecked →
//! [IdentityResolved] → RoleGranted`; any step may exit with a
//! [`VerifyError`]. Attempts made outside a guild fan out over every guild the
//! bot is installed in.

pub mod admin;
pub mod engine;
pub mod error;
pub mod platform;

pub use engine::{
    FanOutReport, Stage, Verification, VerificationAttempt, VerificationEngine, VerificationPolicy,
    VerifyOutcome,
};
pub use error::VerifyError;
pub use platform::GuildPlatform;

#[cfg(test)]
pub(crate) mod testing {
    use super::GuildPlatform;
    use crate::error::AppResult;
    use async_trait::async_trait;
    use poise::serenity_prelude::{GuildId, RoleId, UserId};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeGuild {
        roles: HashSet<RoleId>,
        members: HashSet<UserId>,
    }

    /// In-memory platform recording every grant
    #[derive(Debug, Default)]
    pub struct FakePlatform {
        guilds: HashMap<GuildId, FakeGuild>,
        granted: Mutex<Vec<(GuildId, UserId, RoleId)>>,
    }

    impl FakePlatform {
        pub fn with_guild(
            mut self,
            guild_id: GuildId,
            roles: &[RoleId],
            members: &[UserId],
        ) -> Self {
            self.guilds.insert(
                guild_id,
                FakeGuild {
                    roles: roles.iter().copied().collect(),
                    members: members.iter().copied().collect(),
                },
            );
            self
        }

        pub fn grants(&self) -> Vec<(GuildId, UserId, RoleId)> {
            self.granted.lock().unwrap().clone()
        }

        pub fn holds(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId) -> bool {
            self.grants().contains(&(guild_id, user_id, role_id))
        }
    }

    #[async_trait]
    impl GuildPlatform for FakePlatform {
        async fn installed_guilds(&self) -> AppResult<Vec<GuildId>> {
            let mut ids: Vec<_> = self.guilds.keys().copied().collect();
            ids.sort();
            Ok(ids)
        }

        async fn is_member(&self, guild_id: GuildId, user_id: UserId) -> AppResult<bool> {
            Ok(self
                .guilds
                .get(&guild_id)
                .is_some_and(|g| g.members.contains(&user_id)))
        }

        async fn role_exists(&self, guild_id: GuildId, role_id: RoleId) -> AppResult<bool> {
            Ok(self
                .guilds
                .get(&guild_id)
                .is_some_and(|g| g.roles.contains(&role_id)))
        }

        async fn grant_role(
            &self,
            guild_id: GuildId,
            user_id: UserId,
            role_id: RoleId,
        ) -> AppResult<()> {
            self.granted.lock().unwrap().push((guild_id, user_id, role_id));
            Ok(())
        }
    }
}
