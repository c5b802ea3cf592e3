use crate::config::VerificationConfig;
use crate::error::AppError;
use crate::identity::{resolve_claim, ExternalIdentity, IdentityProvider};
use crate::store::{ConfigStore, GuildConfig};
use crate::verification::{GuildPlatform, VerifyError};
use futures::future::join_all;
use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Which checks a verification runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub restrict_channel: bool,
    pub require_identity: bool,
}

impl From<&VerificationConfig> for VerificationPolicy {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            restrict_channel: config.restrict_channel,
            require_identity: config.require_identity,
        }
    }
}

/// One invocation of the verify command
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    pub actor_id: UserId,
    /// `None` when invoked outside a guild, which fans out over every guild
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub claimed_identity: Option<String>,
}

/// Progress through a single-guild verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ConfigLoaded,
    ChannelChecked,
    IdentityResolved,
    RoleGranted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ConfigLoaded => "config_loaded",
            Self::ChannelChecked => "channel_checked",
            Self::IdentityResolved => "identity_resolved",
            Self::RoleGranted => "role_granted",
        }
    }
}

/// Successful single-guild verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub guild_id: GuildId,
    pub role_id: RoleId,
    pub identity: Option<ExternalIdentity>,
}

/// Aggregate result of a fan-out verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Guilds where the role was granted
    pub granted: usize,
    /// Guilds where the actor is a member and a configuration exists
    pub considered: usize,
    pub identity: Option<ExternalIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Guild(VerifyOutcome),
    FanOut(FanOutReport),
}

enum GuildStep {
    NotMember,
    NotConfigured,
    Granted,
}

/// Runs verification attempts against the configuration store.
///
/// The engine only reads configuration; writes go through
/// [`crate::verification::admin`].
pub struct VerificationEngine {
    store: Arc<ConfigStore>,
    identity: Option<Arc<dyn IdentityProvider>>,
    policy: VerificationPolicy,
}

impl std::fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEngine")
            .field("policy", &self.policy)
            .field("identity", &self.identity.is_some())
            .finish_non_exhaustive()
    }
}

impl VerificationEngine {
    pub fn new(
        store: Arc<ConfigStore>,
        identity: Option<Arc<dyn IdentityProvider>>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            store,
            identity,
            policy,
        }
    }

    pub fn policy(&self) -> VerificationPolicy {
        self.policy
    }

    /// Run one attempt to completion.
    pub async fn verify(
        &self,
        platform: &dyn GuildPlatform,
        attempt: &VerificationAttempt,
    ) -> Result<Verification, VerifyError> {
        match attempt.guild_id {
            Some(guild_id) => self
                .verify_in_guild(platform, guild_id, attempt)
                .await
                .map(Verification::Guild),
            None => self
                .verify_everywhere(platform, attempt)
                .await
                .map(Verification::FanOut),
        }
    }

    async fn verify_in_guild(
        &self,
        platform: &dyn GuildPlatform,
        guild_id: GuildId,
        attempt: &VerificationAttempt,
    ) -> Result<VerifyOutcome, VerifyError> {
        let span = info_span!("verify", guild_id = %guild_id, actor_id = %attempt.actor_id);
        async move {
            let mut stage = Stage::Start;
            let result = self.guild_flow(platform, guild_id, attempt, &mut stage).await;
            match &result {
                Ok(outcome) => info!(role_id = %outcome.role_id, "Verification succeeded"),
                Err(e) => warn!(stage = stage.as_str(), "Verification failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn guild_flow(
        &self,
        platform: &dyn GuildPlatform,
        guild_id: GuildId,
        attempt: &VerificationAttempt,
        stage: &mut Stage,
    ) -> Result<VerifyOutcome, VerifyError> {
        let config = self
            .store
            .get(guild_id)
            .await?
            .ok_or(VerifyError::ConfigurationMissing)?;
        advance(stage, Stage::ConfigLoaded);

        if self.policy.restrict_channel {
            if let Some(expected) = config.channel_id {
                if attempt.channel_id != expected {
                    return Err(VerifyError::ChannelMismatch);
                }
            }
        }
        advance(stage, Stage::ChannelChecked);

        let identity = self.check_identity(attempt.claimed_identity.as_deref()).await?;
        if identity.is_some() {
            advance(stage, Stage::IdentityResolved);
        }

        self.grant(platform, &config, attempt.actor_id).await?;
        advance(stage, Stage::RoleGranted);

        Ok(VerifyOutcome {
            guild_id,
            role_id: config.role_id,
            identity,
        })
    }

    /// Resolve the claim when the policy requires one.
    async fn check_identity(
        &self,
        claimed: Option<&str>,
    ) -> Result<Option<ExternalIdentity>, VerifyError> {
        if !self.policy.require_identity {
            return Ok(None);
        }

        let provider = self
            .identity
            .as_ref()
            .ok_or_else(|| AppError::internal("identity provider not configured"))?;
        let claim = claimed
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(VerifyError::ClaimRequired)?;

        let identity = resolve_claim(provider.as_ref(), claim).await?;
        if !identity.matches() {
            return Err(VerifyError::IdentityMismatch {
                claimed: identity.claimed_name,
                canonical: identity.canonical_name,
            });
        }
        Ok(Some(identity))
    }

    async fn grant(
        &self,
        platform: &dyn GuildPlatform,
        config: &GuildConfig,
        actor_id: UserId,
    ) -> Result<(), VerifyError> {
        if !platform.role_exists(config.guild_id, config.role_id).await? {
            return Err(VerifyError::RoleMissing);
        }
        platform
            .grant_role(config.guild_id, actor_id, config.role_id)
            .await?;
        Ok(())
    }

    /// Apply the attempt to every installed guild independently.
    ///
    /// Only a failed identity check or failing to list guilds aborts; per-guild
    /// failures are logged and left out of the count.
    async fn verify_everywhere(
        &self,
        platform: &dyn GuildPlatform,
        attempt: &VerificationAttempt,
    ) -> Result<FanOutReport, VerifyError> {
        let identity = self.check_identity(attempt.claimed_identity.as_deref()).await?;
        let guilds = platform.installed_guilds().await?;
        debug!(actor_id = %attempt.actor_id, "Fanning out over {} guilds", guilds.len());

        let steps = join_all(
            guilds
                .iter()
                .map(|guild_id| self.grant_in(platform, *guild_id, attempt.actor_id)),
        )
        .await;

        let mut report = FanOutReport {
            identity,
            ..FanOutReport::default()
        };
        for (guild_id, step) in guilds.iter().zip(steps) {
            match step {
                Ok(GuildStep::Granted) => {
                    report.considered += 1;
                    report.granted += 1;
                }
                Ok(GuildStep::NotMember | GuildStep::NotConfigured) => {}
                Err(e) => {
                    report.considered += 1;
                    warn!(
                        guild_id = %guild_id,
                        actor_id = %attempt.actor_id,
                        "Skipping guild: {}",
                        e
                    );
                }
            }
        }

        info!(
            actor_id = %attempt.actor_id,
            "Fan-out verification granted {} of {} guilds",
            report.granted,
            report.considered
        );
        Ok(report)
    }

    async fn grant_in(
        &self,
        platform: &dyn GuildPlatform,
        guild_id: GuildId,
        actor_id: UserId,
    ) -> Result<GuildStep, VerifyError> {
        if !platform.is_member(guild_id, actor_id).await? {
            return Ok(GuildStep::NotMember);
        }
        let Some(config) = self.store.get(guild_id).await? else {
            return Ok(GuildStep::NotConfigured);
        };
        self.grant(platform, &config, actor_id).await?;
        Ok(GuildStep::Granted)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("{} -> {}", stage.as_str(), next.as_str());
    *stage = next;
}
