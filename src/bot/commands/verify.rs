use crate::bot::platform::SerenityPlatform;
use crate::bot::Data;
use crate::verification::{Verification, VerificationAttempt, VerifyError};
use tracing::{error, warn};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Verify yourself to receive the server's verified role
///
/// In a direct message, verifies you in every server you share with the bot.
#[poise::command(slash_command, prefix_command)]
pub async fn verify(
    ctx: Context<'_>,
    #[description = "Your Xbox gamertag, if this server asks for one"] gamertag: Option<String>,
) -> Result<(), Error> {
    let attempt = VerificationAttempt {
        actor_id: ctx.author().id,
        guild_id: ctx.guild_id(),
        channel_id: ctx.channel_id(),
        claimed_identity: gamertag,
    };

    // Identity lookups and fan-out can outlast the interaction deadline
    ctx.defer_ephemeral().await?;

    let platform = SerenityPlatform::new(ctx.serenity_context());
    let result = ctx.data().engine.verify(&platform, &attempt).await;

    let reply = poise::CreateReply::default()
        .content(render_outcome(&result, &attempt))
        .ephemeral(true);
    if let Err(e) = ctx.send(reply).await {
        error!("Failed to report verification outcome: {}", e);
    }

    if matches!(result, Ok(Verification::Guild(_))) && ctx.data().cleanup_on_success {
        remove_invocation(ctx).await;
    }

    Ok(())
}

fn render_outcome(
    result: &Result<Verification, VerifyError>,
    attempt: &VerificationAttempt,
) -> String {
    match result {
        Ok(Verification::Guild(outcome)) => match &outcome.identity {
            Some(identity) => format!(
                "✅ <@{}> verified as **{}**! You now have <@&{}>.",
                attempt.actor_id, identity.canonical_name, outcome.role_id
            ),
            None => format!(
                "✅ <@{}> verified! You now have <@&{}>.",
                attempt.actor_id, outcome.role_id
            ),
        },
        Ok(Verification::FanOut(report)) if report.granted > 0 => {
            format!("✅ Verified in {} server(s).", report.granted)
        }
        Ok(Verification::FanOut(report)) if report.considered > 0 => {
            "❌ Verification is set up in servers we share, but the role could not be granted. \
             Please contact a server administrator."
                .to_string()
        }
        Ok(Verification::FanOut(_)) => {
            "❌ None of the servers we share have verification set up for you.".to_string()
        }
        Err(e) => format!("❌ {}", e.user_message()),
    }
}

/// Remove the text command that triggered a successful verification.
async fn remove_invocation(ctx: Context<'_>) {
    if let poise::Context::Prefix(prefix) = ctx {
        if let Err(e) = prefix.msg.delete(ctx.serenity_context()).await {
            warn!("Failed to remove verification message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ExternalIdentity;
    use crate::verification::{FanOutReport, VerifyOutcome};
    use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};

    fn attempt() -> VerificationAttempt {
        VerificationAttempt {
            actor_id: UserId::new(11),
            guild_id: Some(GuildId::new(22)),
            channel_id: ChannelId::new(33),
            claimed_identity: None,
        }
    }

    #[test]
    fn test_render_guild_success() {
        let result = Ok(Verification::Guild(VerifyOutcome {
            guild_id: GuildId::new(22),
            role_id: RoleId::new(44),
            identity: None,
        }));
        let text = render_outcome(&result, &attempt());
        assert!(text.contains("<@11>"));
        assert!(text.contains("<@&44>"));
    }

    #[test]
    fn test_render_identity_success() {
        let result = Ok(Verification::Guild(VerifyOutcome {
            guild_id: GuildId::new(22),
            role_id: RoleId::new(44),
            identity: Some(ExternalIdentity {
                claimed_name: "steve".into(),
                opaque_id: "1".into(),
                canonical_name: "Steve".into(),
            }),
        }));
        assert!(render_outcome(&result, &attempt()).contains("**Steve**"));
    }

    #[test]
    fn test_render_fan_out_count() {
        let report = FanOutReport {
            granted: 2,
            considered: 3,
            identity: None,
        };
        let text = render_outcome(&Ok(Verification::FanOut(report)), &attempt());
        assert!(text.contains("2 server"));
    }

    #[test]
    fn test_render_fan_out_failed_grants_differs_from_unconfigured() {
        let failed = FanOutReport {
            granted: 0,
            considered: 2,
            identity: None,
        };
        let unconfigured = FanOutReport::default();

        let failed_text = render_outcome(&Ok(Verification::FanOut(failed)), &attempt());
        let unconfigured_text =
            render_outcome(&Ok(Verification::FanOut(unconfigured)), &attempt());
        assert_ne!(failed_text, unconfigured_text);
        assert!(failed_text.contains("could not be granted"));
        assert!(unconfigured_text.contains("None of the servers"));
    }

    #[test]
    fn test_render_error_uses_user_message() {
        let text = render_outcome(&Err(VerifyError::ChannelMismatch), &attempt());
        assert_eq!(text, format!("❌ {}", VerifyError::ChannelMismatch.user_message()));
    }
}
