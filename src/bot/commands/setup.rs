use crate::bot::Data;
use crate::verification::{admin, VerifyError};
use poise::serenity_prelude as serenity;
use tracing::error;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Configure verification for your server
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    default_member_permissions = "ADMINISTRATOR",
    subcommands("config_set", "config_clear", "config_status")
)]
pub async fn verifyconfig(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Only interaction members carry resolved permissions, so text commands never pass.
async fn caller_is_admin(ctx: Context<'_>) -> bool {
    ctx.author_member()
        .await
        .and_then(|member| member.permissions)
        .is_some_and(|perms| perms.administrator())
}

async fn reply_error(ctx: Context<'_>, err: VerifyError) -> Result<(), Error> {
    if let VerifyError::Transport(ref cause) = err {
        error!("Configuration command failed: {}", cause);
    }
    ctx.send(
        poise::CreateReply::default()
            .content(format!("❌ {}", err.user_message()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn channel_label(channel_id: Option<serenity::ChannelId>) -> String {
    match channel_id {
        Some(id) => format!("<#{}>", id),
        None => "Any channel".to_string(),
    }
}

/// Set the role granted on verification and the channel it is accepted in
#[poise::command(slash_command, guild_only, rename = "set")]
pub async fn config_set(
    ctx: Context<'_>,
    #[description = "Role granted to verified members"] role: serenity::Role,
    #[description = "Channel where /verify is accepted (any channel if omitted)"]
    channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a guild")?;
    let is_admin = caller_is_admin(ctx).await;

    let stored = match admin::configure(
        &ctx.data().store,
        is_admin,
        guild_id,
        channel.map(|c| c.id),
        role.id,
    )
    .await
    {
        Ok(stored) => stored,
        Err(e) => return reply_error(ctx, e).await,
    };

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "✅ Verification configured.\nRole: <@&{}>\nChannel: {}",
                stored.role_id,
                channel_label(stored.channel_id)
            ))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Remove this server's verification settings
#[poise::command(slash_command, guild_only, rename = "clear")]
pub async fn config_clear(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a guild")?;
    let is_admin = caller_is_admin(ctx).await;

    let message = match admin::clear(&ctx.data().store, is_admin, guild_id).await {
        Ok(true) => "✅ Verification settings removed.",
        Ok(false) => "Verification was not configured on this server.",
        Err(e) => return reply_error(ctx, e).await,
    };

    ctx.send(poise::CreateReply::default().content(message).ephemeral(true))
        .await?;
    Ok(())
}

/// Show the current verification settings
#[poise::command(slash_command, guild_only, rename = "status")]
pub async fn config_status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a guild")?;

    let config = match admin::status(&ctx.data().store, guild_id).await {
        Ok(config) => config,
        Err(e) => return reply_error(ctx, e).await,
    };

    let embed = serenity::CreateEmbed::default()
        .title("Verification Settings")
        .field("Role", format!("<@&{}>", config.role_id), true)
        .field("Channel", channel_label(config.channel_id), true)
        .field(
            "Identity check",
            if ctx.data().engine.policy().require_identity {
                "Gamertag required"
            } else {
                "Off"
            },
            true,
        )
        .field("Last updated", config.updated_at.format("%Y-%m-%d %H:%M UTC").to_string(), false)
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}
