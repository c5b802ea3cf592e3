pub mod commands;
pub mod platform;

use crate::config::AppConfig;
use crate::store::ConfigStore;
use crate::verification::{VerificationEngine, VerifyError};
use poise::serenity_prelude::{self as serenity, FullEvent, GatewayIntents};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared data accessible in all commands
#[derive(Debug)]
pub struct Data {
    pub engine: Arc<VerificationEngine>,
    pub store: Arc<ConfigStore>,
    pub cleanup_on_success: bool,
}

type Error = Box<dyn std::error::Error + Send + Sync>;

/// Event handler for Discord events
async fn event_handler(
    _ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    _data: &Data,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!(
                "Bot is ready! Logged in as {} in {} guild(s)",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }
        FullEvent::GuildCreate { guild, is_new } => {
            if is_new.unwrap_or(false) {
                info!(guild_id = %guild.id, "Joined guild: {}", guild.name);
            }
        }
        FullEvent::GuildDelete { incomplete, full: _ } => {
            // Settings survive removal so a re-invite picks them back up
            info!(guild_id = %incomplete.id, "Left guild");
        }
        _ => {}
    }
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(command = %ctx.command().qualified_name, "Command error: {}", error);
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("❌ Something went wrong. Please try again later.")
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::MissingUserPermissions { ctx, .. } => {
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content(format!("❌ {}", VerifyError::PermissionDenied.user_message()))
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("❌ This command only works inside a server.")
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::Setup { error, .. } => {
            error!("Setup error: {}", error);
        }
        err => {
            warn!("Framework error: {}", err);
        }
    }
}

/// Create and configure the Discord bot framework
pub fn create_framework(
    config: &AppConfig,
    engine: Arc<VerificationEngine>,
    store: Arc<ConfigStore>,
) -> poise::Framework<Data, Error> {
    let cleanup_on_success = config.verification.cleanup_on_success;

    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all_commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.discord.prefix.clone()),
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} slash commands globally", framework.options().commands.len());
                Ok(Data {
                    engine,
                    store,
                    cleanup_on_success,
                })
            })
        })
        .build()
}

/// Connect to the gateway and run until the client stops.
pub async fn start_bot(
    config: &AppConfig,
    engine: Arc<VerificationEngine>,
    store: Arc<ConfigStore>,
) -> Result<(), Error> {
    let token = config.discord.token.trim();
    if token.is_empty() {
        return Err("Discord token is empty".into());
    }

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let framework = create_framework(config, engine, store);

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord bot...");
    client.start().await?;

    Ok(())
}
