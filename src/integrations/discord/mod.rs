use poise::serenity_prelude as serenity;
use std::sync::Arc;

use crate::{core::db::ProjectDb, Directory};

mod commands;

/// Shared data accessible in all bot commands
pub struct Data {
    db: Arc<ProjectDb>,
    directory: Directory,
}

pub type Context<'a> = poise::Context<'a, Data, anyhow::Error>;

async fn handle_error(error: poise::FrameworkError<'_, Data, anyhow::Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!("Command {} failed: {}", ctx.command().name, error);
            let _ = ctx.say(format!("Error: {}", error)).await;
        }
        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                log::error!("Error while handling bot error: {}", e);
            }
        }
    }
}

/// Initialize the bot and run it until the gateway connection ends. Commands
/// are registered in the configured guild when one is set, globally otherwise.
pub async fn init_discord(
    token: String,
    guild_id: Option<u64>,
    db: Arc<ProjectDb>,
    directory: Directory,
) -> anyhow::Result<()> {
    log::info!("Initializing Discord bot");

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::standings(),
                commands::bracket(),
                commands::leagues(),
                commands::track(),
                commands::sync(),
            ],
            on_error: |error| Box::pin(handle_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                match guild_id {
                    Some(guild) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild),
                        )
                        .await?
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?
                    }
                }
                log::info!("Discord bot {} ready", ready.user.name);
                Ok(Data { db, directory })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await?;
    client.start().await?;
    Ok(())
}
