//! Wiring: config in, running Discord client out

use std::sync::Arc;

use chorus_core::{
    Admin, ChorusConfig, CycleRunner, DebounceScheduler, LlmGenerator, PersonaStore, RosterStore,
    RunnerSettings, SchedulerState, load_roster, provider_from_config,
};
use serenity::Client;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use serenity::prelude::GatewayIntents;
use tracing::info;

use crate::channel::DiscordChannel;
use crate::error::{DiscordError, Result};
use crate::handler::ChorusHandler;

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
}

/// Build everything from `config` and run until the gateway closes or the
/// process gets Ctrl-C
pub async fn run_bot(config: ChorusConfig) -> Result<()> {
    config.validate()?;

    let personas = PersonaStore::new(&config.personas.dir);
    let roster_store = RosterStore::new(
        &config.personas.roster_file,
        config.personas.default_roster.clone(),
    );
    let roster = load_roster(&roster_store, &personas)?;
    let state = Arc::new(SchedulerState::new(roster));

    let provider = provider_from_config(&config.model)?;
    let generator = Arc::new(LlmGenerator::new(provider, config.personas.vips.clone()));

    let channel_id = ChannelId::new(config.discord.channel_id);
    let prefix = config.discord.command_prefix.clone();
    let http = Arc::new(Http::new(&config.discord.token));
    let channel = Arc::new(DiscordChannel::new(http, channel_id, prefix.clone()));

    let runner = Arc::new(CycleRunner::new(
        channel,
        generator,
        state.clone(),
        RunnerSettings::from(&config.scheduler),
    ));
    let scheduler = Arc::new(DebounceScheduler::new(runner, config.scheduler.debounce()));
    let admin = Arc::new(Admin::new(state, personas, roster_store));
    let handler = ChorusHandler::new(channel_id, prefix, admin, scheduler.clone());

    let mut client = Client::builder(&config.discord.token, intents())
        .event_handler(handler)
        .await
        .map_err(|cause| DiscordError::ClientBuildFailed { cause })?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting Discord bot...");
    let result = client.start().await;
    scheduler.shutdown().await;
    result.map_err(|cause| DiscordError::ConnectionFailed { cause })
}
