use dotenvy::dotenv;
use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    framework::{
        standard::{macros::hook, CommandResult},
        StandardFramework,
    },
    model::{channel::Message, gateway::Ready, prelude::VoiceState},
    prelude::GatewayIntents,
};
use songbird::SerenityInit;
use tracing::{error, info, warn};

use crate::commands::GENERAL_GROUP;
use crate::config::Config;
use crate::models::{QueueRegistry, QueuesManager};

mod commands;
mod config;
mod embeds;
mod models;
mod pagination;
mod player;
mod sources;
mod state;
mod utils;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn voice_state_update(&self, ctx: Context, _: Option<VoiceState>, new: VoiceState) {
        if new.channel_id.is_some() || new.user_id != ctx.cache.current_user_id() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("Bot was disconnected from voice in guild {}", guild_id.0);

            if let Err(error) = player::release(&ctx, guild_id).await {
                warn!("{:#?}", error)
            }
        }
    }
}

#[hook]
async fn after(_ctx: &Context, msg: &Message, command_name: &str, command_result: CommandResult) {
    if let Err(why) = command_result {
        warn!("Command '{command_name}' from {} returned error {why:?}", msg.author.tag());
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(why) => {
            error!("{why}");
            return;
        }
    };

    let framework = StandardFramework::new()
        .configure(|c| c.prefix(&config.prefix))
        .after(after)
        .group(&GENERAL_GROUP);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler)
        .framework(framework)
        .register_songbird()
        .type_map_insert::<QueuesManager>(QueueRegistry::default())
        .await
        .expect("Err creating client");

    tokio::spawn(async move {
        let _ = client.start().await.map_err(|why| error!("Client ended: {why:?}"));
    });

    tokio::signal::ctrl_c().await.expect("Control-C interruption failed!");

    info!("Received Ctrl-C, shutting down.");
}
