use std::sync::Arc;

use serenity::async_trait;
use serenity::client::Context;
use serenity::framework::standard::CommandError;
use serenity::model::id::{ChannelId, GuildId};
use songbird::tracks::PlayMode;
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn};
use tracing_futures::Instrument;

use crate::embeds;
use crate::models::{Completion, Music};
use crate::sources;
use crate::state::{read_queue, reset_queue, write_queue, write_registry};
use crate::utils::check_msg;

/// Exponent giving the stored 0-100 volume a perceptually even curve.
const LOGARITHMIC_EXPONENT: f32 = 1.660964;

const PLAYBACK_ENDED: &str = "🎵 Music playback has ended";

pub fn gain(volume: u8) -> f32 {
    (f32::from(volume.min(100)) / 100.0).powf(LOGARITHMIC_EXPONENT)
}

/// Joins `channel_id` and deafens the bot there.
pub async fn connect(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<Mutex<Call>>, CommandError> {
    let manager = songbird::get(ctx)
        .await
        .ok_or(CommandError::from("Songbird Voice client placed in at initialisation."))?;

    let (call, joined) = manager.join(guild_id, channel_id).await;
    joined?;

    {
        let mut handler = call.lock().await;

        if handler.is_deaf() {
            info!("Already deafened in guild {}", guild_id.0);
        } else if let Err(why) = handler.deafen(true).await {
            warn!("Deafen failed due to {why:?}");
        }
    }

    Ok(call)
}

/// Plays whatever is current for the guild, or winds playback down when nothing is.
///
/// Items whose stream cannot be started are dropped and the next one is tried.
pub async fn play_music(ctx: &Context, guild_id: GuildId) {
    loop {
        let snapshot = read_queue(ctx, guild_id, |queue| {
            (
                queue.current.clone(),
                queue.volume,
                queue.text_channel,
                queue.connection.clone(),
            )
        })
        .await;

        let (current, volume, text_channel, connection) = match snapshot {
            Some(snapshot) => snapshot,
            None => return,
        };

        let music = match current {
            Some(music) => music,
            None => {
                end_playback(ctx, guild_id, text_channel).await;
                return;
            }
        };

        match start_track(ctx, guild_id, &music, connection, volume).await {
            Ok(()) => {
                info!("PLAY_MUSIC - Now playing {} - {}", music.title, music.url);

                if let Some(channel) = text_channel {
                    check_msg(
                        channel
                            .send_message(&ctx.http, |m| m.embed(|e| embeds::now_playing(e, &music)))
                            .await,
                    );
                }

                return;
            }
            Err(why) => {
                error!("Could not start {} in guild {}: {why:?}", music.title, guild_id.0);

                if let Some(channel) = text_channel {
                    check_msg(
                        channel
                            .say(&ctx.http, format!("Could not play {}, skipping it", music.title))
                            .await,
                    );
                }

                if let Err(why) = write_queue(ctx, guild_id, |queue| queue.skip_failed()).await {
                    error!("Could not skip failed track: {why:?}");
                    return;
                }
            }
        }
    }
}

async fn start_track(
    ctx: &Context,
    guild_id: GuildId,
    music: &Music,
    connection: Option<Arc<Mutex<Call>>>,
    volume: u8,
) -> Result<(), CommandError> {
    let connection = connection.ok_or(CommandError::from("Not in a voice channel to play in"))?;
    let stream_url = sources::resolve_stream_url(music).await?;
    let source = sources::open_stream(music, &stream_url)?;

    let track_handle = {
        let mut call = connection.lock().await;
        call.stop();
        call.play_source(source)
    };

    track_handle.set_volume(gain(volume))?;
    track_handle.add_event(
        Event::Track(TrackEvent::End),
        TrackEndNotifier {
            guild_id,
            ctx: ctx.clone(),
        },
    )?;

    write_queue(ctx, guild_id, |queue| queue.track_handle = Some(track_handle)).await
}

async fn end_playback(ctx: &Context, guild_id: GuildId, text_channel: Option<ChannelId>) {
    info!("END_PLAYBACK - Queue in guild {} is empty", guild_id.0);

    if let Some(manager) = songbird::get(ctx).await {
        if manager.get(guild_id).is_some() {
            if let Err(why) = manager.remove(guild_id).await {
                error!("Could not leave voice channel: {why:?}");
            }
        }
    }

    if let Some(channel) = text_channel {
        check_msg(channel.say(&ctx.http, PLAYBACK_ENDED).await);
    }

    if let Err(why) = reset_queue(ctx, guild_id).await {
        error!("Could not reset queue: {why:?}");
    }
}

/// Applies how the live track ended and starts whatever is current next.
async fn complete(ctx: &Context, guild_id: GuildId, completion: Completion) {
    let outcome = write_registry(ctx, |registry| {
        registry.get_mut(&guild_id).map(|queue| {
            queue.track_handle = None;
            let ended = queue.current.as_ref().map(|music| music.title.clone());
            queue.complete(completion);

            (ended, queue.text_channel, queue.is_idle())
        })
    })
    .await;

    let (ended, text_channel, idle) = match outcome {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            info!("No queue left for guild {}", guild_id.0);
            return;
        }
        Err(why) => {
            error!("Could not advance queue: {why:?}");
            return;
        }
    };

    if completion == Completion::Failed {
        let title = ended.unwrap_or_default();
        error!("Stream for {title} in guild {} ended before playing", guild_id.0);

        if let Some(channel) = text_channel {
            check_msg(
                channel
                    .say(&ctx.http, format!("Could not play {title}, skipping it"))
                    .await,
            );
        }
    }

    if idle {
        info!("Nothing left to play in guild {}", guild_id.0);
    }

    play_music(ctx, guild_id).await;
}

/// Stops the live track and clears the guild's queue.
pub async fn release(ctx: &Context, guild_id: GuildId) -> Result<(), CommandError> {
    let previous = reset_queue(ctx, guild_id).await?;

    if let Some(track_handle) = previous.and_then(|queue| queue.track_handle) {
        track_handle.stop()?;
    }

    Ok(())
}

struct TrackEndNotifier {
    guild_id: GuildId,
    ctx: Context,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let completion = match ctx {
            EventContext::Track(tracks) => {
                let ended = tracks
                    .iter()
                    .find(|(state, _)| matches!(state.playing, PlayMode::End));

                match ended {
                    Some((state, _)) => Completion::from_play_time(state.play_time),
                    None => {
                        info!("Track in guild {} was stopped, not advancing", self.guild_id.0);
                        return None;
                    }
                }
            }
            _ => Completion::Finished,
        };

        complete(&self.ctx, self.guild_id, completion)
            .instrument(info_span!("advance", guild = self.guild_id.0))
            .await;

        None
    }
}
