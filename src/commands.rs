use serenity::client::Context;
use serenity::collector::ReactionAction;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::{Args, CommandError, CommandResult};
use serenity::futures::StreamExt;
use serenity::model::channel::{Message, ReactionType};
use serenity::model::id::GuildId;
use tracing::{info, warn};

use crate::embeds;
use crate::models::{Music, QueuePosition, Requester};
use crate::pagination::{
    open_view, queue_pages, render, worth_resolving, NavigationInput, PageCursor, NAVIGATION_WINDOW, NEXT, PREVIOUS,
};
use crate::player;
use crate::sources;
use crate::state::{read_queue, write_queue};
use crate::utils::{author_voice_channel, check_msg, get_guild_id};

#[group]
#[commands(play, queue, loop_queue, loop_song, volume, stop, help)]
struct General;

#[command]
#[aliases(p)]
#[only_in(guilds)]
async fn play(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let loading_emoji = ReactionType::Unicode("⏳".to_string());

    msg.react(&ctx.http, loading_emoji.clone()).await?;

    let enqueue_result = enqueue(ctx, msg, args).await;

    let bot_id = ctx.cache.current_user_id();
    msg.channel_id
        .delete_reaction(&ctx.http, msg.id, Some(bot_id), loading_emoji)
        .await?;

    let answer_emoji = match &enqueue_result {
        Ok(_) => "👍",
        Err(_) => "💀",
    };

    msg.react(&ctx.http, ReactionType::Unicode(answer_emoji.to_string())).await?;

    enqueue_result
}

async fn enqueue(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;

    let voice_channel = match author_voice_channel(ctx, msg)? {
        Some(channel) => channel,
        None => {
            check_msg(msg.reply(ctx, "Not in a voice channel").await);

            return Err(CommandError::from("Not in a voice channel"));
        }
    };

    let user_input = args.message().trim();

    if user_input.is_empty() {
        check_msg(msg.reply(ctx, "Give me a URL or a title to play").await);

        return Err(CommandError::from("Missing song input"));
    }

    info!("User input is {user_input}");

    let requester = Requester {
        id: msg.author.id,
        tag: msg.author.tag(),
    };

    let playlist = sources::is_playlist(user_input);
    let songs: Vec<Music> = if playlist {
        info!("Detected playlist in {user_input}");
        sources::resolve_playlist(user_input, &requester).await?
    } else {
        vec![sources::resolve_track(user_input, &requester).await?]
    };

    let added = songs.len();
    let single = if playlist { None } else { songs.first().cloned() };

    let (position, bound_channel, needs_connection) = write_queue(ctx, guild_id, |queue| {
        queue.bind_channels(msg.channel_id, voice_channel);

        let mut position = QueuePosition::Current;
        for music in songs {
            position = queue.enqueue(music);
        }

        (position, queue.voice_channel, queue.claim_connection())
    })
    .await?;

    match (single, embeds::position_label(&position)) {
        (Some(music), Some(label)) => check_msg(
            msg.channel_id
                .send_message(&ctx.http, |m| m.embed(|e| embeds::added_to_queue(e, &music, &label)))
                .await,
        ),
        (None, _) => check_msg(
            msg.channel_id
                .say(&ctx.http, format!("Added **{added}** songs to the queue"))
                .await,
        ),
        _ => {}
    }

    if needs_connection {
        let connect_to = bound_channel.unwrap_or(voice_channel);
        let connected = player::connect(ctx, guild_id, connect_to).await;
        let call = connected.as_ref().ok().cloned();

        write_queue(ctx, guild_id, |queue| queue.finish_connecting(call)).await?;
        connected?;

        player::play_music(ctx, guild_id).await;
    }

    Ok(())
}

#[command]
#[aliases(q, list)]
#[only_in(guilds)]
async fn queue(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;
    let author_channel = author_voice_channel(ctx, msg)?;
    let requester_tag = msg.author.tag();

    let opened = read_queue(ctx, guild_id, |queue| open_view(queue, author_channel, &requester_tag))
        .await
        .flatten();

    let (view, controls) = match opened {
        Some(opened) => opened,
        None => return Ok(()),
    };

    let mut message = msg
        .channel_id
        .send_message(&ctx.http, |m| m.embed(|e| embeds::queue_view(e, &view)))
        .await?;

    if !controls {
        return Ok(());
    }

    navigate_queue(ctx, &mut message, guild_id, &requester_tag).await
}

/// Lets humans flip through the queue with reactions until the window closes.
async fn navigate_queue(ctx: &Context, message: &mut Message, guild_id: GuildId, requester_tag: &str) -> CommandResult {
    message.react(&ctx.http, ReactionType::Unicode(PREVIOUS.to_string())).await?;
    message.react(&ctx.http, ReactionType::Unicode(NEXT.to_string())).await?;

    let bot_id = ctx.cache.current_user_id();
    let mut cursor = PageCursor::default();

    let mut collector = message
        .await_reactions(ctx)
        .timeout(NAVIGATION_WINDOW)
        .added(true)
        .removed(false)
        .build();

    while let Some(action) = collector.next().await {
        let reaction = match action.as_ref() {
            ReactionAction::Added(reaction) => reaction.clone(),
            ReactionAction::Removed(_) => continue,
        };

        let emoji = match &reaction.emoji {
            ReactionType::Unicode(emoji) => emoji.as_str(),
            _ => continue,
        };

        if !worth_resolving(emoji, reaction.user_id, bot_id) {
            continue;
        }

        let user = match reaction.user(ctx).await {
            Ok(user) => user,
            Err(why) => {
                warn!("Could not resolve reacting user: {why:?}");
                continue;
            }
        };

        let input = NavigationInput {
            emoji,
            from_bot: user.bot,
            from_self: user.id == bot_id,
        };

        let navigation = match input.navigation() {
            Some(navigation) => navigation,
            None => continue,
        };

        let rendered = read_queue(ctx, guild_id, |queue| {
            let pages = queue_pages(queue);
            let page = cursor.navigate(navigation, pages.len());

            render(queue, &pages, page, requester_tag)
        })
        .await
        .flatten();

        if let Some(view) = rendered {
            if let Err(why) = message.edit(ctx, |m| m.embed(|e| embeds::queue_view(e, &view))).await {
                warn!("Could not update queue page: {why:?}");
            }
        }

        if let Err(why) = reaction.delete(ctx).await {
            warn!("Could not remove navigation reaction: {why:?}");
        }
    }

    if let Err(why) = message.delete_reactions(ctx).await {
        warn!("Could not clear navigation reactions: {why:?}");
    }

    Ok(())
}

#[command("loop")]
#[only_in(guilds)]
async fn loop_queue(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;

    let looping = write_queue(ctx, guild_id, |queue| {
        queue.looping = !queue.looping;
        queue.looping
    })
    .await?;

    let emoji = if looping { "🔁" } else { "➡️" };
    check_msg(
        msg.channel_id
            .say(&ctx.http, format!("{emoji} Looping queue: **{looping}**"))
            .await,
    );

    Ok(())
}

#[command("loopsong")]
#[only_in(guilds)]
async fn loop_song(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;

    let toggled = write_queue(ctx, guild_id, |queue| {
        queue.current.as_mut().map(|music| {
            music.looping = !music.looping;
            (music.title.clone(), music.looping)
        })
    })
    .await?;

    let reply = match toggled {
        Some((title, true)) => format!("🔂 Looping **{title}**"),
        Some((title, false)) => format!("➡️ Stopped looping **{title}**"),
        None => "o_O Nothing is playing".to_string(),
    };

    check_msg(msg.channel_id.say(&ctx.http, reply).await);

    Ok(())
}

#[command]
#[aliases(vol)]
#[only_in(guilds)]
async fn volume(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;

    if args.is_empty() {
        let volume = read_queue(ctx, guild_id, |queue| queue.volume)
            .await
            .unwrap_or(crate::models::DEFAULT_VOLUME);
        check_msg(msg.channel_id.say(&ctx.http, format!("🔊 Volume: **{volume}**")).await);

        return Ok(());
    }

    let level = match args.single::<u8>() {
        Ok(level) if level <= 100 => level,
        _ => {
            check_msg(msg.channel_id.say(&ctx.http, "Volume must be between 0 and 100.").await);

            return Ok(());
        }
    };

    let applied = write_queue(ctx, guild_id, |queue| {
        queue.volume = level;
        queue
            .track_handle
            .as_ref()
            .map(|track_handle| track_handle.set_volume(player::gain(level)))
    })
    .await?;

    if let Some(Err(why)) = applied {
        warn!("Could not apply volume to live track: {why:?}");
    }

    check_msg(msg.channel_id.say(&ctx.http, format!("🔊 Volume: **{level}**")).await);

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn stop(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;

    player::release(ctx, guild_id).await?;

    let manager = songbird::get(ctx)
        .await
        .ok_or(CommandError::from("Songbird Voice client placed in at initialisation."))?;

    if manager.get(guild_id).is_some() {
        if let Err(e) = manager.remove(guild_id).await {
            check_msg(msg.channel_id.say(&ctx.http, format!("Failed: {e:?}")).await);
        }

        check_msg(msg.channel_id.say(&ctx.http, "Left voice channel").await);
    } else {
        check_msg(msg.reply(ctx, "Not in a voice channel").await);
    }

    Ok(())
}

#[command]
async fn help(ctx: &Context, msg: &Message) -> CommandResult {
    let message = r#"
**Commands:**
    **play [URL|Title]** - Plays (or adds to the queue) new tracks given a URL or a video title (supports youtube playlists).
    **queue** - Shows the upcoming tracks, five per page. React with ⏪/⏩ to flip pages.
    **loop** - Toggles looping of the whole queue.
    **loopsong** - Toggles looping of the current track.
    **volume [0-100]** - Shows or sets the playback volume.
    **stop** - Stops the current track, clears the queue and leaves the channel.
    "#;

    check_msg(msg.channel_id.say(&ctx.http, message).await);

    Ok(())
}
