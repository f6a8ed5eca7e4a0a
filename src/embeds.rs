use serenity::builder::CreateEmbed;
use serenity::model::Timestamp;
use serenity::utils::Colour;

use crate::models::{Music, QueuePosition};
use crate::pagination::QueueView;

pub fn format_seconds(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn random_colour() -> Colour {
    Colour::new(rand::random::<u32>() & 0xFF_FFFF)
}

pub fn now_playing<'a>(embed: &'a mut CreateEmbed, music: &Music) -> &'a mut CreateEmbed {
    embed
        .colour(random_colour())
        .title("Now Playing:")
        .description(format!("[{}]({})", music.title, music.url))
        .field("Duration:", format_seconds(music.duration), true)
        .field("Requested By:", &music.requester.tag, true)
        .timestamp(Timestamp::now());

    if let Some(thumbnail) = &music.thumbnail {
        embed.thumbnail(thumbnail);
    }

    embed
}

/// Returns `None` for an item that went straight to playing.
pub fn position_label(position: &QueuePosition) -> Option<String> {
    match position {
        QueuePosition::Current => None,
        QueuePosition::UpNext => Some("Up Next".to_string()),
        QueuePosition::At(position) => Some(position.to_string()),
    }
}

pub fn added_to_queue<'a>(embed: &'a mut CreateEmbed, music: &Music, position: &str) -> &'a mut CreateEmbed {
    embed
        .colour(random_colour())
        .title("Added Video to Queue")
        .description(format!("```{}```", music.title))
        .field("Position:", position, true)
        .field("Requested By:", &music.requester.tag, true)
        .timestamp(Timestamp::now());

    if let Some(thumbnail) = &music.thumbnail {
        embed.thumbnail(thumbnail);
    }

    embed
}

pub fn queue_view<'a>(embed: &'a mut CreateEmbed, view: &QueueView) -> &'a mut CreateEmbed {
    embed
        .colour(random_colour())
        .title(&view.title)
        .description(&view.description)
        .footer(|footer| footer.text(&view.footer))
        .timestamp(Timestamp::now());

    if let Some(thumbnail) = &view.thumbnail {
        embed.thumbnail(thumbnail);
    }

    embed
}
