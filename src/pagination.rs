use std::time::Duration;

use serenity::model::id::{ChannelId, UserId};

use crate::models::{Music, Queue};

pub const ITEMS_PER_PAGE: usize = 5;
pub const NAVIGATION_WINDOW: Duration = Duration::from_secs(60);
pub const NEXT: &str = "⏩";
pub const PREVIOUS: &str = "⏪";

pub fn paginate<T: Clone>(items: impl IntoIterator<Item = T>, per_page: usize) -> Vec<Vec<T>> {
    let items: Vec<T> = items.into_iter().collect();

    items.chunks(per_page).map(|chunk| chunk.to_vec()).collect()
}

pub fn queue_pages(queue: &Queue) -> Vec<Vec<Music>> {
    paginate(queue.upcoming.iter().cloned(), ITEMS_PER_PAGE)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
}

impl Navigation {
    pub fn from_emoji(emoji: &str) -> Option<Self> {
        match emoji {
            NEXT => Some(Navigation::Next),
            PREVIOUS => Some(Navigation::Previous),
            _ => None,
        }
    }
}

/// A reaction as seen by the queue view.
pub struct NavigationInput<'a> {
    pub emoji: &'a str,
    pub from_bot: bool,
    pub from_self: bool,
}

impl NavigationInput<'_> {
    /// Only humans pressing one of the two controls count.
    pub fn navigation(&self) -> Option<Navigation> {
        if self.from_bot || self.from_self {
            return None;
        }

        Navigation::from_emoji(self.emoji)
    }
}

/// Whether a reaction could be a control press at all, before looking up who made it.
pub fn worth_resolving(emoji: &str, reactor: Option<UserId>, bot_id: UserId) -> bool {
    reactor != Some(bot_id) && Navigation::from_emoji(emoji).is_some()
}

/// 1-indexed page position of an open queue view.
#[derive(Debug, PartialEq, Eq)]
pub struct PageCursor {
    page: usize,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self { page: 1 }
    }
}

impl PageCursor {
    /// Moves against the freshly derived page count, wrapping at both ends.
    pub fn navigate(&mut self, navigation: Navigation, total_pages: usize) -> usize {
        if total_pages <= 1 {
            self.page = 1;
            return self.page;
        }

        self.page = match navigation {
            Navigation::Next if self.page >= total_pages => 1,
            Navigation::Next => self.page + 1,
            Navigation::Previous if self.page <= 1 => total_pages,
            Navigation::Previous => (self.page - 1).min(total_pages),
        };

        self.page
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct QueueView {
    pub title: String,
    pub description: String,
    pub footer: String,
    pub thumbnail: Option<String>,
}

fn capitalized(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

/// Builds the embed contents for `page`, or nothing when no item is current.
pub fn render(queue: &Queue, pages: &[Vec<Music>], page: usize, requester_tag: &str) -> Option<QueueView> {
    let current = queue.current.as_ref()?;
    let page = page.clamp(1, pages.len().max(1));

    let title = match queue.upcoming.len() {
        0 => "Currently Playing".to_string(),
        count => format!("Upcoming - Next {count}"),
    };

    let mut description = vec![format!("Looping queue: {}", capitalized(queue.looping))];

    if let Some(items) = pages.get(page - 1) {
        let offset = (page - 1) * ITEMS_PER_PAGE;
        let lines: Vec<String> = items
            .iter()
            .enumerate()
            .map(|(index, music)| format!("**[{}]:** [{}]({})", offset + index + 1, music.title, music.url))
            .collect();

        description.push(lines.join("\n"));
    }

    description.push(format!("🎵 **Currently Playing:** [{}]({})", current.title, current.url));

    Some(QueueView {
        title,
        description: description.join("\n\n"),
        footer: format!("Page {page} of {} | Requested by {requester_tag}", pages.len().max(1)),
        thumbnail: current.thumbnail.clone(),
    })
}

/// First page of a queue view plus whether it needs navigation controls.
///
/// Declines when nothing is current or the author is not in the queue's voice channel.
pub fn open_view(queue: &Queue, author_channel: Option<ChannelId>, requester_tag: &str) -> Option<(QueueView, bool)> {
    if author_channel.is_none() || author_channel != queue.voice_channel {
        return None;
    }

    let pages = queue_pages(queue);

    render(queue, &pages, 1, requester_tag).map(|view| (view, pages.len() > 1))
}
