use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::TypeMapKey;
use songbird::tracks::TrackHandle;
use songbird::Call;
use tokio::sync::Mutex;

pub const DEFAULT_VOLUME: u8 = 100;

/// A track ending sooner than this never produced audio.
pub const MIN_PLAY_TIME: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub tag: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Music {
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
    /// Length in seconds, zero when the source did not report one.
    pub duration: u64,
    pub requester: Requester,
    pub looping: bool,
}

/// Where a freshly enqueued item ended up.
#[derive(Debug, PartialEq, Eq)]
pub enum QueuePosition {
    Current,
    UpNext,
    At(usize),
}

/// How the live track ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Failed,
}

impl Completion {
    pub fn from_play_time(play_time: Duration) -> Self {
        if play_time < MIN_PLAY_TIME {
            Completion::Failed
        } else {
            Completion::Finished
        }
    }
}

pub struct Queue {
    pub current: Option<Music>,
    pub upcoming: VecDeque<Music>,
    pub looping: bool,
    pub volume: u8,
    pub text_channel: Option<ChannelId>,
    pub voice_channel: Option<ChannelId>,
    pub connection: Option<Arc<Mutex<Call>>>,
    /// Set while one caller is joining voice for this queue.
    pub connecting: bool,
    pub track_handle: Option<TrackHandle>,
}

impl Default for Queue {
    fn default() -> Self {
        Self {
            current: None,
            upcoming: VecDeque::new(),
            looping: false,
            volume: DEFAULT_VOLUME,
            text_channel: None,
            voice_channel: None,
            connection: None,
            connecting: false,
            track_handle: None,
        }
    }
}

impl Queue {
    /// Appends `music` and promotes the front of `upcoming` when nothing is current.
    pub fn enqueue(&mut self, music: Music) -> QueuePosition {
        self.upcoming.push_back(music);

        if self.current.is_none() {
            self.current = self.upcoming.pop_front();
            return QueuePosition::Current;
        }

        match self.upcoming.len() - 1 {
            0 => QueuePosition::UpNext,
            index => QueuePosition::At(index + 1),
        }
    }

    pub fn bind_channels(&mut self, text_channel: ChannelId, voice_channel: ChannelId) {
        self.text_channel.get_or_insert(text_channel);
        self.voice_channel.get_or_insert(voice_channel);
    }

    /// Picks the next current item after the current one finished on its own.
    ///
    /// A self-looping item stays current. Otherwise the finished item goes to the
    /// back of `upcoming` when the whole queue loops, and the front is promoted.
    pub fn advance(&mut self) {
        let finished = match self.current.take() {
            Some(music) => music,
            None => return,
        };

        if finished.looping {
            self.current = Some(finished);
            return;
        }

        if self.looping {
            self.upcoming.push_back(finished);
        }

        self.current = self.upcoming.pop_front();
    }

    /// Drops the current item without honouring either loop flag.
    pub fn skip_failed(&mut self) -> Option<Music> {
        let failed = self.current.take();
        self.current = self.upcoming.pop_front();
        failed
    }

    /// Applies the end of the live track: failures are dropped, finished items advance.
    pub fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Finished => self.advance(),
            Completion::Failed => {
                self.skip_failed();
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Lets exactly one caller join voice; everyone else sees `false`.
    pub fn claim_connection(&mut self) -> bool {
        if self.connection.is_some() || self.connecting {
            return false;
        }

        self.connecting = true;
        true
    }

    /// Ends a claim, storing the call when the join worked.
    pub fn finish_connecting(&mut self, connection: Option<Arc<Mutex<Call>>>) {
        self.connecting = false;

        if connection.is_some() {
            self.connection = connection;
        }
    }
}

/// Maps every guild to its own queue.
#[derive(Default)]
pub struct QueueRegistry {
    queues: HashMap<GuildId, Queue>,
}

impl QueueRegistry {
    pub fn get(&self, guild_id: &GuildId) -> Option<&Queue> {
        self.queues.get(guild_id)
    }

    pub fn get_mut(&mut self, guild_id: &GuildId) -> Option<&mut Queue> {
        self.queues.get_mut(guild_id)
    }

    pub fn entry(&mut self, guild_id: GuildId) -> &mut Queue {
        self.queues.entry(guild_id).or_default()
    }

    /// Puts the guild back to an empty default queue, returning what was there.
    pub fn reset(&mut self, guild_id: GuildId) -> Option<Queue> {
        self.queues.insert(guild_id, Queue::default())
    }
}

pub struct QueuesManager;

impl TypeMapKey for QueuesManager {
    type Value = QueueRegistry;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn music(title: &str) -> Music {
        Music {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={title}"),
            thumbnail: Some(format!("https://i.ytimg.com/vi/{title}/hqdefault.jpg")),
            duration: 200,
            requester: Requester {
                id: UserId(7),
                tag: "listener#0001".to_string(),
            },
            looping: false,
        }
    }

    fn titles(queue: &Queue) -> Vec<&str> {
        queue.upcoming.iter().map(|music| music.title.as_str()).collect()
    }

    fn queue_with(current: Music, upcoming: &[&str]) -> Queue {
        Queue {
            current: Some(current),
            upcoming: upcoming.iter().map(|title| music(title)).collect(),
            ..Queue::default()
        }
    }

    #[test]
    fn self_loop_keeps_current_and_upcoming() {
        let mut a = music("A");
        a.looping = true;
        let mut queue = queue_with(a, &["B", "C"]);
        queue.looping = true;

        queue.advance();

        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("A"));
        assert_eq!(titles(&queue), vec!["B", "C"]);
    }

    #[test]
    fn queue_loop_requeues_finished_item() {
        let mut queue = queue_with(music("A"), &["B", "C"]);
        queue.looping = true;

        queue.advance();

        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("B"));
        assert_eq!(titles(&queue), vec!["C", "A"]);
    }

    #[test]
    fn plain_advance_discards_finished_item() {
        let mut queue = queue_with(music("A"), &["B", "C"]);

        queue.advance();

        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("B"));
        assert_eq!(titles(&queue), vec!["C"]);
    }

    #[test]
    fn last_item_finishing_leaves_queue_idle() {
        let mut queue = queue_with(music("A"), &[]);

        queue.advance();

        assert!(queue.is_idle());
        assert!(queue.upcoming.is_empty());
    }

    #[test]
    fn single_item_queue_loop_replays_itself() {
        let mut queue = queue_with(music("A"), &[]);
        queue.looping = true;

        queue.advance();

        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("A"));
        assert!(queue.upcoming.is_empty());
    }

    #[test]
    fn skip_failed_ignores_loop_flags() {
        let mut a = music("A");
        a.looping = true;
        let mut queue = queue_with(a, &["B"]);
        queue.looping = true;

        let failed = queue.skip_failed();

        assert_eq!(failed.map(|m| m.title), Some("A".to_string()));
        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("B"));
        assert!(queue.upcoming.is_empty());
    }

    #[test]
    fn failed_looping_item_does_not_stay_current() {
        let mut a = music("A");
        a.looping = true;
        let mut queue = queue_with(a, &["B"]);
        queue.looping = true;

        queue.complete(Completion::from_play_time(Duration::from_millis(40)));

        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("B"));
        assert!(queue.upcoming.is_empty());

        queue.complete(Completion::Failed);

        assert!(queue.is_idle());
    }

    #[test]
    fn finished_looping_item_replays() {
        let mut a = music("A");
        a.looping = true;
        let mut queue = queue_with(a, &["B"]);

        queue.complete(Completion::from_play_time(Duration::from_secs(180)));

        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("A"));
        assert_eq!(titles(&queue), vec!["B"]);
    }

    #[test]
    fn play_time_threshold_splits_outcomes() {
        assert_eq!(Completion::from_play_time(Duration::ZERO), Completion::Failed);
        assert_eq!(Completion::from_play_time(MIN_PLAY_TIME), Completion::Finished);
    }

    #[test]
    fn only_first_caller_claims_connection() {
        let mut queue = Queue::default();

        assert!(queue.claim_connection());
        assert!(!queue.claim_connection());

        queue.finish_connecting(None);

        assert!(!queue.connecting);
        assert!(queue.connection.is_none());
        assert!(queue.claim_connection());
    }

    #[test]
    fn draining_then_reset_matches_default() {
        let mut registry = QueueRegistry::default();
        let queue = registry.entry(GuildId(9));
        queue.enqueue(music("A"));
        queue.bind_channels(ChannelId(1), ChannelId(2));
        queue.volume = 40;

        queue.advance();
        assert!(queue.is_idle());
        registry.reset(GuildId(9));

        let reset = registry.get(&GuildId(9)).unwrap();
        let default = Queue::default();
        assert_eq!(reset.current, default.current);
        assert_eq!(reset.upcoming, default.upcoming);
        assert_eq!(reset.looping, default.looping);
        assert_eq!(reset.volume, default.volume);
        assert_eq!(reset.text_channel, default.text_channel);
        assert_eq!(reset.voice_channel, default.voice_channel);
        assert!(reset.connection.is_none());
        assert!(!reset.connecting);
        assert!(reset.track_handle.is_none());
    }

    #[test]
    fn enqueue_reports_positions() {
        let mut queue = Queue::default();

        assert_eq!(queue.enqueue(music("A")), QueuePosition::Current);
        assert_eq!(queue.enqueue(music("B")), QueuePosition::UpNext);
        assert_eq!(queue.enqueue(music("C")), QueuePosition::At(2));
        assert_eq!(queue.current.as_ref().map(|m| m.title.as_str()), Some("A"));
        assert_eq!(titles(&queue), vec!["B", "C"]);
    }

    #[test]
    fn channels_bind_only_once() {
        let mut queue = Queue::default();

        queue.bind_channels(ChannelId(1), ChannelId(2));
        queue.bind_channels(ChannelId(3), ChannelId(4));

        assert_eq!(queue.text_channel, Some(ChannelId(1)));
        assert_eq!(queue.voice_channel, Some(ChannelId(2)));
    }

    #[test]
    fn registry_isolates_guilds_and_resets() {
        let mut registry = QueueRegistry::default();

        registry.entry(GuildId(1)).enqueue(music("A"));
        registry.entry(GuildId(2)).enqueue(music("B"));
        registry.entry(GuildId(1)).volume = 30;

        let previous = registry.reset(GuildId(1));

        assert_eq!(previous.map(|queue| queue.volume), Some(30));
        let reset = registry.get(&GuildId(1)).unwrap();
        assert!(reset.is_idle());
        assert_eq!(reset.volume, DEFAULT_VOLUME);
        assert!(!registry.get(&GuildId(2)).unwrap().is_idle());
        assert!(registry.get(&GuildId(3)).is_none());
    }
}
