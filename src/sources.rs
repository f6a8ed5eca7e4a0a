use std::process::{Command as StdCommand, Stdio};
use std::time::Duration;

use serde::Deserialize;
use serenity::framework::standard::CommandError;
use songbird::input::{children_to_reader, Codec, Container, Input, Metadata};
use tokio::process::Command;
use tracing::{info, warn};

use crate::models::{Music, Requester};

const YOUTUBE_DL_COMMAND: &str = "yt-dlp";
const FFMPEG_COMMAND: &str = "ffmpeg";
const UNKNOWN_TRACK_TITLE: &str = "UNKNOWN TRACK";

/// Post-processing applied to every stream before it reaches the voice connection.
const AUDIO_FILTER: &str = "bass=g=10,dynaudnorm=f=200";

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    duration: Option<f64>,
}

impl YtDlpEntry {
    fn into_music(self, requester: &Requester) -> Option<Music> {
        let url = self.webpage_url.or(self.url).or(self.original_url)?;
        let thumbnail = self
            .thumbnail
            .or_else(|| self.thumbnails.into_iter().last().map(|thumbnail| thumbnail.url));

        Some(Music {
            title: self.title.unwrap_or_else(|| UNKNOWN_TRACK_TITLE.to_string()),
            url,
            thumbnail,
            duration: self.duration.map_or(0, |seconds| seconds.max(0.0) as u64),
            requester: requester.clone(),
            looping: false,
        })
    }
}

pub fn is_playlist(input: &str) -> bool {
    input.starts_with("http") && (input.contains("&list=") || input.contains("?list="))
}

async fn run_ytdlp(args: &[&str]) -> Result<String, CommandError> {
    let output = Command::new(YOUTUBE_DL_COMMAND)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::from(format!("yt-dlp failed: {}", error.trim())));
    }

    String::from_utf8(output.stdout).map_err(|_| CommandError::from("Error reading stdout"))
}

/// Parses yt-dlp's one-object-per-line JSON output, skipping lines it cannot read.
fn parse_entries(output: &str, requester: &Requester) -> Vec<Music> {
    let lines: Vec<&str> = output.lines().filter(|line| !line.trim().is_empty()).collect();

    let songs: Vec<Music> = lines
        .iter()
        .filter_map(|line| serde_json::from_str::<YtDlpEntry>(line).ok())
        .filter_map(|entry| entry.into_music(requester))
        .collect();

    if songs.len() < lines.len() {
        warn!("Some songs have been skipped due to errors during parsing");
    }

    songs
}

/// Resolves a URL, or searches for free text, to a single track.
pub async fn resolve_track(input: &str, requester: &Requester) -> Result<Music, CommandError> {
    let query = if input.starts_with("http") {
        input.to_string()
    } else {
        format!("ytsearch1:{input}")
    };

    let output = run_ytdlp(&["-j", "--no-playlist", "--no-warnings", &query]).await?;

    parse_entries(&output, requester)
        .into_iter()
        .next()
        .ok_or_else(|| CommandError::from(format!("Could not load song for input {input}")))
}

pub async fn resolve_playlist(url: &str, requester: &Requester) -> Result<Vec<Music>, CommandError> {
    info!("Getting songs from playlist {url}");

    let output = run_ytdlp(&["-j", "--flat-playlist", "--no-warnings", url]).await?;
    let songs = parse_entries(&output, requester);

    if songs.is_empty() {
        return Err(CommandError::from(format!("No songs found in playlist {url}")));
    }

    Ok(songs)
}

/// Picks the first direct media URL out of `yt-dlp -g` output.
fn first_stream_url(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("http"))
        .map(str::to_string)
}

/// Asks yt-dlp for a direct audio URL, so taken-down or blocked videos fail here.
pub async fn resolve_stream_url(music: &Music) -> Result<String, CommandError> {
    let output = run_ytdlp(&["-f", "bestaudio", "-g", "--no-playlist", "--no-warnings", &music.url]).await?;

    first_stream_url(&output)
        .ok_or_else(|| CommandError::from(format!("No audio stream found for {}", music.url)))
}

/// Spawns ffmpeg on a resolved stream URL and hands songbird raw stereo f32 PCM.
pub fn open_stream(music: &Music, stream_url: &str) -> Result<Input, CommandError> {
    let ffmpeg = StdCommand::new(FFMPEG_COMMAND)
        .args(["-reconnect", "1", "-reconnect_streamed", "1", "-reconnect_delay_max", "5"])
        .args(["-i", stream_url, "-af", AUDIO_FILTER])
        .args(["-f", "s16le", "-ac", "2", "-ar", "48000", "-acodec", "pcm_f32le", "-"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()?;

    let metadata = Metadata {
        title: Some(music.title.clone()),
        source_url: Some(music.url.clone()),
        thumbnail: music.thumbnail.clone(),
        duration: Some(Duration::from_secs(music.duration)),
        channels: Some(2),
        sample_rate: Some(48000),
        ..Default::default()
    };

    Ok(Input::new(
        true,
        children_to_reader::<f32>(vec![ffmpeg]),
        Codec::FloatPcm,
        Container::Raw,
        Some(metadata),
    ))
}

#[cfg(test)]
mod tests {
    use serenity::model::id::UserId;

    use super::*;

    fn requester() -> Requester {
        Requester {
            id: UserId(42),
            tag: "dj#0042".to_string(),
        }
    }

    #[test]
    fn stream_url_skips_non_url_lines() {
        let output = "WARNING: falling back to generic extractor\nhttps://rr1.googlevideo.com/videoplayback?id=abc\nhttps://second.example/\n";

        assert_eq!(
            first_stream_url(output).as_deref(),
            Some("https://rr1.googlevideo.com/videoplayback?id=abc")
        );
        assert_eq!(first_stream_url(""), None);
        assert_eq!(first_stream_url("ERROR: Video unavailable\n"), None);
    }

    #[test]
    fn playlist_urls_are_detected() {
        assert!(is_playlist("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist("https://www.youtube.com/watch?v=abc&list=PL123"));
        assert!(!is_playlist("https://www.youtube.com/watch?v=abc"));
        assert!(!is_playlist("some song ?list=x"));
    }

    #[test]
    fn single_entry_prefers_webpage_url() {
        let output = r#"{"title":"Song","url":"https://cdn.example/audio","webpage_url":"https://www.youtube.com/watch?v=abc","thumbnail":"https://i.ytimg.com/vi/abc/hq.jpg","duration":215.6}"#;

        let songs = parse_entries(output, &requester());

        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Song");
        assert_eq!(songs[0].url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(songs[0].thumbnail.as_deref(), Some("https://i.ytimg.com/vi/abc/hq.jpg"));
        assert_eq!(songs[0].duration, 215);
        assert_eq!(songs[0].requester, requester());
        assert!(!songs[0].looping);
    }

    #[test]
    fn flat_playlist_lines_are_parsed_and_bad_lines_skipped() {
        let output = concat!(
            r#"{"_type":"url","url":"https://www.youtube.com/watch?v=one","title":"One","thumbnails":[{"url":"small.jpg"},{"url":"large.jpg"}],"duration":60}"#,
            "\n",
            "not json\n",
            r#"{"_type":"url","url":"https://www.youtube.com/watch?v=two","duration":null}"#,
            "\n",
            r#"{"title":"No url"}"#,
            "\n",
        );

        let songs = parse_entries(output, &requester());

        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].thumbnail.as_deref(), Some("large.jpg"));
        assert_eq!(songs[1].title, UNKNOWN_TRACK_TITLE);
        assert_eq!(songs[1].duration, 0);
        assert_eq!(songs[1].thumbnail, None);
    }
}
