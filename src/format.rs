//! Format selection: maps the user's (kind, quality) choice onto yt-dlp
//! arguments, branching on whether ffmpeg is available.

use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            _ => Err(()),
        }
    }
}

/// Builds the yt-dlp selector arguments for one download.
///
/// `quality` is a max height in pixels for video and a bitrate in kbps for
/// audio. Without ffmpeg neither stream merging nor audio transcoding is
/// possible, so the degraded branches stick to pre-combined streams and the
/// source container; the result is still playable, just not the usual
/// extension.
pub fn selector_args(kind: MediaKind, quality: &str, have_ffmpeg: bool) -> Vec<String> {
    match (kind, have_ffmpeg) {
        (MediaKind::Audio, true) => [
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            quality,
        ]
        .iter()
        .map(ToString::to_string)
        .collect(),
        (MediaKind::Audio, false) => {
            vec!["-f".to_string(), "bestaudio/best".to_string()]
        }
        (MediaKind::Video, true) => vec![
            "-f".to_string(),
            format!("bestvideo[height<={quality}]+bestaudio/best[height<={quality}]/best"),
        ],
        (MediaKind::Video, false) => vec![
            "-f".to_string(),
            format!("best[height<={quality}]/best"),
        ],
    }
}
