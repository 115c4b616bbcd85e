//! Download orchestration and metadata lookup on top of the yt-dlp engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{extract_printed_path, run_yt_dlp};
use crate::error::{FetchError, FetchResult};
use crate::format::{MediaKind, selector_args};

/// Extensions tried, in order, when the engine-reported name does not exist
/// on disk. Post-processing and container fixups rewrite extensions after the
/// name is reported.
const FALLBACK_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "webm", "m4a", "mp3"];

#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
}

#[derive(Debug, Deserialize)]
struct RawMediaInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
}

/// Metadata-only engine call: no file is written.
pub async fn fetch_media_info(url: &str) -> FetchResult<MediaInfo> {
    let output = run_yt_dlp(vec![
        "-J".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ])
    .await?;

    let raw: RawMediaInfo = serde_json::from_slice(&output.stdout)
        .map_err(|error| FetchError::Extraction(format!("unreadable metadata: {error}")))?;

    Ok(MediaInfo {
        title: raw
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| "Unknown Title".to_string()),
        thumbnail: raw.thumbnail.unwrap_or_default(),
        duration: format_duration(raw.duration.unwrap_or(0.0).max(0.0) as u64),
    })
}

fn format_duration(total_seconds: u64) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Runs the engine with the resolved format selection and returns the path of
/// the file it wrote. Names are keyed by the source title under a fixed
/// directory, so a second download of the same title overwrites the first.
pub async fn download_media(
    download_dir: &Path,
    url: &str,
    kind: MediaKind,
    quality: &str,
    have_ffmpeg: bool,
) -> FetchResult<PathBuf> {
    let output_template = format!("{}/%(title)s.%(ext)s", download_dir.to_string_lossy());

    let mut args = vec![
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
        "-o".to_string(),
        output_template,
    ];
    args.extend(selector_args(kind, quality, have_ffmpeg));
    args.push(url.to_string());

    let output = run_yt_dlp(args).await?;
    let reported = extract_printed_path(&output.stdout).ok_or(FetchError::FileResolution)?;

    let path = resolve_output_file(PathBuf::from(reported), kind, have_ffmpeg).await?;
    info!("downloaded {} as {}", url, path.display());
    Ok(path)
}

/// Locates the file the engine actually wrote. Audio extraction always lands
/// on `.mp3`, so that sibling is checked before the literal reported name;
/// after that the fallback extensions are tried in their fixed order.
async fn resolve_output_file(
    reported: PathBuf,
    kind: MediaKind,
    have_ffmpeg: bool,
) -> FetchResult<PathBuf> {
    if kind == MediaKind::Audio && have_ffmpeg {
        let mp3 = reported.with_extension("mp3");
        if file_exists(&mp3).await {
            return Ok(mp3);
        }
    }

    if file_exists(&reported).await {
        return Ok(reported);
    }

    for ext in FALLBACK_EXTENSIONS {
        let candidate = reported.with_extension(ext);
        if file_exists(&candidate).await {
            return Ok(candidate);
        }
    }

    Err(FetchError::FileResolution)
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"media").unwrap();
    }

    #[test]
    fn duration_is_rendered_minutes_and_padded_seconds() {
        assert_eq!(format_duration(185), "3:05");
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(3600), "60:00");
    }

    #[test]
    fn missing_metadata_fields_fall_back_to_defaults() {
        let raw: RawMediaInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(raw.title, None);
        assert_eq!(raw.duration, None);
        assert_eq!(format_duration(raw.duration.unwrap_or(0.0) as u64), "0:00");
    }

    #[tokio::test]
    async fn literal_reported_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("clip.webm");
        touch(&reported);
        touch(&dir.path().join("clip.mp4"));

        let resolved = resolve_output_file(reported.clone(), MediaKind::Video, true)
            .await
            .unwrap();
        assert_eq!(resolved, reported);
    }

    #[tokio::test]
    async fn fallback_extensions_are_checked_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("clip.flv");
        touch(&dir.path().join("clip.webm"));
        touch(&dir.path().join("clip.mkv"));

        let resolved = resolve_output_file(reported, MediaKind::Video, true)
            .await
            .unwrap();
        // mkv precedes webm in the fallback order
        assert_eq!(resolved, dir.path().join("clip.mkv"));
    }

    #[tokio::test]
    async fn transcoded_audio_prefers_the_mp3_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("song.m4a");
        touch(&reported);
        touch(&dir.path().join("song.mp3"));

        let resolved = resolve_output_file(reported, MediaKind::Audio, true)
            .await
            .unwrap();
        assert_eq!(resolved, dir.path().join("song.mp3"));
    }

    #[tokio::test]
    async fn untranscoded_audio_keeps_the_reported_container() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("song.m4a");
        touch(&reported);
        touch(&dir.path().join("song.mp3"));

        let resolved = resolve_output_file(reported.clone(), MediaKind::Audio, false)
            .await
            .unwrap();
        assert_eq!(resolved, reported);
    }

    #[tokio::test]
    async fn missing_output_is_a_file_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("ghost.mp4");

        let result = resolve_output_file(reported, MediaKind::Video, true).await;
        assert!(matches!(result, Err(FetchError::FileResolution)));
    }
}
