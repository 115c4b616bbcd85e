//! yt-dlp process invocation and the ffmpeg capability probe.

use std::io::ErrorKind;

use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::debug;

use crate::error::{FetchError, FetchResult};

const YT_DLP_TIMEOUT_SECONDS: u64 = 180;

/// Runs `ffmpeg -version` once at startup. The result is stored in the shared
/// context for the process lifetime and never re-probed; without ffmpeg the
/// service degrades to source-container downloads instead of failing.
pub async fn probe_ffmpeg() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub async fn run_yt_dlp(args: Vec<String>) -> FetchResult<std::process::Output> {
    debug!("running yt-dlp {args:?}");

    let command_future = Command::new("yt-dlp").args(args).output();
    let output = timeout(Duration::from_secs(YT_DLP_TIMEOUT_SECONDS), command_future)
        .await
        .map_err(|_| {
            FetchError::Extraction(format!(
                "yt-dlp did not finish within {YT_DLP_TIMEOUT_SECONDS} seconds"
            ))
        })?
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                FetchError::Extraction("yt-dlp is not installed on this system".to_string())
            } else {
                FetchError::Extraction(format!("could not run yt-dlp: {error}"))
            }
        })?;

    if !output.status.success() {
        return Err(FetchError::Extraction(run_error_message(&output.stderr)));
    }

    Ok(output)
}

/// The last non-empty stderr line, which is where yt-dlp puts the actual
/// error.
fn run_error_message(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("yt-dlp could not complete the operation")
        .to_string()
}

/// The path printed by `--print after_move:filepath` is the last non-empty
/// stdout line.
pub fn extract_printed_path(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printed_path_takes_last_non_empty_line() {
        let stdout = b"[download] Destination: downloads/clip.webm\n\ndownloads/clip.mp4\n";
        assert_eq!(
            extract_printed_path(stdout),
            Some("downloads/clip.mp4".to_string())
        );
    }

    #[test]
    fn printed_path_is_none_for_empty_output() {
        assert_eq!(extract_printed_path(b"  \n\n"), None);
    }

    #[test]
    fn error_message_uses_last_stderr_line() {
        let stderr = b"WARNING: something minor\nERROR: Unsupported URL: https://example.com\n";
        assert_eq!(
            run_error_message(stderr),
            "ERROR: Unsupported URL: https://example.com"
        );
    }

    #[test]
    fn error_message_has_fallback_for_empty_stderr() {
        assert_eq!(
            run_error_message(b""),
            "yt-dlp could not complete the operation"
        );
    }
}
