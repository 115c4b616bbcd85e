use std::{path::PathBuf, sync::Arc};

use teloxide::Bot;
use tokio::{net::TcpListener, sync::Semaphore};
use tracing::{info, warn};

mod bot;
mod engine;
mod error;
mod fetch;
mod format;
mod web;

use error::FetchError;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;

/// Immutable shared state, computed once during startup.
pub struct AppContext {
    pub download_dir: PathBuf,
    pub have_ffmpeg: bool,
    pub download_permits: Semaphore,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tubefetch=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), FetchError> {
    let token = std::env::var("TELOXIDE_TOKEN")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            FetchError::Config("TELOXIDE_TOKEN is not set; the bot cannot start".to_string())
        })?;

    let download_dir = std::env::var("DOWNLOAD_DIR")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR));
    tokio::fs::create_dir_all(&download_dir).await?;

    let have_ffmpeg = engine::probe_ffmpeg().await;
    if have_ffmpeg {
        info!("ffmpeg detected, transcoding enabled");
    } else {
        warn!("ffmpeg not found, downloads will keep their source container");
    }

    let max_concurrent = read_usize_env("MAX_CONCURRENT_DOWNLOADS")
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS);

    let ctx = Arc::new(AppContext {
        download_dir,
        have_ffmpeg,
        download_permits: Semaphore::new(max_concurrent),
    });

    let addr = format!("0.0.0.0:{}", read_port());
    let listener = TcpListener::bind(&addr).await?;
    info!("Web server listening on http://{addr}");

    let app = web::router(ctx.clone());
    let telegram = Bot::new(token);
    info!("Telegram bot polling for updates");

    let server = async move { axum::serve(listener, app).await };
    tokio::select! {
        result = server => result?,
        _ = bot::run(telegram, ctx) => {}
    }

    Ok(())
}

fn read_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

fn read_usize_env(name: &str) -> Option<usize> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
}
