//! Telegram façade: a menu-driven front-end over the same download
//! orchestration the web API uses. Downloads run on spawned tasks so the
//! update loop stays responsive.

pub mod session;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use teloxide::utils::command::BotCommands;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::AppContext;
use crate::error::{FetchError, FetchResult};
use crate::fetch::download_media;
use crate::format::MediaKind;
use session::{MenuAction, SessionMap, TextReply};

/// Bot API cap for files uploaded by bots.
const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Clone)]
struct BotContext {
    app: Arc<AppContext>,
    sessions: Arc<Mutex<SessionMap>>,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "show the welcome message")]
    Start,
}

/// Runs the dispatcher until shutdown.
pub async fn run(bot: Bot, app: Arc<AppContext>) {
    let ctx = BotContext {
        app,
        sessions: Arc::new(Mutex::new(SessionMap::new())),
    };

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(bot: Bot, msg: Message, _cmd: Command) -> ResponseResult<()> {
    bot.send_message(
        msg.chat.id,
        "👋 Send me a media link and I will fetch it as video or audio.",
    )
    .await?;
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, ctx: BotContext) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let reply = {
        let mut sessions = ctx.sessions.lock().await;
        session::accept_text(sessions.entry(msg.chat.id).or_default(), text)
    };

    match reply {
        TextReply::FormatMenu => {
            bot.send_message(msg.chat.id, "Choose format:")
                .reply_markup(format_keyboard())
                .await?;
        }
        TextReply::NotALink => {
            bot.send_message(
                msg.chat.id,
                "That does not look like a link. Send me a http(s) media URL.",
            )
            .await?;
        }
    }

    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, ctx: BotContext) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let Some(action) = session::parse_callback(data) else {
        return Ok(());
    };

    match action {
        MenuAction::QualityMenu(kind) => {
            {
                let mut sessions = ctx.sessions.lock().await;
                session::choose_format(sessions.entry(chat_id).or_default(), kind);
            }
            let (prompt, keyboard) = match kind {
                MediaKind::Video => ("Select video quality:", video_quality_keyboard()),
                MediaKind::Audio => ("Select audio quality:", audio_quality_keyboard()),
            };
            bot.edit_message_text(chat_id, message_id, prompt)
                .reply_markup(keyboard)
                .await?;
        }
        MenuAction::FormatMenu => {
            {
                let mut sessions = ctx.sessions.lock().await;
                session::back_to_format(sessions.entry(chat_id).or_default());
            }
            bot.edit_message_text(chat_id, message_id, "Choose format:")
                .reply_markup(format_keyboard())
                .await?;
        }
        MenuAction::Download { kind, quality } => {
            start_download(&bot, chat_id, message_id, &ctx, kind, quality).await?;
        }
    }

    Ok(())
}

async fn start_download(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    ctx: &BotContext,
    kind: MediaKind,
    quality: String,
) -> ResponseResult<()> {
    let url = {
        let mut sessions = ctx.sessions.lock().await;
        session::url_for_download(sessions.entry(chat_id).or_default())
    };

    let Some(url) = url else {
        bot.edit_message_text(
            chat_id,
            message_id,
            format!("❌ Error: {}", FetchError::SessionLost),
        )
        .await?;
        return Ok(());
    };

    if kind == MediaKind::Audio && !ctx.app.have_ffmpeg {
        bot.send_message(
            chat_id,
            "⚠️ ffmpeg is missing, so the audio will arrive in its source format instead of mp3.",
        )
        .await?;
    }

    let status = bot
        .edit_message_text(chat_id, message_id, format!("⏳ Downloading {kind}..."))
        .await?;

    let bot = bot.clone();
    let app = Arc::clone(&ctx.app);
    tokio::spawn(async move {
        if let Err(err) = deliver(&bot, chat_id, status.id, &app, &url, kind, &quality).await {
            error!("chat download failed for {url}: {err}");
            let _ = bot
                .send_message(chat_id, format!("❌ Error: {err}"))
                .await;
        }
    });

    Ok(())
}

/// Downloads the media and uploads it as an audio or video attachment,
/// keeping the progress message up to date.
async fn deliver(
    bot: &Bot,
    chat_id: ChatId,
    status_id: MessageId,
    app: &AppContext,
    url: &str,
    kind: MediaKind,
    quality: &str,
) -> FetchResult<()> {
    let _permit = app
        .download_permits
        .acquire()
        .await
        .map_err(|_| FetchError::Config("download capacity unavailable".to_string()))?;

    let path = download_media(&app.download_dir, url, kind, quality, app.have_ffmpeg).await?;

    let size = tokio::fs::metadata(&path).await?.len();
    if size > MAX_UPLOAD_BYTES {
        let size_mb = size as f64 / (1024.0 * 1024.0);
        bot.edit_message_text(
            chat_id,
            status_id,
            format!("⚠️ File too large for Telegram ({size_mb:.1} MB, limit 50 MB)."),
        )
        .await?;
        return Ok(());
    }

    bot.edit_message_text(chat_id, status_id, "📤 Uploading...")
        .await?;

    match kind {
        MediaKind::Audio => {
            bot.send_audio(chat_id, InputFile::file(&path)).await?;
        }
        MediaKind::Video => {
            bot.send_video(chat_id, InputFile::file(&path)).await?;
        }
    }

    bot.delete_message(chat_id, status_id).await?;
    info!("sent {} attachment to chat {chat_id}", kind);
    Ok(())
}

fn format_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🎬 Video", "v_menu"),
        InlineKeyboardButton::callback("🎵 Audio", "a_menu"),
    ]])
}

fn video_quality_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("360p", "dl|video|360"),
            InlineKeyboardButton::callback("720p", "dl|video|720"),
            InlineKeyboardButton::callback("1080p", "dl|video|1080"),
        ],
        vec![InlineKeyboardButton::callback("⬅️ Back", "back")],
    ])
}

fn audio_quality_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "Standard (128k)",
            "dl|audio|128",
        )],
        vec![InlineKeyboardButton::callback("High (320k)", "dl|audio|320")],
        vec![InlineKeyboardButton::callback("⬅️ Back", "back")],
    ])
}
