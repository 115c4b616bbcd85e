//! HTTP façade: the analyze/download endpoints and the embedded index page.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::AppContext;
use crate::error::{FetchError, FetchResult};
use crate::fetch::{download_media, fetch_media_info};
use crate::format::MediaKind;

static INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    mode: MediaKind,
    quality: String,
    url: String,
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/analyze", post(analyze))
        .route("/api/download", get(download))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn analyze(Json(payload): Json<AnalyzeRequest>) -> Response {
    let Some(url) = payload
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    else {
        return analyze_error("Missing url in request body");
    };

    match fetch_media_info(url).await {
        Ok(info) => Json(info).into_response(),
        Err(error) => {
            warn!("analyze failed for {url}: {error}");
            analyze_error(&error.to_string())
        }
    }
}

fn analyze_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

async fn download(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<DownloadParams>,
) -> Response {
    match prepare_download(&ctx, &params).await {
        Ok(response) => response,
        Err(error) => {
            warn!("download failed for {}: {error}", params.url);
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

async fn prepare_download(ctx: &AppContext, params: &DownloadParams) -> FetchResult<Response> {
    let _permit = ctx
        .download_permits
        .acquire()
        .await
        .map_err(|_| FetchError::Config("download capacity unavailable".to_string()))?;

    let path = download_media(
        &ctx.download_dir,
        &params.url,
        params.mode,
        &params.quality,
        ctx.have_ffmpeg,
    )
    .await?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("download.bin")
        .to_string();
    let metadata = tokio::fs::metadata(&path).await?;
    let file = tokio::fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_filename(&filename)),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(&filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((headers, body).into_response())
}

fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "opus" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());

    for character in value.chars() {
        if character.is_ascii_alphanumeric()
            || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
        {
            sanitized.push(character);
        } else {
            sanitized.push('_');
        }
    }

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(Arc::new(AppContext {
            download_dir: std::env::temp_dir(),
            have_ffmpeg: false,
            download_permits: Semaphore::new(1),
        }))
    }

    #[tokio::test]
    async fn analyze_without_url_is_rejected_before_the_engine_runs() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["error"],
            serde_json::json!("Missing url in request body")
        );
    }

    #[tokio::test]
    async fn blank_url_counts_as_missing() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"url": "   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn download_with_unknown_mode_is_a_client_error() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/download?mode=document&quality=720&url=https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn index_page_is_served() {
        let response = test_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn content_disposition_has_ascii_and_utf8_variants() {
        let header = build_content_disposition("Söng ñ title.mp3");
        assert!(header.starts_with("attachment; filename=\"S_ng _ title.mp3\""));
        assert!(header.contains("filename*=UTF-8''"));
    }

    #[test]
    fn content_types_match_extensions() {
        assert_eq!(content_type_for_filename("a.mp4"), "video/mp4");
        assert_eq!(content_type_for_filename("a.MP3"), "audio/mpeg");
        assert_eq!(content_type_for_filename("a"), "application/octet-stream");
    }
}
