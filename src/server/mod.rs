// SPDX-License-Identifier: GPL-3.0-only

//! HTTP API over the asset directory
//!
//! | Method    | Path                       | Response                          |
//! |-----------|----------------------------|-----------------------------------|
//! | `OPTIONS` | `/assets`, `/api/assets`   | 204                               |
//! | `POST`    | `/assets`, `/api/assets`   | `{ok:true, saved}` or error       |
//! | `GET`     | `/assets?max=N`, `/api/..` | `{ok:true, items}` or error       |
//!
//! Errors are `{ok:false, error}` with 400 for validation failures and 500
//! for store failures. Every response carries the CORS headers, including
//! errors and unmatched routes.

use crate::config::ServerConfig;
use crate::constants::server;
use crate::directory::{AssetDirectoryService, AssignmentInput, parse_max};
use crate::errors::DirectoryError;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shared handler state
#[derive(Clone, Debug)]
struct ApiState {
    directory: AssetDirectoryService,
}

/// Build the API router
pub fn router(directory: AssetDirectoryService) -> Router {
    Router::new()
        .route(
            "/assets",
            get(list_assets).post(save_asset).options(preflight),
        )
        .route(
            "/api/assets",
            get(list_assets).post(save_asset).options(preflight),
        )
        .fallback(not_found)
        .layer(axum::middleware::map_response(add_cors_headers))
        .with_state(ApiState { directory })
}

/// Serve the API until `shutdown` is cancelled
pub async fn serve(
    directory: AssetDirectoryService,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, "Asset API listening");

    axum::serve(listener, router(directory))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Asset API shutting down");
        })
        .await
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(server::CORS_ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(server::CORS_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(server::CORS_ALLOW_HEADERS),
    );
    response
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn save_asset(State(state): State<ApiState>, body: Bytes) -> Response {
    let input = match AssignmentInput::from_json(&body) {
        Ok(input) => input,
        Err(e) => return error_response(e.into()),
    };

    match state.directory.upsert(input).await {
        Ok(saved) => Json(json!({ "ok": true, "saved": saved })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_assets(State(state): State<ApiState>, RawQuery(query): RawQuery) -> Response {
    let max = parse_max(query_param(query.as_deref(), "max").as_deref());
    debug!(max, "Listing recent assets");

    match state.directory.list_recent(Some(max as i64)).await {
        Ok(items) => Json(json!({ "ok": true, "items": items })).into_response(),
        Err(e) => error_response(e),
    }
}

/// First value of `name` in a raw query string
///
/// Decoding is lossy so a malformed query never rejects the request.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_component(key) == name).then(|| decode_component(value))
    })
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

fn error_response(err: DirectoryError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match &err {
        DirectoryError::Infrastructure(e) => error!(error = %e, "Asset store failure"),
        DirectoryError::Validation(e) => debug!(error = %e, "Rejected request"),
    }
    (status, Json(json!({ "ok": false, "error": err.to_string() }))).into_response()
}
