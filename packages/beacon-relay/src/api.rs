//! HTTP surface.
//!
//! The signaling WebSocket plus a few read-only views over relay state:
//!
//! - `GET /` or `/ws`  WebSocket upgrade for signaling clients
//! - `GET /users`       Registered identities as a JSON array
//! - `GET /log`         Diagnostic journal as an HTML page, newest first
//! - `GET /dellog`      Delete the diagnostic journal
//! - `GET /health`      Liveness probe with user and connection counts

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::RelayState;

/// Build the full application router.
pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/users", get(users_handler))
        .route("/log", get(log_handler))
        .route("/dellog", get(delete_log_handler))
        .route("/health", get(health_handler))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// WebSocket upgrade handler for signaling clients.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handler::handle_websocket(socket, state))
}

/// GET /users
async fn users_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(state.registered_identities())
}

/// GET /log
async fn log_handler(State(state): State<RelayState>) -> Response {
    match state.journal.entries().await {
        Ok(entries) => Html(render_log_page(&entries)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read log file");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error reading log file").into_response()
        }
    }
}

/// GET /dellog
async fn delete_log_handler(State(state): State<RelayState>) -> Response {
    match state.journal.clear().await {
        Ok(()) => {
            tracing::info!(path = %state.journal.path().display(), "Log file deleted");
            Json(json!({ "message": "Deleted" })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Error deleting the log file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "beacon-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "online_users": state.online_count(),
        "connections": state.connection_count(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn render_log_page(entries: &[String]) -> String {
    let items: String = entries
        .iter()
        .map(|entry| format!("<li>{}</li>", escape_html(entry)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta http-equiv="refresh" content="60">
    <title>Server Logs</title>
    <style>
        body {{ font-family: Arial, sans-serif; }}
        ul {{ list-style-type: none; padding: 0; }}
        li {{ margin-bottom: 5px; }}
    </style>
</head>
<body>
    <h1>Server Logs</h1>
    <ul>{}</ul>
</body>
</html>
"#,
        items
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
