//! HTTP request handlers

use super::assets::{asset, asset_path, index_html};
use super::types::{ErrorResponse, HealthResponse};
use super::ws::handle_socket;
use super::AppState;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};

const VERSION: &str = concat!("mesas-bot ", env!("CARGO_PKG_VERSION"));

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat page
        .route("/", get(serve_index))
        // Static assets
        .route("/assets/*path", get(serve_static))
        // One chat session per socket
        .route("/ws", get(chat_socket))
        .route("/api/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn serve_index() -> Result<Html<String>, AppError> {
    index_html()
        .map(Html)
        .ok_or_else(|| AppError::Internal("chat page missing from build".to_string()))
}

async fn serve_static(uri: Uri) -> Result<Response, AppError> {
    let path = asset_path(&uri);
    asset(path).ok_or_else(|| AppError::NotFound(format!("No asset at /{path}")))
}

async fn chat_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.sessions))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        active_sessions: state.sessions.active_sessions().await,
    })
}

async fn get_version() -> &'static str {
    VERSION
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
