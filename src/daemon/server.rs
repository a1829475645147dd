use crate::daemon::runtime::Daemon;
use crate::errors::DaemonError;
use crate::models::FileRecord;
use crate::pipeline::query::DEFAULT_RETURN_LENGTH;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Body of a successful `/ping`
pub const DAEMON_ID: &str = "filewarden";

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    query: Option<String>,
    return_length: Option<usize>,
}

pub fn router(daemon: Arc<Daemon>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/shutdown", post(shutdown_handler))
        .route("/refresh", post(refresh_handler))
        .route("/query", get(query_handler))
        .with_state(daemon)
}

/// Serve the control API until the daemon starts shutting down
pub async fn serve(listener: TcpListener, daemon: Arc<Daemon>) -> std::io::Result<()> {
    let mut phase = daemon.subscribe();
    axum::serve(listener, router(daemon))
        .with_graceful_shutdown(async move {
            let _ = phase.wait_for(|phase| phase.is_terminating()).await;
            info!("control server closing");
        })
        .await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn ping_handler() -> Json<&'static str> {
    Json(DAEMON_ID)
}

async fn shutdown_handler(State(daemon): State<Arc<Daemon>>) -> StatusCode {
    tokio::spawn(async move {
        daemon.shutdown().await;
    });
    StatusCode::ACCEPTED
}

async fn refresh_handler(State(daemon): State<Arc<Daemon>>) -> Response {
    match daemon.refresh().await {
        Ok(paths) => Json(paths).into_response(),
        Err(DaemonError::ShuttingDown) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "daemon is shutting down")
        }
        Err(e) => {
            error!("refresh failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn query_handler(
    State(daemon): State<Arc<Daemon>>,
    Query(params): Query<QueryParams>,
) -> Response {
    let text = match params.query.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "missing query"),
    };
    let return_length = params.return_length.unwrap_or(DEFAULT_RETURN_LENGTH);
    if return_length == 0 {
        return error_response(StatusCode::BAD_REQUEST, "return_length must be positive");
    }

    match daemon.query_pipeline().query(&text, return_length).await {
        Ok(files) => {
            let records: Vec<FileRecord> = files.into_iter().map(FileRecord::from).collect();
            Json(records).into_response()
        }
        Err(e) => {
            error!(query = %text, "query failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
