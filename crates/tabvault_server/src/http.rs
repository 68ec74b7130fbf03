//! HTTP and WebSocket transport.
//!
//! Routes:
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | POST | `/login?username=..&password=..` | none |
//! | GET, POST | `/csv` | bearer |
//! | PUT, DELETE | `/csv/:position` | bearer |
//! | POST | `/restore` | bearer |
//! | GET (upgrade) | `/stream/samples`, `/ws/random-numbers` | none |
//!
//! Store calls run on the blocking pool. Failures are `{"detail": ".."}`
//! bodies with the status from [`ServerError::status_code`]. Path, query
//! and body rejections are reported the same way, after the token check.
//!
//! CORS is fully open: any origin, method and request header.

use crate::error::{ServerError, ServerResult};
use crate::feed::SampleChannel;
use crate::gate::AccessGate;
use crate::stream::{serve_websocket, StreamSettings};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabvault_core::{BackupOutcome, MutationReport, Record};
use tower_http::cors::CorsLayer;
use tracing::warn;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Token-gated store.
    pub gate: AccessGate,
    /// Latest-sample slot.
    pub samples: Arc<SampleChannel>,
    /// Subscriber cadence and push timeout.
    pub stream: StreamSettings,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/csv", get(list_rows).post(append_row))
        .route("/csv/:position", put(update_row).delete(delete_row))
        .route("/restore", post(restore))
        .route("/stream/samples", get(stream_samples))
        .route("/ws/random-numbers", get(stream_samples))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    username: String,
    #[serde(default)]
    #[allow(dead_code)]
    password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Confirmation {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl Confirmation {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            warning: None,
        }
    }

    fn for_report(message: &str, report: &MutationReport) -> Self {
        let warning = match &report.backup {
            BackupOutcome::Failed(reason) => Some(format!("backup not refreshed: {reason}")),
            BackupOutcome::Taken | BackupOutcome::Skipped => None,
        };
        Self {
            message: message.to_string(),
            warning,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }

        let body = Json(ErrorBody {
            detail: self.detail(),
        });
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

async fn login(
    State(state): State<AppState>,
    params: Result<Query<LoginParams>, QueryRejection>,
) -> ServerResult<Json<TokenBody>> {
    let Query(params) = params.map_err(|e| ServerError::InvalidInput(e.body_text()))?;
    let tokens = Arc::clone(state.gate.tokens());
    let issued = blocking(move || tokens.issue(&params.username)).await?;
    Ok(Json(TokenBody {
        token: issued.token,
    }))
}

async fn list_rows(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<Vec<Record>>> {
    let token = bearer(&headers)?;
    let rows = blocking(move || state.gate.list(&token)).await?;
    Ok(Json(rows))
}

async fn append_row(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Record>, JsonRejection>,
) -> ServerResult<Json<Confirmation>> {
    let token = bearer(&headers)?;
    state.gate.authorize(&token)?;
    let Json(record) = body.map_err(|e| ServerError::InvalidInput(e.body_text()))?;

    let report = blocking(move || state.gate.append(&token, record)).await?;
    Ok(Json(Confirmation::for_report(
        "Row added successfully",
        &report,
    )))
}

async fn update_row(
    State(state): State<AppState>,
    headers: HeaderMap,
    position: Result<Path<i64>, PathRejection>,
    body: Result<Json<Record>, JsonRejection>,
) -> ServerResult<Json<Confirmation>> {
    let token = bearer(&headers)?;
    state.gate.authorize(&token)?;
    let Path(position) = position.map_err(|e| ServerError::InvalidInput(e.body_text()))?;
    let Json(patch) = body.map_err(|e| ServerError::InvalidInput(e.body_text()))?;

    let report = blocking(move || state.gate.update(&token, position, &patch)).await?;
    Ok(Json(Confirmation::for_report(
        "Row updated successfully",
        &report,
    )))
}

async fn delete_row(
    State(state): State<AppState>,
    headers: HeaderMap,
    position: Result<Path<i64>, PathRejection>,
) -> ServerResult<Json<Confirmation>> {
    let token = bearer(&headers)?;
    state.gate.authorize(&token)?;
    let Path(position) = position.map_err(|e| ServerError::InvalidInput(e.body_text()))?;
    let report = blocking(move || state.gate.delete(&token, position)).await?;
    Ok(Json(Confirmation::for_report(
        "Row deleted successfully",
        &report,
    )))
}

async fn restore(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<Confirmation>> {
    let token = bearer(&headers)?;
    blocking(move || state.gate.restore(&token)).await?;
    Ok(Json(Confirmation::new("Backup restored successfully")))
}

async fn stream_samples(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let reader = state.samples.reader();
    let settings = state.stream;
    ws.on_upgrade(move |socket| serve_websocket(socket, reader, settings))
}

/// Extracts the bearer token from the `Authorization` header.
fn bearer(headers: &HeaderMap) -> ServerResult<String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServerError::Unauthorized("missing authorization header".into()))?
        .to_str()
        .map_err(|_| ServerError::Unauthorized("authorization header is not text".into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim().to_string())
        }
        _ => Err(ServerError::Unauthorized("expected a bearer token".into())),
    }
}

async fn blocking<T, F>(work: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}
