//! Axum-based HTTP gateway in front of [`AuthService`].
//!
//! The gateway is the transport boundary:
//! - rejects missing/empty fields with `invalid_argument` before the core runs
//! - maps every [`ErrorKind`] to a status code and a caller-safe message
//! - never echoes the internal cause of an `internal` error
//! - gives each request a [`RequestContext`] with the configured deadline and
//!   an `x-request-id` correlation id
//!
//! Request bodies are capped and the whole request is bounded by a timeout
//! layer, as in any public-facing listener.

use crate::auth::{AuthService, RequestContext};
use crate::error::{AuthError, ErrorKind};
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (16KB). Auth payloads are tiny.
pub const MAX_BODY_SIZE: usize = 16_384;
/// Floor for the timeout on a whole HTTP exchange.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Extra time the HTTP layer allows past the per-call deadline, so the
/// service reports `deadline_exceeded` before the layer answers 408.
const TIMEOUT_HEADROOM_SECS: u64 = 5;
/// Header carrying the caller's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Longest accepted caller-supplied request id.
const MAX_REQUEST_ID_LEN: usize = 128;
/// Non-standard "client closed request" status for cancelled calls.
const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    /// Deadline applied to each service call (`None` = unbounded).
    pub call_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, call_timeout: Option<Duration>) -> Self {
        Self { auth, call_timeout }
    }

    fn request_context(&self, headers: &HeaderMap) -> RequestContext {
        let mut ctx = RequestContext::new();
        if let Some(id) = caller_request_id(headers) {
            ctx = ctx.with_request_id(id);
        }
        match self.call_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// Timeout for the whole HTTP exchange: never shorter than the call
    /// deadline plus headroom.
    pub fn http_timeout(&self) -> Duration {
        let floor = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        match self.call_timeout {
            Some(timeout) => {
                floor.max(timeout.saturating_add(Duration::from_secs(TIMEOUT_HEADROOM_SECS)))
            }
            None => floor,
        }
    }
}

/// Build the router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    let http_timeout = state.http_timeout();
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/register", post(handle_register))
        .route("/api/auth/is_admin", post(handle_is_admin))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            http_timeout,
        ))
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn run_gateway(
    host: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, port = local.port(), "gateway is running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(port = local.port(), "gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl-C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for handlers (avoids `impl IntoResponse` inference issues).
type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Request body for login. Missing fields default to empty so they are
/// reported as "required" rather than as a parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginBody {
    email: String,
    password: String,
    app_id: i64,
}

/// Request body for registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegisterBody {
    email: String,
    password: String,
}

/// Request body for the admin check.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IsAdminBody {
    user_id: i64,
}

/// GET /health
async fn handle_health() -> ApiResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// POST /api/auth/login: verify credentials and issue a tenant-scoped token.
async fn handle_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_json(&e),
    };

    if body.email.is_empty() {
        return invalid_argument("email is required");
    }
    if body.password.is_empty() {
        return invalid_argument("password is required");
    }
    if body.app_id == 0 {
        return invalid_argument("app_id is required");
    }

    let ctx = state.request_context(&headers);
    match state
        .auth
        .login(&ctx, &body.email, &body.password, body.app_id)
        .await
    {
        Ok(token) => (StatusCode::OK, Json(serde_json::json!({"token": token}))),
        Err(e) => error_response(&e),
    }
}

/// POST /api/auth/register: create a new account.
async fn handle_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_json(&e),
    };

    if body.email.is_empty() {
        return invalid_argument("email is required");
    }
    if body.password.is_empty() {
        return invalid_argument("password is required");
    }

    let ctx = state.request_context(&headers);
    match state.auth.register(&ctx, &body.email, &body.password).await {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"user_id": user_id})),
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /api/auth/is_admin: report the admin flag of a user.
async fn handle_is_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<IsAdminBody>, JsonRejection>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(b)) => b,
        Err(e) => return bad_json(&e),
    };

    if body.user_id == 0 {
        return invalid_argument("user_id is required");
    }

    let ctx = state.request_context(&headers);
    match state.auth.is_admin(&ctx, body.user_id).await {
        Ok(is_admin) => (
            StatusCode::OK,
            Json(serde_json::json!({"is_admin": is_admin})),
        ),
        Err(e) => error_response(&e),
    }
}

// ── Error mapping ─────────────────────────────────────────────────────

/// Status code for a domain error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidAppId => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::REQUEST_TIMEOUT),
    }
}

fn error_response(err: &AuthError) -> ApiResponse {
    let kind = err.kind();
    tracing::debug!(op = err.op(), code = kind.code(), "request failed");
    (
        status_for(kind),
        Json(serde_json::json!({
            "error": kind.public_message(),
            "code": kind.code(),
        })),
    )
}

fn invalid_argument(message: &str) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": message,
            "code": "invalid_argument",
        })),
    )
}

fn bad_json(rejection: &JsonRejection) -> ApiResponse {
    invalid_argument(&format!("invalid request: {}", rejection.body_text()))
}

/// Caller-supplied request id, if it is short printable ASCII.
fn caller_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id.chars().all(|c| c.is_ascii_graphic())
        })
        .map(ToOwned::to_owned)
}
