//! HTTP adapter (spec.md §6): one POST route per tool plus `/status`. This
//! layer is a thin translation of request JSON to [`Dispatcher`] calls and
//! [`ToolError`] to an HTTP status + envelope — no business logic lives here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::{ErrorKind, ToolError};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitConfig, RateLimitLayer};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Builds the tool surface router with the teacher's two-layer middleware
/// stack: per-IP rate limiting outermost (protects the tool surface itself
/// from a runaway caller, independent of the per-host upstream limiting in
/// `upstream::rate_limit`), then request logging. Requires the server to be
/// served with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// `ConnectInfo` extractor both layers depend on is present.
pub fn router(state: AppState) -> Router {
    let limiter = RateLimitLayer::new(RateLimitConfig::default());
    Router::new()
        .route("/status", get(status_handler))
        .route("/tools/universe", post(universe_handler))
        .route("/tools/market", post(market_handler))
        .route("/tools/sde", post(sde_handler))
        .route("/tools/skills", post(skills_handler))
        .route("/tools/fitting", post(fitting_handler))
        .layer(axum::middleware::from_fn(request_logging))
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .with_state(state)
}

fn status_code_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::SystemNotFound | ErrorKind::TypeNotFound | ErrorKind::RouteNotFound => StatusCode::NOT_FOUND,
        ErrorKind::SourceUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::IntegrityError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_response(result: Result<Value, ToolError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            let status = status_code_for(err.kind);
            (status, Json(err.to_envelope())).into_response()
        }
    }
}

async fn status_handler(State(state): State<AppState>) -> Response {
    Json(state.dispatcher.status().await).into_response()
}

async fn universe_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    into_response(state.dispatcher.universe(body).await)
}

async fn market_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    into_response(state.dispatcher.market(body).await)
}

async fn sde_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    into_response(state.dispatcher.sde(body).await)
}

async fn skills_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    into_response(state.dispatcher.skills(body).await)
}

async fn fitting_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    into_response(state.dispatcher.fitting(body).await)
}
