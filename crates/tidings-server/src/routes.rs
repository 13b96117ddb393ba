//! HTTP routes.

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidings_auth::{Identity, PasswordChange};
use tidings_core::error::TidingsError;
use tidings_core::models::role::Role;
use tidings_push::BroadcastReport;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/auth/password", post(change_password))
        .route("/notifications/broadcast", post(broadcast))
        .route("/ws/{token}", get(ws::upgrade))
        .with_state(state)
}

/// Error body returned by every route. Authentication refusals all look
/// the same.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error")]
    Internal,
}

impl From<TidingsError> for ApiError {
    fn from(err: TidingsError) -> Self {
        match err {
            TidingsError::AuthenticationFailed => ApiError::Unauthorized,
            TidingsError::AuthorizationDenied { .. } => ApiError::Forbidden,
            TidingsError::Validation { message } => ApiError::BadRequest(message),
            other => {
                error!(error = %other, "request failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
struct PasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Deserialize)]
struct BroadcastRequest {
    user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    token_type: &'static str,
    expires_in: u64,
}

#[derive(Serialize)]
struct PasswordResponse {
    password_epoch: u64,
    disconnected: usize,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: Some(pair.refresh_token),
        token_type: "Bearer",
        expires_in: pair.expires_in,
    }))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let grant = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(TokenResponse {
        access_token: grant.access_token,
        refresh_token: None,
        token_type: "Bearer",
        expires_in: grant.expires_in,
    }))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Identity>, ApiError> {
    Ok(Json(authenticate(&state, &headers).await?))
}

async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<PasswordResponse>, ApiError> {
    let identity = authenticate(&state, &headers).await?;
    let outcome = state
        .auth
        .change_password(identity.account_id, &req.current_password, &req.new_password)
        .await?;

    match outcome {
        PasswordChange::Changed { password_epoch } => {
            let disconnected = state.registry().disconnect_user(identity.account_id);
            info!(
                account_id = %identity.account_id,
                disconnected,
                "push connections closed after password change"
            );
            Ok(Json(PasswordResponse {
                password_epoch,
                disconnected,
            }))
        }
        PasswordChange::Rejected(reason) => Err(ApiError::BadRequest(reason.to_string())),
    }
}

async fn broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<BroadcastReport>, ApiError> {
    let identity = authenticate(&state, &headers).await?;
    if !identity.role.includes(Role::Admin) {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(state.publisher.broadcast(req.user_ids).await))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    Ok(state.auth.verify_bearer(token).await?)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
