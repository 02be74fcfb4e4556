use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest},
        extractors::{AdminUser, AuthUser},
        repo_types::Profile,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/all", get(list_all))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::Validation(e.body_text()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let profile = state.accounts.register(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let token = state.accounts.login(body(payload)?).await?;
    Ok(Json(token))
}

#[instrument(skip_all)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.accounts.profile(&claims).await?))
}

#[instrument(skip_all)]
pub async fn list_all(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.accounts.list_users(&claims).await?))
}
