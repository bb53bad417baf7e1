//! Registration and login endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shelfctl_core::{Email, Secret};

use crate::db::UserId;
use crate::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::http::server::AppState;

/// Credentials as posted by the client. No `Debug`: the password must not
/// end up in logs.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user_id: UserId,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user_id: UserId,
}

/// POST /register
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let email = Email::new(&req.email)?;
    let secret = Secret::new(req.password)?;
    let user_id = state.auth.register(email, secret).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "registered",
            user_id,
        }),
    ))
}

/// POST /login
///
/// Malformed emails and empty passwords fail as `InvalidInput`; anything
/// that gets as far as a credential check fails as one `Unauthorized`.
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = Email::new(&req.email)?;
    let secret = Secret::claimed(req.password)?;
    let user_id = state.auth.login(email, secret).await?;

    Ok(Json(LoginResponse {
        message: "login successful",
        user_id,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}
