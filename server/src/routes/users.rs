//! Account endpoints: register, login, logout and user lookups.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use aid::model::{Role, UserView};

use crate::{
    auth::{bearer_token, hash_password, issue_session, require_session, verify_password},
    error::AppError,
    state::AppState,
    store::NewUser,
    utils::require_field,
};

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<Token>, AppError> {
    let Some(user) = state.store.user_by_username(form.username.trim()).await? else {
        return Err(AppError::Unauthorized("incorrect username or password"));
    };
    if !verify_password(&form.password, &user.hashed_password) {
        return Err(AppError::Unauthorized("incorrect username or password"));
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("account is inactive"));
    }

    let session = issue_session(&state, &user).await?;
    info!("User {} logged in", user.username);

    Ok(Json(Token {
        access_token: session.token,
        token_type: "bearer",
    }))
}

#[derive(Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<Role>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<UserView>, AppError> {
    let username = require_field(&payload.username, "username")?;
    let email = require_field(&payload.email, "email")?;
    if payload.password.is_empty() {
        return Err(AppError::Validation("password is required".into()));
    }
    let role = payload.role.unwrap_or(Role::User);

    let user = state
        .store
        .create_user(NewUser {
            username,
            email,
            hashed_password: hash_password(&payload.password),
            role,
        })
        .await?;

    info!("Registered {} account {}", role, user.username);
    Ok(Json(UserView::from(&user)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized("not authenticated"))?;
    state.store.delete_session(token).await?;
    Ok(Json(json!({ "detail": "logged out" })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserView>, AppError> {
    let auth = require_session(&state, &headers).await?;
    Ok(Json(UserView::from(&auth.user)))
}

pub async fn user_by_id(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<UserView>, AppError> {
    let auth = require_session(&state, &headers).await?;
    if auth.user.role != Role::Org && auth.user.id != user_id {
        return Err(AppError::Forbidden("not authorized to view this account"));
    }

    let user = state
        .store
        .user_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(UserView::from(&user)))
}
