//! Session auth.
//!
//! Login exchanges credentials for an opaque bearer token backed by a
//! server-side session record with a TTL. Handlers call [`require_session`]
//! themselves; there is no middleware layer, the public routes simply never
//! call it.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use aid::{
    Actor,
    model::{Role, User},
};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// An authenticated caller: the session plus the account it belongs to.
pub struct AuthedUser {
    pub session: Session,
    pub user: User,
}

impl AuthedUser {
    pub fn require_org(&self) -> Result<(), AppError> {
        if self.user.role != Role::Org {
            return Err(AppError::Forbidden("organization role required"));
        }
        Ok(())
    }
}

/// Salted SHA-256, stored as `salt$hex-digest`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    // Guest accounts store an empty hash and can never log in.
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    digest(salt, password) == expected
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn issue_session(state: &AppState, user: &User) -> Result<Session, AppError> {
    let session = Session {
        token: Uuid::new_v4().simple().to_string(),
        user_id: user.id,
        role: user.role,
        expires_at: Utc::now() + Duration::seconds(state.config.session_ttl_secs as i64),
    };
    state.store.put_session(&session).await?;
    Ok(session)
}

pub async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthedUser, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized("not authenticated"))?;
    let Some(session) = state.store.session_by_token(token).await? else {
        return Err(AppError::Unauthorized("invalid or expired session"));
    };
    if session.expires_at <= Utc::now() {
        state.store.delete_session(token).await?;
        return Err(AppError::Unauthorized("invalid or expired session"));
    }
    let Some(user) = state.store.user_by_id(session.user_id).await? else {
        return Err(AppError::Unauthorized("invalid or expired session"));
    };
    if !user.is_active {
        return Err(AppError::Unauthorized("account is inactive"));
    }
    Ok(AuthedUser { session, user })
}

/// Resolve the lifecycle actor for an account. Food-bank operators act as the
/// bank they administer, so an operator without a bank cannot drive requests.
pub async fn resolve_actor(state: &AppState, user: &User) -> Result<Actor, AppError> {
    match user.role {
        Role::User => Ok(Actor::User),
        Role::Org => Ok(Actor::Org),
        Role::Foodbank => {
            let bank = state
                .store
                .foodbank_by_admin(user.id)
                .await?
                .ok_or(AppError::NotFound("food bank"))?;
            Ok(Actor::Foodbank {
                foodbank_id: bank.id,
            })
        }
    }
}
