//! Request lifecycle endpoints. Role visibility follows the assignment
//! model: requesters see their own submissions, bank operators see what is
//! assigned to them plus the Pending pool in their district, org staff see
//! everything.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use tracing::info;

use aid::{
    model::{FoodBank, Request, Role, Status, User},
    transition,
};

use crate::{
    auth::{require_session, resolve_actor},
    error::AppError,
    routes::ensure_food_items_exist,
    state::AppState,
    store::NewRequest,
    utils::{ItemPayload, require_field, validate_items},
};

#[derive(Deserialize)]
pub struct RequestsQuery {
    pub status: Option<Status>,
    pub district: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateRequestPayload {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub items: Vec<ItemPayload>,
}

#[derive(Deserialize)]
pub struct UpdateRequestPayload {
    pub status: Option<Status>,
    pub assigned_to_id: Option<i64>,
    /// Optimistic concurrency token. Omitted means "against whatever is
    /// current", so plain clients keep working.
    pub version: Option<u64>,
}

pub async fn create_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<Request>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let location = require_field(&payload.location, "location")?;
    let district = require_field(&payload.district, "district")?;
    let items = validate_items(&payload.items)?;
    ensure_food_items_exist(&state, &items).await?;

    let request = state
        .store
        .create_request(NewRequest {
            user_id: auth.user.id,
            requester_name: None,
            national_id: None,
            phone: None,
            location,
            district,
            latitude: payload.latitude,
            longitude: payload.longitude,
            items,
            tracking_number: None,
        })
        .await?;

    info!(
        "Request {} created by {}, tracking {}",
        request.id, auth.user.username, request.tracking_number
    );
    Ok(Json(request))
}

pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RequestsQuery>,
) -> Result<Json<Vec<Request>>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let mut requests = state.store.requests().await?;

    match auth.user.role {
        Role::User => requests.retain(|r| r.user_id == auth.user.id),
        Role::Foodbank => {
            let bank = operator_bank(&state, &auth.user).await?;
            requests.retain(|r| visible_to_bank(r, &bank));
        }
        Role::Org => {}
    }

    if let Some(status) = query.status {
        requests.retain(|r| r.status == status);
    }
    if let Some(district) = &query.district {
        requests.retain(|r| &r.district == district);
    }

    // Newest first.
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(Json(requests))
}

pub async fn get_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<i64>,
) -> Result<Json<Request>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let request = state
        .store
        .request_by_id(request_id)
        .await?
        .ok_or(AppError::NotFound("request"))?;

    match auth.user.role {
        Role::Org => {}
        Role::User => {
            if request.user_id != auth.user.id {
                return Err(AppError::Forbidden("not authorized to view this request"));
            }
        }
        Role::Foodbank => {
            let bank = operator_bank(&state, &auth.user).await?;
            if !visible_to_bank(&request, &bank) {
                return Err(AppError::Forbidden("not authorized to view this request"));
            }
        }
    }

    Ok(Json(request))
}

pub async fn update_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(request_id): Path<i64>,
    Json(payload): Json<UpdateRequestPayload>,
) -> Result<Json<Request>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let request = state
        .store
        .request_by_id(request_id)
        .await?
        .ok_or(AppError::NotFound("request"))?;

    // An assignment without an explicit status means "assign".
    let target = payload.assigned_to_id;
    let to = match payload.status {
        Some(status) => status,
        None if target.is_some() => Status::Assigned,
        None => return Err(AppError::Validation("nothing to update".into())),
    };

    let actor = resolve_actor(&state, &auth.user).await?;
    let updated = transition(&request, to, actor, target)?;

    if updated.status == Status::Assigned {
        if let Some(bank_id) = updated.assigned_to_id {
            if state.store.foodbank_by_id(bank_id).await?.is_none() {
                return Err(AppError::NotFound("food bank"));
            }
        }
    }

    let expected = payload.version.unwrap_or(request.version);
    let stored = state.store.update_request(&updated, expected).await?;

    info!(
        "Request {} moved {} to {} by {}",
        stored.id, request.status, stored.status, auth.user.username
    );
    Ok(Json(stored))
}

async fn operator_bank(state: &AppState, user: &User) -> Result<FoodBank, AppError> {
    state
        .store
        .foodbank_by_admin(user.id)
        .await?
        .ok_or(AppError::NotFound("food bank"))
}

fn visible_to_bank(request: &Request, bank: &FoodBank) -> bool {
    request.assigned_to_id == Some(bank.id)
        || (request.status == Status::Pending && request.district == bank.district)
}
