//! Unauthenticated surface: the submission form, tracking lookups and the
//! reference listings the form needs.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use aid::model::{District, FoodBank, FoodItem, Role, Status};

use crate::{
    error::AppError,
    routes::ensure_food_items_exist,
    state::AppState,
    store::{NewRequest, NewUser, StoreError},
    utils::{ItemPayload, optional_field, require_field, validate_items},
};

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to B40 Food Aid Management Platform API" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Deserialize)]
pub struct DistrictFilter {
    pub district: Option<String>,
}

pub async fn public_foodbanks(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DistrictFilter>,
) -> Result<Json<Vec<FoodBank>>, AppError> {
    let mut banks = state.store.foodbanks().await?;
    if let Some(district) = &filter.district {
        banks.retain(|bank| &bank.district == district);
    }
    Ok(Json(banks))
}

pub async fn public_districts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<District>>, AppError> {
    Ok(Json(state.store.districts().await?))
}

pub async fn public_food_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FoodItem>>, AppError> {
    Ok(Json(state.store.food_items().await?))
}

/// Submission form body. Everything is defaulted so missing fields reach the
/// validators and come back as 400s naming the field, not as decode failures.
#[derive(Deserialize)]
pub struct PublicRequestPayload {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub ic_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub items: Vec<ItemPayload>,
}

pub async fn create_public_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PublicRequestPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let first_name = require_field(&payload.first_name, "first name")?;
    let last_name = require_field(&payload.last_name, "last name")?;
    let ic_number = require_field(&payload.ic_number, "IC number")?;
    let address = require_field(&payload.address, "address")?;
    let district = require_field(&payload.district, "district")?;
    let items = validate_items(&payload.items)?;
    ensure_food_items_exist(&state, &items).await?;

    // Guest accounts are keyed by IC number, so repeat submitters reuse one.
    let username = format!("guest_{ic_number}");
    let user = match state.store.user_by_username(&username).await? {
        Some(existing) => existing,
        None => {
            let new = NewUser {
                username: username.clone(),
                email: format!("{username}@example.com"),
                hashed_password: String::new(),
                role: Role::User,
            };
            match state.store.create_user(new).await {
                Ok(created) => created,
                // Raced another submission with the same IC; take theirs.
                Err(StoreError::Duplicate(_)) => state
                    .store
                    .user_by_username(&username)
                    .await?
                    .ok_or_else(|| AppError::Internal("guest account vanished".into()))?,
                Err(err) => return Err(err.into()),
            }
        }
    };

    let request = state
        .store
        .create_request(NewRequest {
            user_id: user.id,
            requester_name: Some(format!("{first_name} {last_name}")),
            national_id: Some(ic_number),
            phone: optional_field(payload.phone_number),
            location: address,
            district,
            latitude: payload.latitude,
            longitude: payload.longitude,
            items,
            tracking_number: None,
        })
        .await?;

    info!(
        "Public request {} submitted, tracking {}",
        request.id, request.tracking_number
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Request created successfully",
            "request_id": request.id,
            "tracking_number": request.tracking_number,
        })),
    ))
}

/// Public tracking projection. The requester's contact fields, address and
/// coordinates stay out on purpose.
#[derive(Serialize)]
pub struct TrackView {
    pub tracking_number: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub items: Vec<TrackItem>,
    pub foodbank: Option<TrackFoodbank>,
}

#[derive(Serialize)]
pub struct TrackItem {
    pub name: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct TrackFoodbank {
    pub name: String,
    pub location: String,
    pub contact_info: String,
}

pub async fn track_request(
    State(state): State<Arc<AppState>>,
    Path(tracking_number): Path<String>,
) -> Result<Json<TrackView>, AppError> {
    let request = state
        .store
        .request_by_tracking(&tracking_number)
        .await?
        .ok_or(AppError::NotFound("request"))?;

    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        if let Some(food_item) = state.store.food_item_by_id(line.food_item_id).await? {
            items.push(TrackItem {
                name: food_item.name,
                quantity: line.quantity,
            });
        }
    }

    let foodbank = match request.assigned_to_id {
        Some(bank_id) => state
            .store
            .foodbank_by_id(bank_id)
            .await?
            .map(|bank| TrackFoodbank {
                name: bank.name,
                location: bank.location,
                contact_info: bank.contact_info,
            }),
        None => None,
    };

    Ok(Json(TrackView {
        tracking_number: request.tracking_number,
        status: request.status,
        created_at: request.created_at,
        fulfilled_at: request.fulfilled_at,
        items,
        foodbank,
    }))
}
