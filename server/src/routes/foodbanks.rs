//! Food-bank CRUD and inventory management.
//!
//! Inventory sits outside the request lifecycle: no transition touches these
//! quantities, operators adjust them directly.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use aid::model::{FoodBank, FoodItem, Role, User};

use crate::{
    auth::require_session,
    error::AppError,
    routes::public::DistrictFilter,
    state::AppState,
    store::NewFoodBank,
    utils::require_field,
};

/// Inventory line joined with its food item, the shape inventory screens
/// consume.
#[derive(Serialize)]
pub struct InventoryLineView {
    pub id: i64,
    pub foodbank_id: i64,
    pub food_item_id: i64,
    pub quantity: u32,
    pub last_updated: DateTime<Utc>,
    pub food_item: FoodItem,
}

#[derive(Serialize)]
pub struct FoodBankWithInventory {
    #[serde(flatten)]
    pub foodbank: FoodBank,
    pub inventory_items: Vec<InventoryLineView>,
}

#[derive(Deserialize)]
pub struct CreateFoodBankPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub contact_info: String,
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

pub async fn create_foodbank(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateFoodBankPayload>,
) -> Result<Json<FoodBank>, AppError> {
    let auth = require_session(&state, &headers).await?;
    auth.require_org()?;

    let name = require_field(&payload.name, "name")?;
    let location = require_field(&payload.location, "location")?;
    let district = require_field(&payload.district, "district")?;
    let admin_id = payload
        .admin_id
        .ok_or_else(|| AppError::Validation("admin_id is required".into()))?;

    let admin = state
        .store
        .user_by_id(admin_id)
        .await?
        .ok_or(AppError::NotFound("admin user"))?;
    if admin.role != Role::Foodbank {
        return Err(AppError::Validation(
            "admin user must have the foodbank role".into(),
        ));
    }

    let bank = state
        .store
        .create_foodbank(NewFoodBank {
            name,
            location,
            district,
            contact_info: payload.contact_info.trim().to_string(),
            admin_id,
            latitude: payload.latitude,
            longitude: payload.longitude,
        })
        .await?;

    info!("Food bank {} created in {}", bank.name, bank.district);
    Ok(Json(bank))
}

pub async fn list_foodbanks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<DistrictFilter>,
) -> Result<Json<Vec<FoodBank>>, AppError> {
    require_session(&state, &headers).await?;

    let mut banks = state.store.foodbanks().await?;
    if let Some(district) = &filter.district {
        banks.retain(|bank| &bank.district == district);
    }
    Ok(Json(banks))
}

pub async fn get_foodbank(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(foodbank_id): Path<i64>,
) -> Result<Json<FoodBankWithInventory>, AppError> {
    require_session(&state, &headers).await?;

    let bank = state
        .store
        .foodbank_by_id(foodbank_id)
        .await?
        .ok_or(AppError::NotFound("food bank"))?;
    let inventory_items = inventory_view(&state, foodbank_id).await?;

    Ok(Json(FoodBankWithInventory {
        foodbank: bank,
        inventory_items,
    }))
}

pub async fn list_inventory(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(foodbank_id): Path<i64>,
) -> Result<Json<Vec<InventoryLineView>>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let bank = state
        .store
        .foodbank_by_id(foodbank_id)
        .await?
        .ok_or(AppError::NotFound("food bank"))?;
    ensure_inventory_access(&auth.user, &bank, false)?;

    Ok(Json(inventory_view(&state, foodbank_id).await?))
}

#[derive(Deserialize)]
pub struct AddInventoryPayload {
    pub food_item_id: i64,
    pub quantity: i64,
}

pub async fn add_inventory_line(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(foodbank_id): Path<i64>,
    Json(payload): Json<AddInventoryPayload>,
) -> Result<Json<InventoryLineView>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let bank = state
        .store
        .foodbank_by_id(foodbank_id)
        .await?
        .ok_or(AppError::NotFound("food bank"))?;
    ensure_inventory_access(&auth.user, &bank, true)?;

    let food_item = state
        .store
        .food_item_by_id(payload.food_item_id)
        .await?
        .ok_or(AppError::NotFound("food item"))?;
    if payload.quantity < 0 {
        return Err(AppError::NegativeQuantity);
    }

    let line = state
        .store
        .add_inventory(foodbank_id, payload.food_item_id, payload.quantity as u32)
        .await?;

    info!(
        "Inventory of bank {} now holds {} x {}",
        foodbank_id, line.quantity, food_item.name
    );
    Ok(Json(InventoryLineView {
        id: line.id,
        foodbank_id: line.foodbank_id,
        food_item_id: line.food_item_id,
        quantity: line.quantity,
        last_updated: line.last_updated,
        food_item,
    }))
}

#[derive(Deserialize)]
pub struct SetQuantityPayload {
    pub quantity: i64,
}

pub async fn set_inventory_line(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((foodbank_id, line_id)): Path<(i64, i64)>,
    Json(payload): Json<SetQuantityPayload>,
) -> Result<Json<InventoryLineView>, AppError> {
    let auth = require_session(&state, &headers).await?;
    let bank = state
        .store
        .foodbank_by_id(foodbank_id)
        .await?
        .ok_or(AppError::NotFound("food bank"))?;
    ensure_inventory_access(&auth.user, &bank, true)?;

    if payload.quantity < 0 {
        return Err(AppError::NegativeQuantity);
    }

    let line = state
        .store
        .set_inventory_quantity(foodbank_id, line_id, payload.quantity as u32)
        .await?
        .ok_or(AppError::NotFound("inventory line"))?;
    let food_item = state
        .store
        .food_item_by_id(line.food_item_id)
        .await?
        .ok_or(AppError::NotFound("food item"))?;

    Ok(Json(InventoryLineView {
        id: line.id,
        foodbank_id: line.foodbank_id,
        food_item_id: line.food_item_id,
        quantity: line.quantity,
        last_updated: line.last_updated,
        food_item,
    }))
}

/// Org staff touch any inventory, operators only their own bank, requesters
/// may look but never modify.
fn ensure_inventory_access(user: &User, bank: &FoodBank, modify: bool) -> Result<(), AppError> {
    match user.role {
        Role::Org => Ok(()),
        Role::Foodbank => {
            if bank.admin_id != user.id {
                return Err(AppError::Forbidden(
                    "not authorized for this food bank's inventory",
                ));
            }
            Ok(())
        }
        Role::User => {
            if modify {
                return Err(AppError::Forbidden("regular users cannot modify inventory"));
            }
            Ok(())
        }
    }
}

async fn inventory_view(
    state: &AppState,
    foodbank_id: i64,
) -> Result<Vec<InventoryLineView>, AppError> {
    let lines = state.store.inventory_of(foodbank_id).await?;
    let mut views = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(food_item) = state.store.food_item_by_id(line.food_item_id).await? else {
            continue;
        };
        views.push(InventoryLineView {
            id: line.id,
            foodbank_id: line.foodbank_id,
            food_item_id: line.food_item_id,
            quantity: line.quantity,
            last_updated: line.last_updated,
            food_item,
        });
    }
    Ok(views)
}
