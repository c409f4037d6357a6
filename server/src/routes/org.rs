//! Reference data and the organization dashboard. District and food-item
//! reads are public so the submission form can populate its dropdowns;
//! creation stays org-only.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use aid::model::{District, FoodItem, Status};

use crate::{
    auth::require_session,
    error::AppError,
    state::AppState,
    store::{NewDistrict, NewFoodItem},
    utils::require_field,
};

pub async fn list_districts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<District>>, AppError> {
    Ok(Json(state.store.districts().await?))
}

pub async fn get_district(
    State(state): State<Arc<AppState>>,
    Path(district_id): Path<i64>,
) -> Result<Json<District>, AppError> {
    let district = state
        .store
        .district_by_id(district_id)
        .await?
        .ok_or(AppError::NotFound("district"))?;
    Ok(Json(district))
}

#[derive(Deserialize)]
pub struct CreateDistrictPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub geojson: String,
}

pub async fn create_district(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateDistrictPayload>,
) -> Result<Json<District>, AppError> {
    let auth = require_session(&state, &headers).await?;
    auth.require_org()?;

    let name = require_field(&payload.name, "name")?;
    let district_state = require_field(&payload.state, "state")?;

    let district = state
        .store
        .create_district(NewDistrict {
            name,
            state: district_state,
            geojson: payload.geojson,
        })
        .await?;

    info!("District {} created", district.name);
    Ok(Json(district))
}

pub async fn list_food_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FoodItem>>, AppError> {
    Ok(Json(state.store.food_items().await?))
}

#[derive(Deserialize)]
pub struct CreateFoodItemPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub category: String,
}

pub async fn create_food_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateFoodItemPayload>,
) -> Result<Json<FoodItem>, AppError> {
    let auth = require_session(&state, &headers).await?;
    auth.require_org()?;

    let name = require_field(&payload.name, "name")?;
    let category = require_field(&payload.category, "category")?;

    let item = state
        .store
        .create_food_item(NewFoodItem {
            name,
            icon: payload.icon,
            category,
        })
        .await?;

    info!("Food item {} created", item.name);
    Ok(Json(item))
}

#[derive(Serialize)]
pub struct DistrictStats {
    pub district: String,
    pub total_requests: u64,
    pub pending_requests: u64,
    pub assigned_requests: u64,
    pub fulfilled_requests: u64,
}

#[derive(Serialize)]
pub struct InventoryStats {
    pub food_item: String,
    pub total_quantity: u64,
    /// Bank name to on-hand quantity, only banks that stock the item.
    pub foodbanks: BTreeMap<String, u32>,
}

#[derive(Serialize)]
pub struct DashboardStats {
    pub total_requests: u64,
    pub pending_requests: u64,
    pub assigned_requests: u64,
    pub fulfilled_requests: u64,
    pub district_stats: Vec<DistrictStats>,
    pub inventory_stats: Vec<InventoryStats>,
}

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, AppError> {
    let auth = require_session(&state, &headers).await?;
    auth.require_org()?;

    let requests = state.store.requests().await?;
    let count_with = |status: Status| {
        requests.iter().filter(|r| r.status == status).count() as u64
    };

    let mut district_stats = Vec::new();
    for district in state.store.districts().await? {
        let in_district: Vec<_> = requests
            .iter()
            .filter(|r| r.district == district.name)
            .collect();
        let count_in = |status: Status| {
            in_district.iter().filter(|r| r.status == status).count() as u64
        };
        district_stats.push(DistrictStats {
            district: district.name,
            total_requests: in_district.len() as u64,
            pending_requests: count_in(Status::Pending),
            assigned_requests: count_in(Status::Assigned),
            fulfilled_requests: count_in(Status::Fulfilled),
        });
    }

    let banks = state.store.foodbanks().await?;
    let mut bank_inventories = Vec::with_capacity(banks.len());
    for bank in banks {
        let lines = state.store.inventory_of(bank.id).await?;
        bank_inventories.push((bank, lines));
    }

    let mut inventory_stats = Vec::new();
    for item in state.store.food_items().await? {
        let mut total_quantity = 0u64;
        let mut foodbanks = BTreeMap::new();
        for (bank, lines) in &bank_inventories {
            if let Some(line) = lines.iter().find(|l| l.food_item_id == item.id) {
                total_quantity += line.quantity as u64;
                foodbanks.insert(bank.name.clone(), line.quantity);
            }
        }
        inventory_stats.push(InventoryStats {
            food_item: item.name,
            total_quantity,
            foodbanks,
        });
    }

    Ok(Json(DashboardStats {
        total_requests: requests.len() as u64,
        pending_requests: count_with(Status::Pending),
        assigned_requests: count_with(Status::Assigned),
        fulfilled_requests: count_with(Status::Fulfilled),
        district_stats,
        inventory_stats,
    }))
}
