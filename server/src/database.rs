//! # Redis
//!
//! Primary store.
//!
//! Core purpose is to persist accounts, requests, reference data and food-bank
//! inventory, with atomic primitives for the parts that race.
//!
//! ## Layout
//!
//! - `{entity}:next_id` strings: INCR-allocated ids
//! - `users`, `districts`, `food_items`, `foodbanks`, `requests` hashes: id to JSON
//! - `users:by_username`, `districts:by_name`, `food_items:by_name`,
//!   `foodbanks:by_admin`, `requests:by_tracking` hashes: uniqueness claims via HSETNX
//! - `inventory:{bank}` hash: food item id to line metadata JSON
//! - `inventory_qty:{bank}` hash: food item id to integer quantity, so stock
//!   merges stay a single HINCRBY
//! - `sessions:{token}` strings: session JSON under the configured TTL
//!
//! ## Notes
//!
//! - Request updates take a per-id lock before the version check, so the
//!   compare-and-swap holds for a single server process. Running several
//!   server replicas against one Redis would need WATCH/MULTI instead.
//! - Ids and uniqueness claims never expire; only sessions carry a TTL.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;

use aid::{
    model::{District, FoodBank, FoodItem, InventoryLine, Request, Status, User},
    tracking,
};

use crate::{
    auth::Session,
    store::{NewDistrict, NewFoodBank, NewFoodItem, NewRequest, NewUser, Store, StoreError},
};

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url).unwrap();
    let connection_manager = client
        .get_connection_manager_with_config(config)
        .await
        .unwrap();

    connection_manager
}

/// Line metadata kept beside the quantity hash. The bank id lives in the key
/// and the quantity in `inventory_qty:{bank}`, so neither is repeated here.
#[derive(Serialize, Deserialize)]
struct LineMeta {
    id: i64,
    food_item_id: i64,
    last_updated: DateTime<Utc>,
}

pub struct RedisStore {
    connection: ConnectionManager,
    write_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn request_lock(&self, id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        key: &str,
        field: i64,
    ) -> Result<Option<T>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget(key, field).await.map_err(backend)?;
        raw.as_deref().map(decode).transpose()
    }

    async fn fetch_all<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Vec<String> = conn.hvals(key).await.map_err(backend)?;
        raw.iter().map(|entry| decode(entry)).collect()
    }

    /// Id lookup through a secondary index hash.
    async fn fetch_indexed<T: DeserializeOwned>(
        &self,
        index_key: &str,
        index_field: &str,
        entity_key: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut conn = self.connection.clone();
        let id: Option<i64> = conn.hget(index_key, index_field).await.map_err(backend)?;
        match id {
            Some(id) => self.fetch(entity_key, id).await,
            None => Ok(None),
        }
    }

    /// Allocate an id, claim `index_field` in the index hash, then store the
    /// entity. A lost claim surfaces as [`StoreError::Duplicate`].
    async fn create_indexed<T: Serialize>(
        &self,
        entity: &'static str,
        entity_key: &str,
        index_key: &str,
        index_field: &str,
        build: impl FnOnce(i64) -> T,
    ) -> Result<T, StoreError> {
        let mut conn = self.connection.clone();
        let id: i64 = conn
            .incr(format!("{entity_key}:next_id"), 1)
            .await
            .map_err(backend)?;
        let claimed: bool = conn
            .hset_nx(index_key, index_field, id)
            .await
            .map_err(backend)?;
        if !claimed {
            return Err(StoreError::Duplicate(entity));
        }
        let value = build(id);
        let _: () = conn
            .hset(entity_key, id, encode(&value)?)
            .await
            .map_err(backend)?;
        Ok(value)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let username = new.username.clone();
        self.create_indexed("username", "users", "users:by_username", &username, |id| {
            User {
                id,
                username: new.username,
                email: new.email,
                hashed_password: new.hashed_password,
                role: new.role,
                is_active: true,
                created_at: Utc::now(),
            }
        })
        .await
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.fetch("users", id).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_indexed("users:by_username", username, "users").await
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let ttl = (session.expires_at - Utc::now()).num_seconds().max(1) as u64;
        let _: () = conn
            .set_ex(format!("sessions:{}", session.token), encode(session)?, ttl)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn
            .get(format!("sessions:{token}"))
            .await
            .map_err(backend)?;
        raw.as_deref().map(decode).transpose()
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(format!("sessions:{token}")).await.map_err(backend)?;
        Ok(())
    }

    async fn create_district(&self, new: NewDistrict) -> Result<District, StoreError> {
        let name = new.name.clone();
        self.create_indexed("district", "districts", "districts:by_name", &name, |id| {
            District {
                id,
                name: new.name,
                state: new.state,
                geojson: new.geojson,
            }
        })
        .await
    }

    async fn districts(&self) -> Result<Vec<District>, StoreError> {
        let mut all: Vec<District> = self.fetch_all("districts").await?;
        all.sort_by_key(|d| d.id);
        Ok(all)
    }

    async fn district_by_id(&self, id: i64) -> Result<Option<District>, StoreError> {
        self.fetch("districts", id).await
    }

    async fn create_food_item(&self, new: NewFoodItem) -> Result<FoodItem, StoreError> {
        let name = new.name.clone();
        self.create_indexed("food item", "food_items", "food_items:by_name", &name, |id| {
            FoodItem {
                id,
                name: new.name,
                icon: new.icon,
                category: new.category,
            }
        })
        .await
    }

    async fn food_items(&self) -> Result<Vec<FoodItem>, StoreError> {
        let mut all: Vec<FoodItem> = self.fetch_all("food_items").await?;
        all.sort_by_key(|f| f.id);
        Ok(all)
    }

    async fn food_item_by_id(&self, id: i64) -> Result<Option<FoodItem>, StoreError> {
        self.fetch("food_items", id).await
    }

    async fn create_foodbank(&self, new: NewFoodBank) -> Result<FoodBank, StoreError> {
        let admin_field = new.admin_id.to_string();
        self.create_indexed(
            "a food bank for this operator",
            "foodbanks",
            "foodbanks:by_admin",
            &admin_field,
            |id| FoodBank {
                id,
                name: new.name,
                location: new.location,
                district: new.district,
                contact_info: new.contact_info,
                admin_id: new.admin_id,
                latitude: new.latitude,
                longitude: new.longitude,
                created_at: Utc::now(),
            },
        )
        .await
    }

    async fn foodbanks(&self) -> Result<Vec<FoodBank>, StoreError> {
        let mut all: Vec<FoodBank> = self.fetch_all("foodbanks").await?;
        all.sort_by_key(|b| b.id);
        Ok(all)
    }

    async fn foodbank_by_id(&self, id: i64) -> Result<Option<FoodBank>, StoreError> {
        self.fetch("foodbanks", id).await
    }

    async fn foodbank_by_admin(&self, admin_id: i64) -> Result<Option<FoodBank>, StoreError> {
        self.fetch_indexed("foodbanks:by_admin", &admin_id.to_string(), "foodbanks")
            .await
    }

    async fn inventory_of(&self, foodbank_id: i64) -> Result<Vec<InventoryLine>, StoreError> {
        let mut conn = self.connection.clone();
        let meta: HashMap<String, String> = conn
            .hgetall(format!("inventory:{foodbank_id}"))
            .await
            .map_err(backend)?;
        let quantities: HashMap<String, i64> = conn
            .hgetall(format!("inventory_qty:{foodbank_id}"))
            .await
            .map_err(backend)?;

        let mut lines = Vec::with_capacity(meta.len());
        for (field, raw) in &meta {
            let parsed: LineMeta = decode(raw)?;
            let quantity = quantities.get(field).copied().unwrap_or(0);
            lines.push(InventoryLine {
                id: parsed.id,
                foodbank_id,
                food_item_id: parsed.food_item_id,
                quantity: quantity.max(0) as u32,
                last_updated: parsed.last_updated,
            });
        }
        lines.sort_by_key(|line| line.id);
        Ok(lines)
    }

    async fn add_inventory(
        &self,
        foodbank_id: i64,
        food_item_id: i64,
        quantity: u32,
    ) -> Result<InventoryLine, StoreError> {
        let mut conn = self.connection.clone();
        let meta_key = format!("inventory:{foodbank_id}");
        let qty_key = format!("inventory_qty:{foodbank_id}");

        let id: i64 = conn.incr("inventory:next_id", 1).await.map_err(backend)?;
        let now = Utc::now();
        let fresh = LineMeta {
            id,
            food_item_id,
            last_updated: now,
        };
        let claimed: bool = conn
            .hset_nx(&meta_key, food_item_id, encode(&fresh)?)
            .await
            .map_err(backend)?;
        let total: i64 = conn
            .hincr(&qty_key, food_item_id, quantity as i64)
            .await
            .map_err(backend)?;

        let meta = if claimed {
            fresh
        } else {
            // Existing line: keep its id, refresh the timestamp.
            let raw: Option<String> = conn.hget(&meta_key, food_item_id).await.map_err(backend)?;
            let mut existing: LineMeta = raw
                .as_deref()
                .map(decode)
                .transpose()?
                .ok_or_else(|| StoreError::Backend("inventory line vanished".into()))?;
            existing.last_updated = now;
            let _: () = conn
                .hset(&meta_key, food_item_id, encode(&existing)?)
                .await
                .map_err(backend)?;
            existing
        };

        Ok(InventoryLine {
            id: meta.id,
            foodbank_id,
            food_item_id,
            quantity: total.max(0) as u32,
            last_updated: meta.last_updated,
        })
    }

    async fn set_inventory_quantity(
        &self,
        foodbank_id: i64,
        line_id: i64,
        quantity: u32,
    ) -> Result<Option<InventoryLine>, StoreError> {
        let mut conn = self.connection.clone();
        let meta_key = format!("inventory:{foodbank_id}");

        let meta: HashMap<String, String> = conn.hgetall(&meta_key).await.map_err(backend)?;
        let mut found: Option<LineMeta> = None;
        for raw in meta.values() {
            let parsed: LineMeta = decode(raw)?;
            if parsed.id == line_id {
                found = Some(parsed);
                break;
            }
        }
        let Some(mut line) = found else {
            return Ok(None);
        };

        line.last_updated = Utc::now();
        let _: () = conn
            .hset(
                format!("inventory_qty:{foodbank_id}"),
                line.food_item_id,
                quantity as i64,
            )
            .await
            .map_err(backend)?;
        let _: () = conn
            .hset(&meta_key, line.food_item_id, encode(&line)?)
            .await
            .map_err(backend)?;

        Ok(Some(InventoryLine {
            id: line.id,
            foodbank_id,
            food_item_id: line.food_item_id,
            quantity,
            last_updated: line.last_updated,
        }))
    }

    async fn create_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        let mut conn = self.connection.clone();
        let id: i64 = conn.incr("requests:next_id", 1).await.map_err(backend)?;

        let tracking_number = match &new.tracking_number {
            Some(pinned) => {
                let claimed: bool = conn
                    .hset_nx("requests:by_tracking", pinned, id)
                    .await
                    .map_err(backend)?;
                if !claimed {
                    return Err(StoreError::Duplicate("tracking number"));
                }
                pinned.clone()
            }
            None => loop {
                let candidate = tracking::candidate();
                let claimed: bool = conn
                    .hset_nx("requests:by_tracking", &candidate, id)
                    .await
                    .map_err(backend)?;
                if claimed {
                    break candidate;
                }
            },
        };

        let request = Request {
            id,
            tracking_number,
            user_id: new.user_id,
            requester_name: new.requester_name,
            national_id: new.national_id,
            phone: new.phone,
            location: new.location,
            district: new.district,
            latitude: new.latitude,
            longitude: new.longitude,
            status: Status::Pending,
            assigned_to_id: None,
            created_at: Utc::now(),
            fulfilled_at: None,
            version: 1,
            items: new.items,
        };
        let _: () = conn
            .hset("requests", id, encode(&request)?)
            .await
            .map_err(backend)?;
        Ok(request)
    }

    async fn requests(&self) -> Result<Vec<Request>, StoreError> {
        let mut all: Vec<Request> = self.fetch_all("requests").await?;
        all.sort_by_key(|r| r.id);
        Ok(all)
    }

    async fn request_by_id(&self, id: i64) -> Result<Option<Request>, StoreError> {
        self.fetch("requests", id).await
    }

    async fn request_by_tracking(&self, tracking: &str) -> Result<Option<Request>, StoreError> {
        self.fetch_indexed("requests:by_tracking", tracking, "requests")
            .await
    }

    async fn update_request(
        &self,
        updated: &Request,
        expected_version: u64,
    ) -> Result<Request, StoreError> {
        let lock = self.request_lock(updated.id).await;
        let _guard = lock.lock().await;

        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget("requests", updated.id).await.map_err(backend)?;
        let stored: Request = raw
            .as_deref()
            .map(decode)
            .transpose()?
            .ok_or_else(|| StoreError::Backend("unknown request id".into()))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        let mut next = updated.clone();
        next.version = expected_version + 1;
        let _: () = conn
            .hset("requests", next.id, encode(&next)?)
            .await
            .map_err(backend)?;
        Ok(next)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Backend(e.to_string()))
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}
