use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;

use aid::{
    model::{District, FoodBank, FoodItem, InventoryLine, Request, RequestItem, Role, Status, User},
    tracking,
};

use crate::auth::Session;

/// Failures below the handler layer. Uniqueness and version conflicts are
/// separated out so handlers can map them to 409 instead of 500.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("version conflict")]
    VersionConflict,

    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewDistrict {
    pub name: String,
    pub state: String,
    pub geojson: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodItem {
    pub name: String,
    pub icon: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct NewFoodBank {
    pub name: String,
    pub location: String,
    pub district: String,
    pub contact_info: String,
    pub admin_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub user_id: i64,
    pub requester_name: Option<String>,
    pub national_id: Option<String>,
    pub phone: Option<String>,
    pub location: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub items: Vec<RequestItem>,
    /// Fixture tooling pins a tracking number; `None` draws a fresh one.
    pub tracking_number: Option<String>,
}

/// Persistence seam for the platform. `RedisStore` implements it for the real
/// deployment; `MemoryStore` backs tests and local tooling.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn put_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn session_by_token(&self, token: &str) -> Result<Option<Session>, StoreError>;
    async fn delete_session(&self, token: &str) -> Result<(), StoreError>;

    async fn create_district(&self, new: NewDistrict) -> Result<District, StoreError>;
    async fn districts(&self) -> Result<Vec<District>, StoreError>;
    async fn district_by_id(&self, id: i64) -> Result<Option<District>, StoreError>;

    async fn create_food_item(&self, new: NewFoodItem) -> Result<FoodItem, StoreError>;
    async fn food_items(&self) -> Result<Vec<FoodItem>, StoreError>;
    async fn food_item_by_id(&self, id: i64) -> Result<Option<FoodItem>, StoreError>;

    async fn create_foodbank(&self, new: NewFoodBank) -> Result<FoodBank, StoreError>;
    async fn foodbanks(&self) -> Result<Vec<FoodBank>, StoreError>;
    async fn foodbank_by_id(&self, id: i64) -> Result<Option<FoodBank>, StoreError>;
    async fn foodbank_by_admin(&self, admin_id: i64) -> Result<Option<FoodBank>, StoreError>;

    async fn inventory_of(&self, foodbank_id: i64) -> Result<Vec<InventoryLine>, StoreError>;
    /// Merge-or-create: an existing line for the food item gains `quantity`,
    /// otherwise a new line is opened.
    async fn add_inventory(
        &self,
        foodbank_id: i64,
        food_item_id: i64,
        quantity: u32,
    ) -> Result<InventoryLine, StoreError>;
    /// Overwrite a line's quantity. `Ok(None)` when the line does not exist.
    async fn set_inventory_quantity(
        &self,
        foodbank_id: i64,
        line_id: i64,
        quantity: u32,
    ) -> Result<Option<InventoryLine>, StoreError>;

    async fn create_request(&self, new: NewRequest) -> Result<Request, StoreError>;
    async fn requests(&self) -> Result<Vec<Request>, StoreError>;
    async fn request_by_id(&self, id: i64) -> Result<Option<Request>, StoreError>;
    async fn request_by_tracking(&self, tracking: &str) -> Result<Option<Request>, StoreError>;
    /// Compare-and-swap on `version`: the write only lands if the stored
    /// request still carries `expected_version`, and the stored copy comes
    /// back with the version bumped.
    async fn update_request(
        &self,
        updated: &Request,
        expected_version: u64,
    ) -> Result<Request, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    next_id: HashMap<&'static str, i64>,
    users: BTreeMap<i64, User>,
    usernames: HashMap<String, i64>,
    sessions: HashMap<String, Session>,
    districts: BTreeMap<i64, District>,
    food_items: BTreeMap<i64, FoodItem>,
    foodbanks: BTreeMap<i64, FoodBank>,
    bank_admins: HashMap<i64, i64>,
    inventory: BTreeMap<i64, InventoryLine>,
    requests: BTreeMap<i64, Request>,
    tracking_index: HashMap<String, i64>,
}

impl MemoryInner {
    fn next(&mut self, entity: &'static str) -> i64 {
        let counter = self.next_id.entry(entity).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// In-memory [`Store`]. One lock over the whole state keeps cross-map writes
/// (tracking claim plus request insert) atomic, mirroring what the Redis
/// backend gets from `HSETNX`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.usernames.contains_key(&new.username) {
            return Err(StoreError::Duplicate("username"));
        }
        let id = inner.next("users");
        let user = User {
            id,
            username: new.username.clone(),
            email: new.email,
            hashed_password: new.hashed_password,
            role: new.role,
            is_active: true,
            created_at: Utc::now(),
        };
        inner.usernames.insert(new.username, id);
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.lock().await.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.inner.lock().await.sessions.remove(token);
        Ok(())
    }

    async fn create_district(&self, new: NewDistrict) -> Result<District, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.districts.values().any(|d| d.name == new.name) {
            return Err(StoreError::Duplicate("district"));
        }
        let id = inner.next("districts");
        let district = District {
            id,
            name: new.name,
            state: new.state,
            geojson: new.geojson,
        };
        inner.districts.insert(id, district.clone());
        Ok(district)
    }

    async fn districts(&self) -> Result<Vec<District>, StoreError> {
        Ok(self.inner.lock().await.districts.values().cloned().collect())
    }

    async fn district_by_id(&self, id: i64) -> Result<Option<District>, StoreError> {
        Ok(self.inner.lock().await.districts.get(&id).cloned())
    }

    async fn create_food_item(&self, new: NewFoodItem) -> Result<FoodItem, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.food_items.values().any(|f| f.name == new.name) {
            return Err(StoreError::Duplicate("food item"));
        }
        let id = inner.next("food_items");
        let item = FoodItem {
            id,
            name: new.name,
            icon: new.icon,
            category: new.category,
        };
        inner.food_items.insert(id, item.clone());
        Ok(item)
    }

    async fn food_items(&self) -> Result<Vec<FoodItem>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .food_items
            .values()
            .cloned()
            .collect())
    }

    async fn food_item_by_id(&self, id: i64) -> Result<Option<FoodItem>, StoreError> {
        Ok(self.inner.lock().await.food_items.get(&id).cloned())
    }

    async fn create_foodbank(&self, new: NewFoodBank) -> Result<FoodBank, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.bank_admins.contains_key(&new.admin_id) {
            return Err(StoreError::Duplicate("a food bank for this operator"));
        }
        let id = inner.next("foodbanks");
        let bank = FoodBank {
            id,
            name: new.name,
            location: new.location,
            district: new.district,
            contact_info: new.contact_info,
            admin_id: new.admin_id,
            latitude: new.latitude,
            longitude: new.longitude,
            created_at: Utc::now(),
        };
        inner.bank_admins.insert(new.admin_id, id);
        inner.foodbanks.insert(id, bank.clone());
        Ok(bank)
    }

    async fn foodbanks(&self) -> Result<Vec<FoodBank>, StoreError> {
        Ok(self.inner.lock().await.foodbanks.values().cloned().collect())
    }

    async fn foodbank_by_id(&self, id: i64) -> Result<Option<FoodBank>, StoreError> {
        Ok(self.inner.lock().await.foodbanks.get(&id).cloned())
    }

    async fn foodbank_by_admin(&self, admin_id: i64) -> Result<Option<FoodBank>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bank_admins
            .get(&admin_id)
            .and_then(|id| inner.foodbanks.get(id))
            .cloned())
    }

    async fn inventory_of(&self, foodbank_id: i64) -> Result<Vec<InventoryLine>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .inventory
            .values()
            .filter(|line| line.foodbank_id == foodbank_id)
            .cloned()
            .collect())
    }

    async fn add_inventory(
        &self,
        foodbank_id: i64,
        food_item_id: i64,
        quantity: u32,
    ) -> Result<InventoryLine, StoreError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .inventory
            .values()
            .find(|line| line.foodbank_id == foodbank_id && line.food_item_id == food_item_id)
            .map(|line| line.id);
        if let Some(line_id) = existing {
            let line = inner
                .inventory
                .get_mut(&line_id)
                .ok_or_else(|| StoreError::Backend("inventory line vanished".into()))?;
            line.quantity += quantity;
            line.last_updated = Utc::now();
            return Ok(line.clone());
        }
        let id = inner.next("inventory");
        let line = InventoryLine {
            id,
            foodbank_id,
            food_item_id,
            quantity,
            last_updated: Utc::now(),
        };
        inner.inventory.insert(id, line.clone());
        Ok(line)
    }

    async fn set_inventory_quantity(
        &self,
        foodbank_id: i64,
        line_id: i64,
        quantity: u32,
    ) -> Result<Option<InventoryLine>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(line) = inner.inventory.get_mut(&line_id) else {
            return Ok(None);
        };
        if line.foodbank_id != foodbank_id {
            return Ok(None);
        }
        line.quantity = quantity;
        line.last_updated = Utc::now();
        Ok(Some(line.clone()))
    }

    async fn create_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        let mut inner = self.inner.lock().await;
        let tracking_number = match new.tracking_number {
            Some(pinned) => {
                if inner.tracking_index.contains_key(&pinned) {
                    return Err(StoreError::Duplicate("tracking number"));
                }
                pinned
            }
            None => loop {
                let candidate = tracking::candidate();
                if !inner.tracking_index.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        let id = inner.next("requests");
        let request = Request {
            id,
            tracking_number: tracking_number.clone(),
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
        inner.tracking_index.insert(tracking_number, id);
        inner.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn requests(&self) -> Result<Vec<Request>, StoreError> {
        Ok(self.inner.lock().await.requests.values().cloned().collect())
    }

    async fn request_by_id(&self, id: i64) -> Result<Option<Request>, StoreError> {
        Ok(self.inner.lock().await.requests.get(&id).cloned())
    }

    async fn request_by_tracking(&self, tracking: &str) -> Result<Option<Request>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tracking_index
            .get(tracking)
            .and_then(|id| inner.requests.get(id))
            .cloned())
    }

    async fn update_request(
        &self,
        updated: &Request,
        expected_version: u64,
    ) -> Result<Request, StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .requests
            .get(&updated.id)
            .ok_or_else(|| StoreError::Backend("unknown request id".into()))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict);
        }
        let mut next = updated.clone();
        next.version = expected_version + 1;
        inner.requests.insert(next.id, next.clone());
        Ok(next)
    }
}
