//! Entities shared across the platform.
//!
//! Field names match the JSON the original deployment's clients already
//! speak, so serde derives double as the wire contract.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of account roles. Role strings on the wire are lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Foodbank,
    Org,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Foodbank => "foodbank",
            Role::Org => "org",
        };
        f.write_str(name)
    }
}

/// Request status. `Pending` is the initial state; `Fulfilled` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Assigned,
    Fulfilled,
    Cancelled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Fulfilled | Status::Cancelled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Pending => "Pending",
            Status::Assigned => "Assigned",
            Status::Fulfilled => "Fulfilled",
            Status::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// `salt$hex-digest`; never serialized out of the server, see `UserView`.
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user account that handlers may return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodBank {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub district: String,
    pub contact_info: String,
    /// Operator account (role `foodbank`) that administers this bank.
    pub admin_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

/// Reference data: one orderable item, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub category: String,
}

/// One inventory line of a food bank. Quantities never go below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLine {
    pub id: i64,
    pub foodbank_id: i64,
    pub food_item_id: i64,
    pub quantity: u32,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
    pub state: String,
    /// GeoJSON feature, stored verbatim as a string.
    pub geojson: String,
}

/// One requested line item. Submissions are capped at quantity 3 per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub food_item_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    /// Opaque public lookup key, assigned at creation, immutable.
    pub tracking_number: String,
    pub user_id: i64,
    /// Contact details captured on public submissions; `None` on
    /// authenticated ones (the linked account is the contact). Excluded from
    /// the public tracking projection.
    pub requester_name: Option<String>,
    pub national_id: Option<String>,
    pub phone: Option<String>,
    /// Delivery address.
    pub location: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: Status,
    pub assigned_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every successful update; the optimistic
    /// concurrency token for transitions.
    pub version: u64,
    pub items: Vec<RequestItem>,
}
