//! # Seeding
//!
//! Populates a store with everything a demo deployment needs: districts and
//! food items (reference data), one account per role, two district food banks
//! with stocked inventory, and three sample requests pinned to well-known
//! tracking numbers so the tracking page can be shown without submitting
//! first.
//!
//! Seeding is idempotent at the run level: if the `orgadmin` account already
//! exists the whole run is skipped, so pointing it at a live store twice is
//! harmless.
//!
//! The sample requests are driven through the real lifecycle rules rather
//! than written in their final state, so the seeded data can never disagree
//! with the state machine.

use anyhow::Result;
use serde_json::json;

use aid::{
    lifecycle::{Actor, transition},
    model::{RequestItem, Role, Status},
};
use foodaid::{
    auth::hash_password,
    store::{NewDistrict, NewFoodBank, NewFoodItem, NewRequest, NewUser, Store},
};

/// Every demo account logs in with this.
pub const DEMO_PASSWORD: &str = "password";

fn districts() -> Vec<NewDistrict> {
    let polygon = |name: &str, state: &str, ring: [[f64; 2]; 5]| NewDistrict {
        name: name.to_string(),
        state: state.to_string(),
        geojson: json!({
            "type": "Feature",
            "properties": { "name": name },
            "geometry": { "type": "Polygon", "coordinates": [ring] },
        })
        .to_string(),
    };

    vec![
        polygon(
            "Kuala Lumpur",
            "Federal Territory",
            [[101.6, 3.05], [101.8, 3.05], [101.8, 3.18], [101.6, 3.18], [101.6, 3.05]],
        ),
        polygon(
            "Petaling Jaya",
            "Selangor",
            [[101.5, 3.05], [101.65, 3.05], [101.65, 3.15], [101.5, 3.15], [101.5, 3.05]],
        ),
        polygon(
            "Johor Bahru",
            "Johor",
            [[103.7, 1.45], [103.8, 1.45], [103.8, 1.55], [103.7, 1.55], [103.7, 1.45]],
        ),
    ]
}

fn food_items() -> Vec<NewFoodItem> {
    [
        ("Rice", "rice.svg", "Basic"),
        ("Eggs", "eggs.svg", "Protein"),
        ("Cooking Oil", "oil.svg", "Basic"),
        ("Infant Formula", "formula.svg", "Baby"),
        ("Diapers", "diaper.svg", "Baby"),
        ("Flour", "flour.svg", "Basic"),
        ("Canned Sardines", "sardines.svg", "Protein"),
        ("Milk", "milk.svg", "Dairy"),
        ("Instant Noodles", "noodles.svg", "Basic"),
    ]
    .into_iter()
    .map(|(name, icon, category)| NewFoodItem {
        name: name.to_string(),
        icon: icon.to_string(),
        category: category.to_string(),
    })
    .collect()
}

fn accounts() -> Vec<NewUser> {
    [
        ("orgadmin", "org@example.com", Role::Org),
        ("foodbank1", "fb1@example.com", Role::Foodbank),
        ("foodbank2", "fb2@example.com", Role::Foodbank),
        ("user1", "user1@example.com", Role::User),
        ("user2", "user2@example.com", Role::User),
    ]
    .into_iter()
    .map(|(username, email, role)| NewUser {
        username: username.to_string(),
        email: email.to_string(),
        hashed_password: hash_password(DEMO_PASSWORD),
        role,
    })
    .collect()
}

/// Seed everything. Returns `false` when the store already holds the demo
/// accounts and nothing was written.
pub async fn seed_all(store: &dyn Store) -> Result<bool> {
    if store.user_by_username("orgadmin").await?.is_some() {
        return Ok(false);
    }

    for district in districts() {
        store.create_district(district).await?;
    }
    println!("Seeded Districts: 3");

    for item in food_items() {
        store.create_food_item(item).await?;
    }
    println!("Seeded Food Items: 9");

    let mut users = Vec::new();
    for account in accounts() {
        users.push(store.create_user(account).await?);
    }
    println!("Seeded Accounts: {}", users.len());

    let kl_bank = store
        .create_foodbank(NewFoodBank {
            name: "KL Food Bank".to_string(),
            location: "Sentul".to_string(),
            district: "Kuala Lumpur".to_string(),
            contact_info: "03-12345678".to_string(),
            admin_id: users[1].id,
            latitude: 3.1746,
            longitude: 101.6975,
        })
        .await?;
    let pj_bank = store
        .create_foodbank(NewFoodBank {
            name: "PJ Relief Center".to_string(),
            location: "Damansara".to_string(),
            district: "Petaling Jaya".to_string(),
            contact_info: "03-87654321".to_string(),
            admin_id: users[2].id,
            latitude: 3.1569,
            longitude: 101.6304,
        })
        .await?;
    println!("Seeded Food Banks: 2");

    // (bank, food item index, quantity)
    let stock = [
        (kl_bank.id, 0, 50),
        (kl_bank.id, 1, 30),
        (kl_bank.id, 2, 20),
        (kl_bank.id, 8, 100),
        (pj_bank.id, 0, 40),
        (pj_bank.id, 3, 15),
        (pj_bank.id, 4, 25),
        (pj_bank.id, 7, 35),
    ];
    let items = store.food_items().await?;
    for (bank_id, index, quantity) in stock {
        store.add_inventory(bank_id, items[index].id, quantity).await?;
    }
    println!("Seeded Inventory Lines: {}", stock.len());

    let sample_request = |user_id, tracking: &str, location: &str, district: &str, lat, lon, lines: &[(usize, u32)]| NewRequest {
        user_id,
        requester_name: None,
        national_id: None,
        phone: None,
        location: location.to_string(),
        district: district.to_string(),
        latitude: lat,
        longitude: lon,
        items: lines
            .iter()
            .map(|&(index, quantity)| RequestItem {
                food_item_id: items[index].id,
                quantity,
            })
            .collect(),
        tracking_number: Some(tracking.to_string()),
    };

    // A fresh submission, one mid-assignment, one already fulfilled.
    store
        .create_request(sample_request(
            users[3].id,
            "B40-ABC123",
            "Kampung Baru, Kuala Lumpur",
            "Kuala Lumpur",
            3.1678,
            101.7069,
            &[(0, 1), (1, 1)],
        ))
        .await?;

    let assigned = store
        .create_request(sample_request(
            users[3].id,
            "B40-DEF456",
            "Pantai Dalam, Kuala Lumpur",
            "Kuala Lumpur",
            3.1106,
            101.6691,
            &[(0, 1), (2, 1), (8, 2)],
        ))
        .await?;
    let updated = transition(&assigned, Status::Assigned, Actor::Org, Some(kl_bank.id))?;
    store.update_request(&updated, assigned.version).await?;

    let fulfilled = store
        .create_request(sample_request(
            users[4].id,
            "B40-GHI789",
            "SS2, Petaling Jaya",
            "Petaling Jaya",
            3.1179,
            101.6231,
            &[(3, 1), (4, 1)],
        ))
        .await?;
    let updated = transition(&fulfilled, Status::Assigned, Actor::Org, Some(pj_bank.id))?;
    let updated = store.update_request(&updated, fulfilled.version).await?;
    let done = transition(
        &updated,
        Status::Fulfilled,
        Actor::Foodbank {
            foodbank_id: pj_bank.id,
        },
        None,
    )?;
    store.update_request(&done, updated.version).await?;
    println!("Seeded Requests: 3");

    Ok(true)
}
