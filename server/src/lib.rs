//! REST backend of the B40 food-aid coordination platform.
//!
//! Households submit food-aid requests, coordinating organizations route them
//! to district food banks, and the banks fulfill them. Requesters without an
//! account follow their request through an opaque tracking number.
//!
//!
//!
//! # Roles
//!
//! - `user`: submits requests, sees only their own
//! - `foodbank`: operates one bank, works the Pending pool of its district
//!   and the requests assigned to it
//! - `org`: coordinating staff, full visibility, assigns and cancels
//!
//! Role checks happen in the handlers on every call. The frontend gates its
//! screens on the same role claim, but that is cosmetics, not enforcement.
//!
//!
//!
//! # Request lifecycle
//!
//! `Pending -> Assigned -> Fulfilled`, with `Cancelled` reachable from the
//! two non-terminal states. The edge table, the per-edge role permissions
//! and the field effects live in the `aid` crate; handlers resolve the
//! caller to an actor and let the table decide.
//!
//! Updates carry an optimistic concurrency token (`version`). Two org users
//! assigning the same Pending request at once: one wins, the other gets a
//! 409 and reloads.
//!
//!
//!
//! # Storage
//!
//! Redis, through the `Store` trait. Entities are JSON blobs in hashes with
//! INCR counters for ids; uniqueness (usernames, tracking numbers, district
//! names) rides on HSETNX claims; inventory merges are HINCRBY. See the
//! `database` module docs for the exact key layout. Tests swap in the
//! in-memory implementation and never need a running Redis.
//!
//!
//!
//! # Setup
//!
//! Environment:
//!
//! ```sh
//! FOODAID_PORT=8000
//! REDIS_URL=redis://127.0.0.1:6379
//! FOODAID_SESSION_TTL=43200
//! RUST_LOG=info
//! ```
//!
//! Seed reference data and demo accounts:
//!
//! ```sh
//! cargo run -p seed
//! ```
//!
//! Run the server:
//!
//! ```sh
//! cargo run -p foodaid
//! ```
//!
//! Smoke-test a deployment end to end:
//!
//! ```sh
//! cargo run -p tester -- --address http://127.0.0.1:8000
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use routes::{foodbanks, org, public, requests, users};
use state::AppState;

/// The full route table over a ready state. Tests build this directly with a
/// `MemoryStore` behind the state.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(public::root))
        .route("/api/health", get(public::health))
        .route("/token", post(users::login))
        .route("/register", post(users::register))
        .route("/logout", post(users::logout))
        .route("/api/users/me", get(users::me))
        .route("/api/users/{user_id}", get(users::user_by_id))
        .route("/api/public/requests", post(public::create_public_request))
        .route("/api/public/track/{tracking_number}", get(public::track_request))
        .route("/api/public/foodbanks", get(public::public_foodbanks))
        .route("/api/public/districts", get(public::public_districts))
        .route("/api/public/food-items", get(public::public_food_items))
        .route(
            "/api/requests",
            get(requests::list_requests).post(requests::create_request),
        )
        .route(
            "/api/requests/{request_id}",
            get(requests::get_request).put(requests::update_request),
        )
        .route(
            "/api/foodbanks",
            get(foodbanks::list_foodbanks).post(foodbanks::create_foodbank),
        )
        .route("/api/foodbanks/{foodbank_id}", get(foodbanks::get_foodbank))
        .route(
            "/api/foodbanks/{foodbank_id}/inventory",
            get(foodbanks::list_inventory).post(foodbanks::add_inventory_line),
        )
        .route(
            "/api/foodbanks/{foodbank_id}/inventory/{line_id}",
            put(foodbanks::set_inventory_line),
        )
        .route(
            "/api/districts",
            get(org::list_districts).post(org::create_district),
        )
        .route("/api/districts/{district_id}", get(org::get_district))
        .route(
            "/api/food-items",
            get(org::list_food_items).post(org::create_food_item),
        )
        .route("/api/stats/dashboard", get(org::dashboard_stats))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
