//! End-to-end tests over the full route table with the in-memory store.
//! Every call goes through the router, so auth, validation and the lifecycle
//! rules are exercised exactly as a deployed client would hit them.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use foodaid::{app, config::Config, state::AppState, store::MemoryStore};

fn test_app() -> Router {
    let config = Config {
        port: 0,
        redis_url: String::new(),
        session_ttl_secs: 3600,
    };
    app(AppState::with_store(config, Arc::new(MemoryStore::new())))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    send(app, Method::GET, uri, token, None).await
}

async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, token, Some(body)).await
}

async fn put(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, token, Some(body)).await
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK, "login for {username}");
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: Value = serde_json::from_slice(&bytes).expect("token body");
    json["access_token"].as_str().expect("access token").to_string()
}

/// A router with demo accounts, reference data and two district food banks,
/// all created through the public API.
struct Harness {
    app: Router,
    org: String,
    bank1: String,
    bank2: String,
    user: String,
    bank1_id: i64,
    bank2_id: i64,
}

async fn harness() -> Harness {
    let app = test_app();

    let accounts = [
        ("orgadmin", "org"),
        ("foodbank1", "foodbank"),
        ("foodbank2", "foodbank"),
        ("user1", "user"),
    ];
    let mut ids = Vec::new();
    for (username, role) in accounts {
        let (status, body) = post(
            &app,
            "/register",
            None,
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password",
                "role": role,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "register {username}: {body}");
        ids.push(body["id"].as_i64().expect("user id"));
    }

    let org = login(&app, "orgadmin", "password").await;
    let bank1 = login(&app, "foodbank1", "password").await;
    let bank2 = login(&app, "foodbank2", "password").await;
    let user = login(&app, "user1", "password").await;

    for (name, state) in [("Kuala Lumpur", "Federal Territory"), ("Petaling Jaya", "Selangor")] {
        let (status, _) = post(
            &app,
            "/api/districts",
            Some(&org),
            json!({ "name": name, "state": state, "geojson": "{}" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    for (name, category) in [("Rice", "Basic"), ("Eggs", "Protein")] {
        let (status, _) = post(
            &app,
            "/api/food-items",
            Some(&org),
            json!({ "name": name, "icon": format!("{}.svg", name.to_lowercase()), "category": category }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = post(
        &app,
        "/api/foodbanks",
        Some(&org),
        json!({
            "name": "KL Food Bank",
            "location": "Sentul",
            "district": "Kuala Lumpur",
            "contact_info": "03-12345678",
            "admin_id": ids[1],
            "latitude": 3.1746,
            "longitude": 101.6975,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bank1_id = body["id"].as_i64().expect("bank id");

    let (status, body) = post(
        &app,
        "/api/foodbanks",
        Some(&org),
        json!({
            "name": "PJ Relief Center",
            "location": "Damansara",
            "district": "Petaling Jaya",
            "contact_info": "03-87654321",
            "admin_id": ids[2],
            "latitude": 3.1569,
            "longitude": 101.6304,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let bank2_id = body["id"].as_i64().expect("bank id");

    Harness {
        app,
        org,
        bank1,
        bank2,
        user,
        bank1_id,
        bank2_id,
    }
}

/// Submit through the public form; returns (request id, tracking number).
async fn submit_public(app: &Router, ic: &str, district: &str) -> (i64, String) {
    let (status, body) = post(
        app,
        "/api/public/requests",
        None,
        json!({
            "first_name": "Aminah",
            "last_name": "Binti Yusof",
            "ic_number": ic,
            "address": "12 Jalan Kebun",
            "district": district,
            "phone_number": "012-3456789",
            "latitude": 3.16,
            "longitude": 101.7,
            "items": [{ "food_item_id": 1, "quantity": 2 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["request_id"].as_i64().expect("request id"),
        body["tracking_number"].as_str().expect("tracking").to_string(),
    )
}

mod public_flow {
    use super::*;

    #[tokio::test]
    async fn submission_issues_a_tracking_number_and_starts_pending() {
        let h = harness().await;
        let (id, tracking) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;
        assert!(tracking.starts_with("B40-"));

        let (status, body) = get(&h.app, &format!("/api/requests/{id}"), Some(&h.org)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Pending");
        assert_eq!(body["assigned_to_id"], Value::Null);
        assert_eq!(body["fulfilled_at"], Value::Null);
        assert_eq!(body["tracking_number"], tracking.as_str());
    }

    #[tokio::test]
    async fn tracking_shows_status_but_never_personal_fields() {
        let h = harness().await;
        let (_, tracking) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, body) = get(&h.app, &format!("/api/public/track/{tracking}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Pending");
        assert_eq!(body["items"][0]["name"], "Rice");
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["foodbank"], Value::Null);

        let object = body.as_object().expect("track body");
        for hidden in [
            "requester_name",
            "national_id",
            "ic_number",
            "phone",
            "location",
            "address",
            "latitude",
            "longitude",
            "user_id",
        ] {
            assert!(!object.contains_key(hidden), "{hidden} leaked into tracking");
        }
    }

    #[tokio::test]
    async fn unknown_tracking_numbers_are_404() {
        let h = harness().await;
        let (status, _) = get(&h.app, "/api/public/track/B40-00000000", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submissions_missing_required_fields_name_the_field() {
        let h = harness().await;
        let (status, body) = post(
            &h.app,
            "/api/public/requests",
            None,
            json!({
                "first_name": "Aminah",
                "last_name": "Binti Yusof",
                "ic_number": "880101-14-5678",
                "address": "12 Jalan Kebun",
                "items": [{ "food_item_id": 1, "quantity": 1 }],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("district"));
    }

    #[tokio::test]
    async fn quantities_outside_the_cap_are_rejected() {
        let h = harness().await;
        for quantity in [0, 4, -1] {
            let (status, _) = post(
                &h.app,
                "/api/public/requests",
                None,
                json!({
                    "first_name": "Aminah",
                    "last_name": "Binti Yusof",
                    "ic_number": "880101-14-5678",
                    "address": "12 Jalan Kebun",
                    "district": "Kuala Lumpur",
                    "items": [{ "food_item_id": 1, "quantity": quantity }],
                }),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "quantity {quantity}");
        }
    }

    #[tokio::test]
    async fn unknown_food_items_are_rejected() {
        let h = harness().await;
        let (status, body) = post(
            &h.app,
            "/api/public/requests",
            None,
            json!({
                "first_name": "Aminah",
                "last_name": "Binti Yusof",
                "ic_number": "880101-14-5678",
                "address": "12 Jalan Kebun",
                "district": "Kuala Lumpur",
                "items": [{ "food_item_id": 99, "quantity": 1 }],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("99"));
    }

    #[tokio::test]
    async fn public_foodbank_listing_filters_by_district() {
        let h = harness().await;
        let (status, body) =
            get(&h.app, "/api/public/foodbanks?district=Petaling%20Jaya", None).await;
        assert_eq!(status, StatusCode::OK);
        let banks = body.as_array().expect("bank list");
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0]["name"], "PJ Relief Center");
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn org_assigns_then_the_bank_fulfills() {
        let h = harness().await;
        let (id, tracking) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, body) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": h.bank1_id }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "Assigned");
        assert_eq!(body["assigned_to_id"], h.bank1_id);

        // Assignment is public through the tracking projection, but only the
        // bank's public-safe fields.
        let (_, tracked) = get(&h.app, &format!("/api/public/track/{tracking}"), None).await;
        assert_eq!(tracked["foodbank"]["name"], "KL Food Bank");
        assert!(tracked["foodbank"].get("admin_id").is_none());

        let (status, body) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.bank1),
            json!({ "status": "Fulfilled" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "Fulfilled");
        assert!(!body["fulfilled_at"].is_null());
        assert_eq!(body["assigned_to_id"], h.bank1_id);
    }

    #[tokio::test]
    async fn fulfilled_requests_accept_no_further_transitions() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;
        put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": h.bank1_id }),
        )
        .await;
        put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.bank1),
            json!({ "status": "Fulfilled" }),
        )
        .await;

        for next in ["Pending", "Assigned", "Fulfilled", "Cancelled"] {
            let (status, body) = put(
                &h.app,
                &format!("/api/requests/{id}"),
                Some(&h.org),
                json!({ "status": next, "assigned_to_id": h.bank1_id }),
            )
            .await;
            assert_eq!(status, StatusCode::CONFLICT, "Fulfilled -> {next}: {body}");
        }
    }

    #[tokio::test]
    async fn an_unassigned_bank_cannot_fulfill() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;
        put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": h.bank1_id }),
        )
        .await;

        let (status, _) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.bank2),
            json!({ "status": "Fulfilled" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn banks_self_assign_but_cannot_hand_requests_elsewhere() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, _) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.bank1),
            json!({ "assigned_to_id": h.bank2_id }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Omitting the status on an assignment payload still means "assign".
        let (status, body) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.bank1),
            json!({ "assigned_to_id": h.bank1_id }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["assigned_to_id"], h.bank1_id);
    }

    #[tokio::test]
    async fn assigning_without_a_target_is_a_400() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, body) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("food bank"));
    }

    #[tokio::test]
    async fn assigning_to_an_unknown_bank_is_a_404() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, _) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": 99 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_org_cancels_and_cancelled_is_terminal() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        for token in [&h.user, &h.bank1] {
            let (status, _) = put(
                &h.app,
                &format!("/api/requests/{id}"),
                Some(token),
                json!({ "status": "Cancelled" }),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let (status, body) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Cancelled" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Cancelled");
        assert_eq!(body["assigned_to_id"], Value::Null);

        let (status, _) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": h.bank1_id }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn stale_versions_get_a_conflict_instead_of_clobbering() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, _) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": h.bank1_id, "version": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // A second writer still holding version 1 loses.
        let (status, body) = put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Cancelled", "version": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].as_str().unwrap().contains("concurrently"));

        let (_, current) = get(&h.app, &format!("/api/requests/{id}"), Some(&h.org)).await;
        assert_eq!(current["status"], "Assigned");
    }
}

mod visibility {
    use super::*;

    #[tokio::test]
    async fn each_role_sees_its_own_slice() {
        let h = harness().await;

        // One authenticated request from user1 in KL, one guest request in PJ.
        let (status, own) = post(
            &h.app,
            "/api/requests",
            Some(&h.user),
            json!({
                "location": "Kampung Baru",
                "district": "Kuala Lumpur",
                "latitude": 3.16,
                "longitude": 101.7,
                "items": [{ "food_item_id": 2, "quantity": 1 }],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{own}");
        submit_public(&h.app, "900303-10-1111", "Petaling Jaya").await;

        let (_, mine) = get(&h.app, "/api/requests", Some(&h.user)).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        assert_eq!(mine[0]["id"], own["id"]);

        // bank1 works KL: sees the pending KL request, not the PJ one.
        let (_, pool) = get(&h.app, "/api/requests", Some(&h.bank1)).await;
        assert_eq!(pool.as_array().unwrap().len(), 1);
        assert_eq!(pool[0]["district"], "Kuala Lumpur");

        let (_, all) = get(&h.app, "/api/requests", Some(&h.org)).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, filtered) = get(
            &h.app,
            "/api/requests?status=Pending&district=Petaling%20Jaya",
            Some(&h.org),
        )
        .await;
        assert_eq!(filtered.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn users_cannot_read_requests_of_others() {
        let h = harness().await;
        let (id, _) = submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;

        let (status, _) = get(&h.app, &format!("/api/requests/{id}"), Some(&h.user)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn authenticated_routes_reject_missing_tokens() {
        let h = harness().await;
        for uri in ["/api/requests", "/api/users/me", "/api/stats/dashboard"] {
            let (status, _) = get(&h.app, uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn logout_invalidates_the_session() {
        let h = harness().await;
        let (status, _) = get(&h.app, "/api/users/me", Some(&h.user)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post(&h.app, "/logout", Some(&h.user), json!({})).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get(&h.app, "/api/users/me", Some(&h.user)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        use aid::model::Role;
        use foodaid::{auth::Session, store::Store};

        let config = Config {
            port: 0,
            redis_url: String::new(),
            session_ttl_secs: 3600,
        };
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(config, store.clone());
        let app = app(state);

        post(
            &app,
            "/register",
            None,
            json!({
                "username": "late",
                "email": "late@example.com",
                "password": "password",
                "role": "user",
            }),
        )
        .await;

        let session = Session {
            token: "stale-token".to_string(),
            user_id: 1,
            role: Role::User,
            expires_at: chrono::Utc::now() - chrono::Duration::hours(1),
        };
        store.put_session(&session).await.unwrap();

        let (status, _) = get(&app, "/api/users/me", Some("stale-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_passwords_do_not_log_in() {
        let h = harness().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("username=orgadmin&password=nope"))
            .expect("request");
        let response = h.app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

mod inventory {
    use super::*;

    #[tokio::test]
    async fn adding_merges_and_setting_overwrites() {
        let h = harness().await;
        let uri = format!("/api/foodbanks/{}/inventory", h.bank1_id);

        let (status, first) = post(
            &h.app,
            &uri,
            Some(&h.bank1),
            json!({ "food_item_id": 1, "quantity": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{first}");
        assert_eq!(first["quantity"], 10);
        assert_eq!(first["food_item"]["name"], "Rice");

        let (_, merged) = post(
            &h.app,
            &uri,
            Some(&h.bank1),
            json!({ "food_item_id": 1, "quantity": 7 }),
        )
        .await;
        assert_eq!(merged["id"], first["id"]);
        assert_eq!(merged["quantity"], 17);

        let line_uri = format!("{uri}/{}", first["id"]);
        let (status, set) = put(&h.app, &line_uri, Some(&h.bank1), json!({ "quantity": 4 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(set["quantity"], 4);
    }

    #[tokio::test]
    async fn negative_quantities_are_rejected_and_nothing_changes() {
        let h = harness().await;
        let uri = format!("/api/foodbanks/{}/inventory", h.bank1_id);
        let (_, line) = post(
            &h.app,
            &uri,
            Some(&h.bank1),
            json!({ "food_item_id": 1, "quantity": 10 }),
        )
        .await;

        let (status, _) = put(
            &h.app,
            &format!("{uri}/{}", line["id"]),
            Some(&h.bank1),
            json!({ "quantity": -1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(
            &h.app,
            &uri,
            Some(&h.bank1),
            json!({ "food_item_id": 2, "quantity": -5 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, lines) = get(&h.app, &uri, Some(&h.bank1)).await;
        let lines = lines.as_array().expect("inventory");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["quantity"], 10);
    }

    #[tokio::test]
    async fn operators_only_touch_their_own_bank() {
        let h = harness().await;
        let uri = format!("/api/foodbanks/{}/inventory", h.bank1_id);

        let (status, _) = post(
            &h.app,
            &uri,
            Some(&h.bank2),
            json!({ "food_item_id": 1, "quantity": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Requesters may look but never modify; org staff may do both.
        let (status, _) = get(&h.app, &uri, Some(&h.user)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = post(
            &h.app,
            &uri,
            Some(&h.user),
            json!({ "food_item_id": 1, "quantity": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = post(
            &h.app,
            &uri,
            Some(&h.org),
            json!({ "food_item_id": 1, "quantity": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

mod dashboard {
    use super::*;

    #[tokio::test]
    async fn stats_are_org_only_and_count_by_district() {
        let h = harness().await;
        submit_public(&h.app, "880101-14-5678", "Kuala Lumpur").await;
        let (id, _) = submit_public(&h.app, "900303-10-1111", "Petaling Jaya").await;
        put(
            &h.app,
            &format!("/api/requests/{id}"),
            Some(&h.org),
            json!({ "status": "Assigned", "assigned_to_id": h.bank2_id }),
        )
        .await;

        for token in [&h.user, &h.bank1] {
            let (status, _) = get(&h.app, "/api/stats/dashboard", Some(token)).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let (status, stats) = get(&h.app, "/api/stats/dashboard", Some(&h.org)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_requests"], 2);
        assert_eq!(stats["pending_requests"], 1);
        assert_eq!(stats["assigned_requests"], 1);

        let districts = stats["district_stats"].as_array().expect("district stats");
        let pj = districts
            .iter()
            .find(|d| d["district"] == "Petaling Jaya")
            .expect("PJ stats");
        assert_eq!(pj["total_requests"], 1);
        assert_eq!(pj["assigned_requests"], 1);
    }
}
