// Listing CRUD, filtering, pagination and location queries

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;
use trailshare::{entities::user_role::Role, services::Coordinates};

mod common;
use common::{FixedGeocoder, TestApp, content_range, filter_uri, id_of};

fn listing(title: &str, category: &str, price: i64) -> serde_json::Value {
    json!({
        "title": title,
        "description": format!("{title} for rent"),
        "category": category,
        "condition": "excellent",
        "price_per_day_cents": price
    })
}

#[tokio::test]
async fn test_create_and_get_listing() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;

    let created = app.create_listing(&owner, listing("Climbing rope", " Climbing ", 800)).await;
    assert_eq!(created["owner_id"], owner.id.to_string());
    assert_eq!(created["category"], "climbing");
    assert_eq!(created["deposit_cents"], 0);
    assert_eq!(created["is_available"], true);
    assert_eq!(created["is_featured"], false);

    let fetched = app.get(&format!("/equipment/{}", id_of(&created)), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["title"], "Climbing rope");
    assert_eq!(fetched.body["images"], json!([]));
}

#[tokio::test]
async fn test_create_requires_authentication() {
    let app = TestApp::new().await;
    let response = app.post("/equipment", None, listing("Stove", "cooking", 500)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_validation() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let response = app
        .post(
            "/equipment",
            Some(&owner.token),
            json!({
                "title": "ab",
                "description": "",
                "category": " ",
                "condition": "good",
                "price_per_day_cents": 0,
                "deposit_cents": -1,
                "latitude": 95.0,
                "longitude": 8.0
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let details = response.body["details"].as_array().unwrap();
    for field in ["title", "category", "price_per_day_cents", "deposit_cents", "latitude"] {
        assert!(
            details.iter().any(|d| d.as_str().unwrap().starts_with(field)),
            "missing error for {field}: {details:?}"
        );
    }
}

#[tokio::test]
async fn test_location_is_geocoded() {
    let point = Coordinates {
        latitude: 46.62,
        longitude: 8.03,
    };
    let app = TestApp::with(|state| state.with_geocoder(Arc::new(FixedGeocoder(Some(point))))).await;
    let owner = app.signup("owner@example.com", "Owner").await;

    let mut body = listing("Snowshoes", "winter", 1200);
    body["location"] = json!("Grindelwald");
    let created = app.create_listing(&owner, body).await;
    assert_eq!(created["latitude"], 46.62);
    assert_eq!(created["longitude"], 8.03);

    // Explicit coordinates win over the geocoder
    let mut body = listing("Ice axe", "winter", 900);
    body["location"] = json!("Grindelwald");
    body["latitude"] = json!(45.0);
    body["longitude"] = json!(7.0);
    let created = app.create_listing(&owner, body).await;
    assert_eq!(created["latitude"], 45.0);
}

#[tokio::test]
async fn test_unresolved_location_keeps_no_coordinates() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let mut body = listing("Kayak", "water", 4000);
    body["location"] = json!("Somewhere");
    let created = app.create_listing(&owner, body).await;
    assert_eq!(created["location"], "Somewhere");
    assert!(created["latitude"].is_null());
}

#[tokio::test]
async fn test_update_is_partial_and_owner_only() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let stranger = app.signup("stranger@example.com", "Stranger").await;
    let mut body = listing("Camp stove", "cooking", 500);
    body["location"] = json!("Bern");
    let id = id_of(&app.create_listing(&owner, body).await);

    let forbidden = app
        .put(&format!("/equipment/{id}"), Some(&stranger.token), json!({"title": "Mine now"}))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let updated = app
        .put(
            &format!("/equipment/{id}"),
            Some(&owner.token),
            json!({"price_per_day_cents": 650, "location": null}),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["title"], "Camp stove");
    assert_eq!(updated.body["price_per_day_cents"], 650);
    assert!(updated.body["location"].is_null());

    // Admins may edit any listing
    let admin = app.signup("admin@example.com", "Admin").await;
    app.grant(&admin, Role::Admin).await;
    let by_admin = app
        .put(&format!("/equipment/{id}"), Some(&admin.token), json!({"is_available": false}))
        .await;
    assert_eq!(by_admin.status, StatusCode::OK);
    assert_eq!(by_admin.body["is_available"], false);
}

#[tokio::test]
async fn test_list_filters_sorts_and_paginates() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    for (title, category, price) in [
        ("Dome tent", "camping", 1500),
        ("Tunnel tent", "camping", 2500),
        ("Sleeping bag", "camping", 900),
        ("Harness", "climbing", 700),
        ("Quickdraws", "climbing", 400),
    ] {
        app.create_listing(&owner, listing(title, category, price)).await;
    }

    let all = app.get("/equipment", None).await;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(content_range(&all), "equipment 0-4/5");

    let camping = app
        .get(&filter_uri("/equipment", &json!({"category": "CAMPING"})), None)
        .await;
    assert_eq!(camping.body.as_array().unwrap().len(), 3);

    let cheap = app
        .get(
            &format!(
                "{}&sort=price_per_day_cents&order=ASC",
                filter_uri("/equipment", &json!({"price_per_day_cents_lte": 900}))
            ),
            None,
        )
        .await;
    let prices: Vec<i64> = cheap
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["price_per_day_cents"].as_i64().unwrap())
        .collect();
    assert_eq!(prices, vec![400, 700, 900]);

    let search = app.get(&filter_uri("/equipment", &json!({"q": "TENT"})), None).await;
    assert_eq!(search.body.as_array().unwrap().len(), 2);

    let page = app.get("/equipment?page=2&per_page=2", None).await;
    assert_eq!(page.body.as_array().unwrap().len(), 2);
    assert_eq!(content_range(&page), "equipment 2-3/5");

    let range = app.get("/equipment?range=%5B4%2C9%5D", None).await;
    assert_eq!(range.body.as_array().unwrap().len(), 1);

    // Columns that are not filterable are ignored rather than rejected
    let ignored = app
        .get(&filter_uri("/equipment", &json!({"password_hash": "x"})), None)
        .await;
    assert_eq!(ignored.body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_near_a_point() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    for (title, lat, lng) in [("Zurich tent", 47.37, 8.54), ("Bern tent", 46.95, 7.45), ("Paris tent", 48.86, 2.35)] {
        let mut body = listing(title, "camping", 1000);
        body["latitude"] = json!(lat);
        body["longitude"] = json!(lng);
        app.create_listing(&owner, body).await;
    }
    app.create_listing(&owner, listing("Nowhere tent", "camping", 1000)).await;

    let near = app.get("/equipment?lat=47.3&lng=8.5&radius_km=30", None).await;
    let titles: Vec<&str> = near
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Zurich tent"]);

    let wide = app.get("/equipment?lat=47.3&lng=8.5&radius_km=150", None).await;
    assert_eq!(wide.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_viewing_records_recently_viewed() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let viewer = app.signup("viewer@example.com", "Viewer").await;
    let id = app.tent(&owner).await;

    app.get(&format!("/equipment/{id}"), None).await;
    app.get(&format!("/equipment/{id}"), Some(&viewer.token)).await;

    let viewed = app.get("/me/recently-viewed", Some(&viewer.token)).await;
    let items = viewed.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["equipment"]["id"], id.to_string());
}

#[tokio::test]
async fn test_delete_listing_removes_everything() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let fan = app.signup("fan@example.com", "Fan").await;
    let id = app.tent(&owner).await;
    let image = app.upload(&owner, id, "tent.png", common::PNG).await;
    assert_eq!(image.status, StatusCode::CREATED);
    let favorite = app
        .request(Method::PUT, &format!("/me/favorites/{id}"), Some(&fan.token), None)
        .await;
    assert_eq!(favorite.status, StatusCode::NO_CONTENT);

    let stranger = app.delete(&format!("/equipment/{id}"), Some(&fan.token)).await;
    assert_eq!(stranger.status, StatusCode::FORBIDDEN);

    let deleted = app.delete(&format!("/equipment/{id}"), Some(&owner.token)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&format!("/equipment/{id}"), None).await.status, StatusCode::NOT_FOUND);

    let favorites = app.get("/me/favorites", Some(&fan.token)).await;
    assert_eq!(favorites.body, json!([]));
    let stored = app.storage_root.join("equipment").join(id.to_string());
    let leftover = std::fs::read_dir(&stored).map(|entries| entries.count()).unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_batch_delete_is_admin_only() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let admin = app.signup("admin@example.com", "Admin").await;
    app.grant(&admin, Role::Admin).await;
    let first = app.tent(&owner).await;
    let second = app.tent(&owner).await;
    let missing = uuid::Uuid::new_v4();

    let denied = app
        .request(
            Method::DELETE,
            "/equipment/batch",
            Some(&owner.token),
            Some(json!([first])),
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let deleted = app
        .request(
            Method::DELETE,
            "/equipment/batch",
            Some(&admin.token),
            Some(json!([first, second, missing])),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let mut ids: Vec<String> = deleted
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    ids.sort();
    let mut expected = vec![first.to_string(), second.to_string()];
    expected.sort();
    assert_eq!(ids, expected);
}
