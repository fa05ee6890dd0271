// Relevance search: keyword scoring, scorer fallback and structured filters

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{Value, json};
use trailshare::services::{Candidate, RelevanceScorer, ScoringError};
use uuid::Uuid;

mod common;
use common::{FailingScorer, TestApp, TestUser};

/// Scores listings by how short their title is, to tell its output apart from keyword scores
struct ShortTitleScorer;

#[async_trait]
impl RelevanceScorer for ShortTitleScorer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn score(&self, _query: &str, candidates: &[Candidate]) -> Result<HashMap<Uuid, u8>, ScoringError> {
        Ok(candidates
            .iter()
            .map(|c| (c.id, u8::try_from(100usize.saturating_sub(c.title.len())).unwrap_or(0)))
            .collect())
    }
}

async fn seed(app: &TestApp, owner: &TestUser) {
    for (title, description, category, price, coords) in [
        ("Ultralight tent", "Two person tent, 900 g", "camping", 2500, Some((47.37, 8.54))),
        ("Sleeping bag", "Comfortable down to -5, pairs well with a tent", "camping", 1200, Some((46.95, 7.45))),
        ("Climbing rope", "60 m dynamic rope", "climbing", 900, None),
        ("Big family tent", "Sleeps six", "camping", 4000, None),
    ] {
        let mut body = json!({
            "title": title,
            "description": description,
            "category": category,
            "condition": "good",
            "price_per_day_cents": price
        });
        if let Some((lat, lng)) = coords {
            body["latitude"] = json!(lat);
            body["longitude"] = json!(lng);
        }
        app.create_listing(owner, body).await;
    }
}

fn titles(body: &Value) -> Vec<String> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_query_is_required() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/search", None).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/search?q=%20%20", None).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_keyword_ranking() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    seed(&app, &owner).await;

    let response = app.get("/search?q=tent", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["scorer"], "keyword");
    assert_eq!(response.body["query"], "tent");

    let found = titles(&response.body);
    assert_eq!(found.len(), 3);
    assert!(!found.contains(&"Climbing rope".to_string()));
    // Title matches outrank a description-only match
    assert_eq!(found[2], "Sleeping bag");

    let first = &response.body["results"][0];
    assert!(first["score"].as_u64().unwrap() > 0);
    assert!(first["id"].is_string(), "listing fields are inlined");
}

#[tokio::test]
async fn test_unmatched_query_scores_everything() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    seed(&app, &owner).await;

    let response = app.get("/search?q=kayak&limit=2", None).await;
    assert_eq!(titles(&response.body).len(), 2);
    assert_eq!(response.body["results"][0]["score"], 0);
}

#[tokio::test]
async fn test_structured_filters() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    seed(&app, &owner).await;

    let cheap = app.get("/search?q=tent&max_price=2500&category=CAMPING", None).await;
    let mut found = titles(&cheap.body);
    found.sort();
    assert_eq!(found, vec!["Sleeping bag", "Ultralight tent"]);

    let near = app.get("/search?q=tent&lat=47.3&lng=8.5&radius_km=30", None).await;
    assert_eq!(titles(&near.body), vec!["Ultralight tent"]);
    let distance = near.body["results"][0]["distance_km"].as_f64().unwrap();
    assert!(distance > 5.0 && distance < 15.0, "distance {distance}");
}

#[tokio::test]
async fn test_unavailable_listings_are_hidden() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let tent = app.tent(&owner).await;
    app.put(&format!("/equipment/{tent}"), Some(&owner.token), json!({"is_available": false}))
        .await;

    let response = app.get("/search?q=tent", None).await;
    assert!(titles(&response.body).is_empty());
}

#[tokio::test]
async fn test_configured_scorer_is_used() {
    let app = TestApp::with(|state| state.with_scorer(Arc::new(ShortTitleScorer))).await;
    let owner = app.signup("owner@example.com", "Owner").await;
    seed(&app, &owner).await;

    let response = app.get("/search?q=tent", None).await;
    assert_eq!(response.body["scorer"], "llm");
    assert_eq!(titles(&response.body)[0], "Sleeping bag");
}

#[tokio::test]
async fn test_failing_scorer_falls_back_to_keywords() {
    let app = TestApp::with(|state| state.with_scorer(Arc::new(FailingScorer))).await;
    let owner = app.signup("owner@example.com", "Owner").await;
    seed(&app, &owner).await;

    let response = app.get("/search?q=tent", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["scorer"], "keyword");
    assert_eq!(titles(&response.body).len(), 3);
    assert_eq!(titles(&response.body)[2], "Sleeping bag");
}
