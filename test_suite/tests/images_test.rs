// Image upload, duplicate detection and primary image handling

use axum::http::StatusCode;
use serde_json::Value;
use trailshare::media::content_hash;

mod common;
use common::{JPEG, PNG, TestApp, WEBP, id_of};

fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_first_upload_becomes_primary() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let id = app.tent(&owner).await;

    let first = app.upload(&owner, id, "../My Tent (1).JPEG", PNG).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["is_primary"], true);
    assert_eq!(first.body["content_type"], "image/png");
    assert_eq!(first.body["file_name"], "my-tent-1.png");
    assert_eq!(first.body["content_hash"], content_hash(PNG));

    let second = app.upload(&owner, id, "boots.jpg", JPEG).await;
    assert_eq!(second.status, StatusCode::CREATED);
    assert_eq!(second.body["is_primary"], false);

    let listed = app.get(&format!("/equipment/{id}/images"), None).await;
    let images = listed.body.as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["id"], first.body["id"]);

    let detail = app.get(&format!("/equipment/{id}"), None).await;
    assert_eq!(detail.body["images"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_uploaded_file_is_served() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let id = app.tent(&owner).await;

    let uploaded = app.upload(&owner, id, "tent.png", PNG).await;
    let url = uploaded.body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/files/equipment/"), "unexpected url {url}");

    let served = app.get(&url, None).await;
    assert_eq!(served.status, StatusCode::OK);
}

#[tokio::test]
async fn test_identical_bytes_return_existing_image() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let id = app.tent(&owner).await;

    let first = app.upload(&owner, id, "tent.png", PNG).await;
    let again = app.upload(&owner, id, "other-name.png", PNG).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["id"], first.body["id"]);

    let listed = app.get(&format!("/equipment/{id}/images"), None).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_uploads() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let stranger = app.signup("stranger@example.com", "Stranger").await;
    let id = app.tent(&owner).await;

    let pdf = app.upload(&owner, id, "manual.pdf", b"%PDF-1.7 not an image").await;
    assert_eq!(pdf.status, StatusCode::BAD_REQUEST);

    let empty = app.upload(&owner, id, "empty.png", b"").await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let mut oversized = PNG.to_vec();
    oversized.resize(app.state.config.max_upload_bytes + 1, 0);
    let too_big = app.upload(&owner, id, "huge.png", &oversized).await;
    assert_eq!(too_big.status, StatusCode::BAD_REQUEST);

    let foreign = app.upload(&stranger, id, "tent.png", PNG).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let missing = app.upload(&owner, uuid::Uuid::new_v4(), "tent.png", PNG).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let listed = app.get(&format!("/equipment/{id}/images"), None).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_set_primary_moves_the_flag() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let id = app.tent(&owner).await;

    let first = app.upload(&owner, id, "tent.png", PNG).await;
    let second = app.upload(&owner, id, "boots.jpg", JPEG).await;
    let second_id = id_of(&second.body);

    let promoted = app
        .put(
            &format!("/equipment/{id}/images/{second_id}/primary"),
            Some(&owner.token),
            Value::Null,
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["is_primary"], true);

    let listed = app.get(&format!("/equipment/{id}/images"), None).await;
    let images = listed.body.as_array().unwrap();
    assert_eq!(images[0]["id"], second.body["id"]);
    assert_eq!(images[1]["id"], first.body["id"]);
    assert_eq!(images[1]["is_primary"], false);
}

#[tokio::test]
async fn test_deleting_primary_promotes_oldest() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let id = app.tent(&owner).await;

    let first = app.upload(&owner, id, "tent.png", PNG).await;
    let second = app.upload(&owner, id, "boots.jpg", JPEG).await;
    let third = app.upload(&owner, id, "stove.webp", WEBP).await;
    assert_eq!(third.status, StatusCode::CREATED);

    let deleted = app
        .delete(
            &format!("/equipment/{id}/images/{}", id_of(&first.body)),
            Some(&owner.token),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let listed = app.get(&format!("/equipment/{id}/images"), None).await;
    let images = listed.body.as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["id"], second.body["id"]);
    assert_eq!(images[0]["is_primary"], true);

    let again = app
        .delete(
            &format!("/equipment/{id}/images/{}", id_of(&first.body)),
            Some(&owner.token),
        )
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dedupe_keeps_primary_of_each_group() {
    let app = TestApp::new().await;
    let owner = app.signup("owner@example.com", "Owner").await;
    let id = app.tent(&owner).await;

    let original = app.upload(&owner, id, "tent.png", PNG).await;
    let converted = app.upload(&owner, id, "tent-compressed.webp", WEBP).await;
    let other = app.upload(&owner, id, "boots.jpg", JPEG).await;
    assert_eq!(converted.status, StatusCode::CREATED);

    let report = app
        .post(&format!("/equipment/{id}/images/dedupe"), Some(&owner.token), Value::Null)
        .await;
    assert_eq!(report.status, StatusCode::OK);
    assert_eq!(ids(&report.body["removed"]), vec![converted.body["id"].as_str().unwrap()]);
    let kept = ids(&report.body["kept"]);
    assert!(kept.contains(&original.body["id"].as_str().unwrap().to_string()));
    assert!(kept.contains(&other.body["id"].as_str().unwrap().to_string()));

    let listed = app.get(&format!("/equipment/{id}/images"), None).await;
    let images = listed.body.as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["id"], original.body["id"]);
    assert_eq!(images[0]["is_primary"], true);

    // Nothing left to remove the second time round
    let second = app
        .post(&format!("/equipment/{id}/images/dedupe"), Some(&owner.token), Value::Null)
        .await;
    assert!(ids(&second.body["removed"]).is_empty());
}
