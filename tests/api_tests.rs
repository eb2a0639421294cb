use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use product_recs::api::{create_router, AppState};
use product_recs::db::InMemoryStore;
use product_recs::models::{Interaction, InteractionType, Product};
use product_recs::services::EngineSettings;

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    for user in [1, 2, 3] {
        store.add_user(user).await;
    }
    store.upsert_product(Product::new(10, "Trail Shoes", 1).with_counts(4, 20)).await;
    store.upsert_product(Product::new(11, "Rain Jacket", 1).with_counts(9, 5)).await;
    store.upsert_product(Product::new(12, "Headlamp", 2).with_counts(1, 90)).await;
    store.upsert_product(Product::new(13, "Water Filter", 2).with_counts(2, 0)).await;

    store.add_interaction(Interaction::new(1, 10, InteractionType::Purchase)).await;
    store.add_interaction(Interaction::new(2, 10, InteractionType::View)).await;
    store.add_interaction(Interaction::new(2, 12, InteractionType::Purchase)).await;
    store
}

async fn create_test_server() -> TestServer {
    let state = AppState::in_memory(seeded_store().await, EngineSettings::default());
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server().await;
    let id = "6f1c1f5e-7d7a-4d0e-9a55-2a3f0d8e4b11";

    let response = server
        .get("/health")
        .add_header(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_static(id),
        )
        .await;

    assert_eq!(response.header("x-request-id"), id);
}

#[tokio::test]
async fn test_user_recommendations() {
    let server = create_test_server().await;

    let response = server
        .get("/api/v1/recommendations/user/1")
        .add_query_param("count", 3)
        .await;

    response.assert_status_ok();
    let items: Vec<Value> = response.json();
    assert_eq!(items.len(), 3);
    // user 2 shares product 10 (similarity 1/2), so their purchase of 12 leads
    assert_eq!(items[0]["product_id"], 12);
    assert_eq!(items[0]["recommendation_type"], "COLLABORATIVE");
    assert!((items[0]["score"].as_f64().unwrap() - 2.5).abs() < 1e-12);
    // same category as the purchased 10
    assert_eq!(items[1]["product_id"], 11);
    assert!((items[1]["score"].as_f64().unwrap() - 0.5).abs() < 1e-12);
    assert_eq!(items[2]["product_id"], 10);
    assert_eq!(items[2]["recommendation_type"], "POPULAR");
}

#[tokio::test]
async fn test_user_recommendations_default_count() {
    let server = create_test_server().await;

    let response = server.get("/api/v1/recommendations/user/3").await;

    response.assert_status_ok();
    let items: Vec<Value> = response.json();
    // cold start: every active product, popularity order
    let ids: Vec<i64> = items.iter().map(|i| i["product_id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![11, 10, 13, 12]);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = create_test_server().await;

    let response = server.get("/api/v1/recommendations/user/404").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_invalid_count_is_rejected() {
    let server = create_test_server().await;

    let response = server
        .get("/api/v1/recommendations/user/1")
        .add_query_param("count", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/recommendations/guest")
        .add_query_param("count", -3)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_guest_recommendations() {
    let server = create_test_server().await;

    let response = server
        .get("/api/v1/recommendations/guest")
        .add_query_param("count", 3)
        .await;

    response.assert_status_ok();
    let items: Vec<Value> = response.json();
    let ids: Vec<i64> = items.iter().map(|i| i["product_id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![11, 10, 13]);
    assert!(items.iter().all(|i| i["recommendation_type"] == "POPULAR"));
}

#[tokio::test]
async fn test_track_interaction() {
    let server = create_test_server().await;

    let response = server
        .post("/api/v1/interactions")
        .json(&json!({
            "user_id": 3,
            "product_id": 13,
            "interaction_type": "ADD_TO_CART"
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "recorded");

    // the failure is reported, not raised
    let response = server
        .post("/api/v1/interactions")
        .json(&json!({
            "user_id": 3,
            "product_id": 999,
            "interaction_type": "VIEW"
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "skipped");
}

#[tokio::test]
async fn test_cached_list_survives_tracking_until_invalidated() {
    let state = AppState::in_memory(seeded_store().await, EngineSettings::default());
    let server = TestServer::new(create_router(state)).unwrap();

    let first: Vec<Value> = server
        .get("/api/v1/recommendations/user/1")
        .add_query_param("count", 1)
        .await
        .json();
    assert_eq!(first[0]["product_id"], 12);

    // user 2 now buys 13 twice over; the cached list does not change
    for _ in 0..2 {
        server
            .post("/api/v1/interactions")
            .json(&json!({ "user_id": 2, "product_id": 13, "interaction_type": "PURCHASE" }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
    let cached: Vec<Value> = server
        .get("/api/v1/recommendations/user/1")
        .add_query_param("count", 1)
        .await
        .json();
    assert_eq!(cached, first);

    server
        .delete("/api/v1/recommendations/user/1/cache")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let fresh: Vec<Value> = server
        .get("/api/v1/recommendations/user/1")
        .add_query_param("count", 1)
        .await
        .json();
    assert_eq!(fresh[0]["product_id"], 13);
}
