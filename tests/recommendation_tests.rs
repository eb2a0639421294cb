use std::collections::HashSet;
use std::sync::Arc;

use product_recs::db::InMemoryStore;
use product_recs::error::AppError;
use product_recs::models::{Interaction, InteractionType, Product, ProductId, RecommendationSource};
use product_recs::services::popularity::popularity_score;
use product_recs::services::similarity::similarity;
use product_recs::services::{EngineSettings, RecommendationCache, RecommendationEngine};

fn engine(store: &InMemoryStore) -> RecommendationEngine {
    let store = Arc::new(store.clone());
    RecommendationEngine::new(
        store.clone(),
        store.clone(),
        store,
        RecommendationCache::new(),
        EngineSettings::default(),
    )
}

async fn interact(store: &InMemoryStore, user_id: i64, product_id: ProductId, kind: InteractionType) {
    store.add_interaction(Interaction::new(user_id, product_id, kind)).await;
}

fn ids(items: &[product_recs::models::Recommendation]) -> Vec<ProductId> {
    items.iter().map(|r| r.product_id).collect()
}

#[test]
fn test_similarity_properties() {
    let a = vec![
        Interaction::new(1, 1, InteractionType::Purchase),
        Interaction::new(1, 2, InteractionType::View),
    ];
    let b = vec![
        Interaction::new(2, 1, InteractionType::Purchase),
        Interaction::new(2, 3, InteractionType::Purchase),
    ];

    assert_eq!(similarity(&a, &b), similarity(&b, &a));
    assert_eq!(similarity(&a, &a), 1.0);
    assert_eq!(similarity(&[], &[]), 0.0);
    assert!((similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_popularity_score_example() {
    let product = Product::new(5, "Camp Chair", 1).with_counts(4, 20);
    assert_eq!(popularity_score(&product), 42.0);
}

#[tokio::test]
async fn test_neighbour_above_threshold_contributes() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.add_user(2).await;
    store.upsert_product(Product::new(1, "Kettle", 1)).await;
    store.upsert_product(Product::new(2, "Mug", 2)).await;
    store.upsert_product(Product::new(3, "Grinder", 3)).await;

    interact(&store, 1, 1, InteractionType::Purchase).await;
    interact(&store, 1, 2, InteractionType::View).await;
    interact(&store, 2, 1, InteractionType::Purchase).await;
    interact(&store, 2, 3, InteractionType::Purchase).await;

    let recs = engine(&store).get_recommendations(1, 1).await.unwrap();

    assert_eq!(ids(&recs), vec![3]);
    // similarity 1/3 times the purchase weight
    assert!((recs[0].score - 5.0 / 3.0).abs() < 1e-12);
    assert_eq!(recs[0].source, RecommendationSource::Collaborative);
}

#[tokio::test]
async fn test_similarity_exactly_at_threshold_is_excluded() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.add_user(2).await;
    for id in 1..=6 {
        store.upsert_product(Product::new(id, format!("Seen {}", id), 1)).await;
        interact(&store, 1, id, InteractionType::View).await;
    }
    for id in 7..=10 {
        store.upsert_product(Product::new(id, format!("Other {}", id), 9)).await;
    }
    // 3 shared of 10 total products: similarity is exactly 0.3
    for id in 4..=10 {
        interact(&store, 2, id, InteractionType::Purchase).await;
    }

    let recs = engine(&store).get_recommendations(1, 4).await.unwrap();

    assert!(recs
        .iter()
        .all(|r| r.source == RecommendationSource::Popular));
}

#[tokio::test]
async fn test_similarity_just_above_threshold_is_included() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.add_user(2).await;
    for id in 1..=6 {
        store.upsert_product(Product::new(id, format!("Seen {}", id), 1)).await;
        interact(&store, 1, id, InteractionType::View).await;
    }
    for id in 7..=9 {
        store.upsert_product(Product::new(id, format!("Other {}", id), 9)).await;
    }
    // 3 shared of 9 total products
    for id in 4..=9 {
        interact(&store, 2, id, InteractionType::Purchase).await;
    }

    let recs = engine(&store).get_recommendations(1, 3).await.unwrap();

    assert_eq!(ids(&recs), vec![7, 8, 9]);
    assert!(recs
        .iter()
        .all(|r| r.source == RecommendationSource::Collaborative));
}

#[tokio::test]
async fn test_cold_start_and_guest_match_popularity() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.upsert_product(Product::new(1, "Socks", 1).with_counts(1, 500)).await;
    store.upsert_product(Product::new(2, "Boots", 1).with_counts(3, 0)).await;
    store.upsert_product(Product::new(3, "Laces", 1).with_counts(2, 0)).await;
    store.upsert_product(Product::new(4, "Insoles", 1).with_counts(9, 0).inactive()).await;

    let engine = engine(&store);
    let popular = engine.popularity().top_popular(3).await.unwrap();

    let cold = engine.get_recommendations(1, 3).await.unwrap();
    let guest = engine.get_guest_recommendations(3).await.unwrap();

    assert_eq!(cold, popular);
    assert_eq!(guest, popular);
    assert_eq!(ids(&popular), vec![1, 2, 3]);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_shortfall_is_backfilled_without_duplicates() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.add_user(2).await;
    for id in 1..=15 {
        let category = if id <= 4 { 1 } else { 2 };
        store
            .upsert_product(Product::new(id, format!("Item {}", id), category).with_counts(id as u64, 0))
            .await;
    }
    interact(&store, 1, 1, InteractionType::Purchase).await;
    for id in 1..=3 {
        interact(&store, 2, id, InteractionType::Purchase).await;
    }

    let recs = engine(&store).get_recommendations(1, 10).await.unwrap();

    assert_eq!(recs.len(), 10);
    assert_eq!(ids(&recs[..3]), vec![2, 3, 4]);
    assert!(recs[..3]
        .iter()
        .all(|r| r.source == RecommendationSource::Collaborative));
    assert!(recs[3..]
        .iter()
        .all(|r| r.source == RecommendationSource::Popular));
    assert_eq!(ids(&recs[3..]), vec![15, 14, 13, 12, 11, 10, 9]);

    let unique: HashSet<ProductId> = recs.iter().map(|r| r.product_id).collect();
    assert_eq!(unique.len(), recs.len());
}

#[tokio::test]
async fn test_backfill_limited_by_catalog_size() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.add_user(2).await;
    store.upsert_product(Product::new(1, "Pan", 1)).await;
    store.upsert_product(Product::new(2, "Lid", 2)).await;
    interact(&store, 1, 1, InteractionType::View).await;
    interact(&store, 2, 1, InteractionType::View).await;
    interact(&store, 2, 2, InteractionType::Rating).await;

    let recs = engine(&store).get_recommendations(1, 10).await.unwrap();

    // only two active products exist in total
    assert_eq!(ids(&recs), vec![2, 1]);
    // similarity 1/2 times the rating weight
    assert!((recs[0].score - 1.5).abs() < 1e-12);
}

#[tokio::test]
async fn test_inactive_and_missing_candidates_are_dropped() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    store.add_user(2).await;
    store.upsert_product(Product::new(1, "Tent", 1)).await;
    store.upsert_product(Product::new(2, "Fly", 1)).await;
    store.upsert_product(Product::new(5, "Old Stove", 2).inactive()).await;
    store.upsert_product(Product::new(6, "Recalled Lamp", 2)).await;
    store.upsert_product(Product::new(7, "Stakes", 2)).await;

    for id in [1, 2] {
        interact(&store, 1, id, InteractionType::Purchase).await;
    }
    for id in [1, 2, 5, 6, 7] {
        interact(&store, 2, id, InteractionType::Purchase).await;
    }
    store.remove_product(6).await;

    let recs = engine(&store).get_recommendations(1, 3).await.unwrap();

    assert_eq!(recs[0].product_id, 7);
    assert_eq!(recs[0].source, RecommendationSource::Collaborative);
    assert!(recs.iter().all(|r| r.product_id != 5 && r.product_id != 6));
}

#[tokio::test]
async fn test_repeated_requests_are_stable() {
    let store = InMemoryStore::new();
    for user in 1..=4 {
        store.add_user(user).await;
    }
    for id in 1..=8 {
        store
            .upsert_product(Product::new(id, format!("Item {}", id), id % 3).with_counts(id as u64, 10))
            .await;
    }
    interact(&store, 1, 1, InteractionType::Purchase).await;
    interact(&store, 1, 2, InteractionType::AddToCart).await;
    interact(&store, 2, 1, InteractionType::View).await;
    interact(&store, 2, 2, InteractionType::Purchase).await;
    interact(&store, 2, 4, InteractionType::Rating).await;
    interact(&store, 3, 2, InteractionType::View).await;
    interact(&store, 3, 5, InteractionType::Purchase).await;
    interact(&store, 4, 1, InteractionType::Purchase).await;
    interact(&store, 4, 6, InteractionType::AddToCart).await;

    let cached = engine(&store);
    let first = cached.get_recommendations(1, 5).await.unwrap();
    let second = cached.get_recommendations(1, 5).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(cached.cache().len(), 1);

    // a smaller request is served from the same entry
    let prefix = cached.get_recommendations(1, 2).await.unwrap();
    assert_eq!(prefix[..], first[..2]);

    // an engine without a warm cache computes the same list
    let fresh = engine(&store).get_recommendations(1, 5).await.unwrap();
    assert_eq!(fresh, first);
}

#[tokio::test]
async fn test_argument_errors() {
    let store = InMemoryStore::new();
    store.add_user(1).await;
    let engine = engine(&store);

    assert!(matches!(
        engine.get_recommendations(99, 5).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine.get_recommendations(1, 0).await,
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.get_guest_recommendations(0).await,
        Err(AppError::InvalidInput(_))
    ));
}
