//! SQLite product store on disk.

use pricing_research::config::DatabaseConfig;
use pricing_research::database::{Database, ProductRepository, SqliteStore};
use pricing_research::domain::{CompetitorSummary, CountryPricing, NewProduct, ProductUpdate};
use pricing_research::ResearchError;

fn product(user: &str, url: &str) -> NewProduct {
    NewProduct {
        user_id: user.to_string(),
        url: url.to_string(),
        title: "Silk Tie".to_string(),
        scrape_details: "primary\ncompetitor".to_string(),
        analysis_result: "Suggested Selling Price:\nCountry: US\nPrice: $40\nAnalysis: ok".to_string(),
        country_pricing_analysis: vec![CountryPricing {
            country: "US".to_string(),
            price: "$40".to_string(),
            analysis: "ok".to_string(),
        }],
        competitor_analysis: vec![CompetitorSummary {
            url: "https://us.example/1".to_string(),
            summary: "competitor".to_string(),
        }],
    }
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("products.sqlite");

    let created = {
        let store = SqliteStore::open(&path).await.unwrap();
        store.insert(product("u1", "https://shop.example/x")).await.unwrap()
    };

    let store = SqliteStore::open(&path).await.unwrap();
    let found = store
        .find_by_user_and_url("u1", "https://shop.example/x")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn test_update_preserves_id_and_creation_time() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("p.sqlite")).await.unwrap();
    let created = store.insert(product("u1", "https://shop.example/x")).await.unwrap();

    let mut fresh = product("u1", "https://shop.example/x");
    fresh.analysis_result = "new analysis".to_string();
    fresh.country_pricing_analysis.clear();
    let updated = store
        .update_by_user_and_url("u1", "https://shop.example/x", ProductUpdate::from(fresh))
        .await
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.analysis_result, "new analysis");
    assert!(updated.country_pricing_analysis.is_empty());

    let reread = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(reread, updated);
}

#[tokio::test]
async fn test_find_by_url_returns_oldest_and_list_is_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("p.sqlite")).await.unwrap();

    let first = store.insert(product("u1", "https://shop.example/x")).await.unwrap();
    store.insert(product("u2", "https://shop.example/x")).await.unwrap();
    let second = store.insert(product("u1", "https://shop.example/y")).await.unwrap();

    let by_url = store.find_by_url("https://shop.example/x").await.unwrap().unwrap();
    assert_eq!(by_url.id, first.id);

    let listed = store.find_by_user("u1").await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    assert!(store.find_by_url("https://nowhere.example").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_of_unknown_pair_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("p.sqlite")).await.unwrap();
    store.insert(product("u1", "https://shop.example/x")).await.unwrap();

    let err = store
        .update_by_user_and_url("u2", "https://shop.example/x", ProductUpdate::default())
        .await
        .unwrap_err();
    match err {
        ResearchError::NotFound { user_id, url } => {
            assert_eq!(user_id, "u2");
            assert_eq!(url, "https://shop.example/x");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_database_from_config_opens_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("p.sqlite").display().to_string(),
    };
    let db = Database::from_config(&config).await.unwrap();
    assert_eq!(db.backend_name(), "sqlite");

    let created = db.insert(product("u1", "https://shop.example/x")).await.unwrap();
    assert_eq!(db.find_by_id(created.id).await.unwrap().unwrap(), created);
}
