use std::sync::Arc;

use chrono::{Duration, Utc};
use nutriscout_api::{Additive, Nutrition, Product, RiskLevel, ScoreCategory};
use nutriscout_cache::{
    HistoryEntry, HistoryFilter, ProductStore, ScanSnapshot, ScanSource, SqliteStore,
};
use tempfile::TempDir;

fn create_test_product(id: &str, name: &str) -> Product {
    let mut product = Product::new(id);
    product.barcode = Some(format!("50001126{}", id));
    product.name = Some(name.to_string());
    product.brand = Some("Test Brand".to_string());
    product.score = 41.9;
    product.calculated_score = 38;
    product.nutri_score_grade = Some("C".to_string());
    product.nutrition = Some(Nutrition {
        calories: 250.0,
        sugar: 12.5,
        fat: 8.0,
        saturated_fat: 2.5,
        salt: 0.6,
        protein: 4.0,
        fiber: 1.2,
        serving_size: 100.0,
        serving_unit: Some("g".to_string()),
    });
    product.additives = vec![Additive {
        id: Some(7),
        code: "E330".to_string(),
        name: Some("Citric acid".to_string()),
        risk_level: RiskLevel::Limited,
        description: None,
    }];
    product.score_category = Some(ScoreCategory {
        label: Some("Poor".to_string()),
        color: Some("#FF9800".to_string()),
    });
    product
}

fn snapshot(name: &str, score: i32) -> ScanSnapshot {
    ScanSnapshot {
        product_name: Some(name.to_string()),
        brand_name: Some("Test Brand".to_string()),
        image_url: None,
        health_score: score,
        nutri_score_grade: Some("B".to_string()),
        is_organic: false,
    }
}

#[test]
fn test_upsert_then_get_round_trips_every_field() {
    let store = SqliteStore::open_in_memory().unwrap();
    let product = create_test_product("1", "Granola");

    store.upsert_product(&product).unwrap();

    assert_eq!(store.get_product("1").unwrap(), Some(product));
    assert_eq!(store.get_product("2").unwrap(), None);
}

#[test]
fn test_upsert_is_idempotent() {
    let store = SqliteStore::open_in_memory().unwrap();
    let product = create_test_product("1", "Granola");

    store.upsert_product(&product).unwrap();
    let once = store.observe_all_products().unwrap().borrow().clone();

    for _ in 0..3 {
        store.upsert_product(&product).unwrap();
    }
    let many = store.observe_all_products().unwrap().borrow().clone();

    assert_eq!(once, many);
    assert_eq!(many.len(), 1);
}

#[test]
fn test_upsert_replaces_whole_product() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.upsert_product(&create_test_product("1", "Granola")).unwrap();

    // Refresh drops nutrition, additives and the category entirely
    let mut refreshed = Product::new("1");
    refreshed.name = Some("Granola (new recipe)".to_string());
    store.upsert_product(&refreshed).unwrap();

    assert_eq!(store.get_product("1").unwrap(), Some(refreshed));
}

#[test]
fn test_product_without_nutrition_stays_without_nutrition() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut product = Product::new("9");
    product.nutrition = Some(Nutrition::default());
    store.upsert_product(&product).unwrap();

    // All-zero nutrition is still nutrition
    assert_eq!(
        store.get_product("9").unwrap().unwrap().nutrition,
        Some(Nutrition::default())
    );

    product.nutrition = None;
    store.upsert_product(&product).unwrap();
    assert_eq!(store.get_product("9").unwrap().unwrap().nutrition, None);
}

#[test]
fn test_observe_product_emits_current_then_updates() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut rx = store.observe_product("42").unwrap();

    assert_eq!(*rx.borrow(), None);
    assert!(!rx.has_changed().unwrap());

    let product = create_test_product("42", "Cola");
    store.upsert_product(&product).unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Some(product));

    // Writes to other ids don't wake us
    store.upsert_product(&create_test_product("43", "Lemonade")).unwrap();
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn test_independent_subscribers_both_see_updates() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = store.observe_product("1").unwrap();
    let second = store.observe_product("1").unwrap();

    let product = create_test_product("1", "Granola");
    store.upsert_product(&product).unwrap();

    assert_eq!(*first.borrow(), Some(product.clone()));
    assert_eq!(*second.borrow(), Some(product));
}

#[test]
fn test_resubscribing_after_teardown_sees_stored_value() {
    let store = SqliteStore::open_in_memory().unwrap();
    let rx = store.observe_product("1").unwrap();
    drop(rx);

    let product = create_test_product("1", "Granola");
    store.upsert_product(&product).unwrap();

    let rx = store.observe_product("1").unwrap();
    assert_eq!(*rx.borrow(), Some(product));
}

#[test]
fn test_observe_by_barcode() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut rx = store.observe_product_by_barcode("5000112611878").unwrap();
    assert_eq!(*rx.borrow(), None);

    let mut product = Product::new("42");
    product.barcode = Some("5000112611878".to_string());
    product.name = Some("Cola".to_string());
    store.upsert_product(&product).unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Some(product.clone()));
    assert_eq!(
        store.get_product_by_barcode("5000112611878").unwrap(),
        Some(product)
    );
}

#[test]
fn test_observe_all_keeps_first_insert_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    let rx = store.observe_all_products().unwrap();
    assert!(rx.borrow().is_empty());

    store
        .upsert_products(&[
            create_test_product("b", "Bread"),
            create_test_product("a", "Apple juice"),
        ])
        .unwrap();
    // Refreshing an existing product must not move it to the end
    store.upsert_product(&create_test_product("b", "Bread v2")).unwrap();
    store.upsert_product(&create_test_product("c", "Crisps")).unwrap();

    let ids: Vec<String> = rx.borrow().iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
    assert_eq!(rx.borrow()[0].name.as_deref(), Some("Bread v2"));
}

#[test]
fn test_history_upsert_by_barcode_preserves_favorite() {
    let store = SqliteStore::open_in_memory().unwrap();

    let first = store
        .upsert_history(&HistoryEntry::new(
            "5000112611878",
            snapshot("Cola", 30),
            ScanSource::Local,
        ))
        .unwrap();
    assert!(!first.is_favorite);

    assert!(store.set_favorite(first.id, true).unwrap());

    let mut rescan = HistoryEntry::new("5000112611878", snapshot("Cola Zero", 45), ScanSource::Local);
    rescan.scanned_at = first.scanned_at + Duration::minutes(5);
    let second = store.upsert_history(&rescan).unwrap();

    assert_eq!(second.id, first.id);
    assert!(second.is_favorite);
    assert_eq!(second.snapshot, snapshot("Cola Zero", 45));
    assert_eq!(second.scanned_at.timestamp_millis(), rescan.scanned_at.timestamp_millis());
    assert_eq!(store.list_history(HistoryFilter::All).unwrap().len(), 1);
}

#[test]
fn test_history_upsert_can_overwrite_favorite_explicitly() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut entry = HistoryEntry::new("111", snapshot("Tea", 80), ScanSource::OpenFoodFacts);
    entry.is_favorite = Some(true);
    let record = store.upsert_history(&entry).unwrap();
    assert!(record.is_favorite);
    assert_eq!(record.source, ScanSource::OpenFoodFacts);

    entry.is_favorite = Some(false);
    let record = store.upsert_history(&entry).unwrap();
    assert!(!record.is_favorite);
}

#[test]
fn test_history_ordered_newest_first_and_filtered() {
    let store = SqliteStore::open_in_memory().unwrap();
    let now = Utc::now();

    for (i, barcode) in ["111", "222", "333"].iter().enumerate() {
        let mut entry = HistoryEntry::new(*barcode, snapshot(barcode, 50), ScanSource::Local);
        entry.scanned_at = now - Duration::minutes(10 - i as i64);
        store.upsert_history(&entry).unwrap();
    }

    let all = store.list_history(HistoryFilter::All).unwrap();
    let barcodes: Vec<&str> = all.iter().map(|r| r.barcode.as_str()).collect();
    assert_eq!(barcodes, vec!["333", "222", "111"]);

    let favorite_id = all[2].id;
    store.set_favorite(favorite_id, true).unwrap();

    let favorites = store.list_history(HistoryFilter::FavoritesOnly).unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].barcode, "111");
}

#[test]
fn test_prune_keeps_only_favorites() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut ids = Vec::new();
    for barcode in ["111", "222", "333"] {
        let record = store
            .upsert_history(&HistoryEntry::new(barcode, snapshot(barcode, 50), ScanSource::Local))
            .unwrap();
        ids.push(record.id);
    }
    store.set_favorite(ids[1], true).unwrap();

    assert_eq!(store.prune_non_favorites().unwrap(), 2);

    let remaining = store.list_history(HistoryFilter::All).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[1]);
    assert!(remaining[0].is_favorite);
}

#[test]
fn test_delete_and_missing_ids() {
    let store = SqliteStore::open_in_memory().unwrap();
    let record = store
        .upsert_history(&HistoryEntry::new("111", snapshot("Tea", 80), ScanSource::Local))
        .unwrap();

    assert!(!store.set_favorite(record.id + 100, true).unwrap());
    assert!(!store.delete_history(record.id + 100).unwrap());

    assert!(store.delete_history(record.id).unwrap());
    assert_eq!(store.get_history_by_barcode("111").unwrap(), None);
}

#[test]
fn test_observe_history_follows_writes() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut all = store.observe_history(HistoryFilter::All).unwrap();
    let mut favorites = store.observe_history(HistoryFilter::FavoritesOnly).unwrap();

    let record = store
        .upsert_history(&HistoryEntry::new("111", snapshot("Tea", 80), ScanSource::Local))
        .unwrap();
    assert_eq!(all.borrow_and_update().len(), 1);
    assert!(favorites.borrow_and_update().is_empty());

    store.set_favorite(record.id, true).unwrap();
    assert!(favorites.has_changed().unwrap());
    assert_eq!(favorites.borrow_and_update().len(), 1);

    store.delete_history(record.id).unwrap();
    assert!(all.borrow_and_update().is_empty());
    assert!(favorites.borrow_and_update().is_empty());
}

#[test]
fn test_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("products.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.upsert_product(&create_test_product("1", "Granola")).unwrap();
        store
            .upsert_history(&HistoryEntry::new("111", snapshot("Tea", 80), ScanSource::Local))
            .unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(
        store.get_product("1").unwrap(),
        Some(create_test_product("1", "Granola"))
    );
    assert!(store.get_history_by_barcode("111").unwrap().is_some());
}

#[test]
fn test_shared_handle_is_initialized_once() {
    let dir = TempDir::new().unwrap();

    let first = SqliteStore::shared(dir.path().join("one.db")).unwrap();
    let second = SqliteStore::shared(dir.path().join("two.db")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!dir.path().join("two.db").exists());
}

#[test]
fn test_concurrent_upserts_from_many_threads() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for j in 0..10 {
                    let id = format!("{}", (i * 10 + j) % 20);
                    store.upsert_product(&create_test_product(&id, "Crisps")).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.observe_all_products().unwrap().borrow().len(), 20);
}
