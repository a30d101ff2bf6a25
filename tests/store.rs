//! Result store persisted to disk and exported

use amz_scraper::{ProductCsvOptions, ScrapeStore,
                  models::{ProductRecord, ReviewRecord, ScrapeSession, SessionEntry}};
use std::fs;

fn entry(asin: &str, ids: &[&str]) -> SessionEntry {
    let mut session = ScrapeSession::new(
        asin,
        format!("https://www.amazon.com/dp/{}", asin),
        format!("https://www.amazon.com/product-reviews/{}", asin),
    );
    session.product_name = "Acme Mug".to_string();
    session.record_page(1, ids.iter().map(|id| ReviewRecord::empty(*id, 1)).collect());
    session.into_entry()
}

#[test]
fn test_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.json");

    let mut store = ScrapeStore::open(&path).unwrap();
    let key = store.add_session(entry("B0ABCDEF12", &["R1", "R2"]));
    store.add_product(ProductRecord::new("B0ABCDEF12", "https://www.amazon.com/dp/B0ABCDEF12"));
    store.save().unwrap();

    let reopened = ScrapeStore::open(&path).unwrap();
    assert_eq!(reopened.data(), store.data());
    assert_eq!(reopened.stats().reviews, 2);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw["products"][&key]["metadata"]["totalReviews"].is_number());
    assert_eq!(raw["productInfo"].as_array().unwrap().len(), 1);
}

#[test]
fn test_partially_broken_file_is_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let good = serde_json::to_value(entry("B0ABCDEF12", &["R1"])).unwrap();
    let raw = serde_json::json!({
        "products": { "B0ABCDEF12_1": good, "broken": {"metadata": 7} },
        "productInfo": "not a list",
    });
    fs::write(&path, raw.to_string()).unwrap();

    let store = ScrapeStore::open(&path).unwrap();
    let stats = store.stats();
    assert_eq!(stats.product_sessions, 1);
    assert_eq!(stats.reviews, 1);
    assert_eq!(stats.product_info, 0);
}

#[test]
fn test_export_writes_timestamped_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("csv");

    let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();
    store.add_session(entry("B0ABCDEF12", &["R1", "R2"]));
    store.add_session(entry("B0ZZZZZZZZ", &["R3"]));

    let summary = store.export(&out, &ProductCsvOptions::default()).unwrap();
    assert_eq!(summary.reviews, 3);
    assert_eq!(summary.products, 0);
    assert!(summary.products_path.is_none());

    let reviews_path = summary.reviews_path.unwrap();
    let name = reviews_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("amz_reviews_"));
    assert!(name.ends_with("Z.csv"));
    assert!(!name.contains(':'));

    let mut reader = csv::Reader::from_path(&reviews_path).unwrap();
    assert_eq!(reader.records().count(), 3);

    store.clear();
    assert!(store.is_empty());
}

#[test]
fn test_paired_product_is_exported_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ScrapeStore::open(dir.path().join("store.json")).unwrap();

    let mut session = ScrapeSession::new("B0ABCDEF12", "https://www.amazon.com/dp/B0ABCDEF12", "reviews");
    session.record_page(1, vec![ReviewRecord::empty("R1", 1)]);
    session.attach_product(ProductRecord::new("B0ABCDEF12", "https://www.amazon.com/dp/B0ABCDEF12"));
    store.add_session(session.into_entry());
    store.add_product(ProductRecord::new("B0ZZZZZZZZ", "https://www.amazon.com/dp/B0ZZZZZZZZ"));
    store.save().unwrap();

    let store = ScrapeStore::open(store.path()).unwrap();
    assert_eq!(store.stats().product_info, 2);
    let asins: Vec<&str> = store.products().iter().map(|p| p.asin.as_str()).collect();
    assert_eq!(asins, vec!["B0ZZZZZZZZ", "B0ABCDEF12"]);

    let summary = store.export(dir.path().join("csv"), &ProductCsvOptions::default()).unwrap();
    assert_eq!(summary.products, 2);
    let mut reader = csv::Reader::from_path(summary.products_path.unwrap()).unwrap();
    assert_eq!(reader.records().count(), 2);
}
