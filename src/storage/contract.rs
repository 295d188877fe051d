//! Behavior every `ProductStore` backend must share. Each check takes a
//! connected, empty store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::model::Product;

use super::{ProductStore, Row};

fn t0() -> DateTime<Utc> {
    // whole seconds so backends with microsecond columns compare equal
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn product(name: &str, source: &str, votes: i32, at: DateTime<Utc>) -> Product {
    let mut p = Product::new(name, source, at);
    p.votes = Some(votes);
    p
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter().map(|r| r["name"].as_str().unwrap_or_default().to_string()).collect()
}

/// Drops backend bookkeeping columns and reads the rest back as a `Product`.
fn as_product(row: &Row) -> Product {
    let mut row = row.clone();
    for key in ["id", "_id", "created_at", "updated_at"] {
        row.remove(key);
    }
    serde_json::from_value(Value::Object(row)).unwrap()
}

pub async fn idempotent_upsert<S: ProductStore>(store: &S) {
    assert!(store.upsert(&[product("Widget", "https://s.test/", 10, t0())]).await);
    let mut second = product("Widget", "https://s.test/", 25, t0());
    second.tagline = "Updated".into();
    assert!(store.upsert(&[second]).await);

    let rows = store.query(None).await.unwrap();
    assert_eq!(rows.len(), 1, "{}", store.backend());
    assert_eq!(rows[0]["votes"], 25);
    assert_eq!(rows[0]["tagline"], "Updated");

    // same name on another page is a different product
    assert!(store.upsert(&[product("Widget", "https://s.test/other", 1, t0())]).await);
    assert_eq!(store.query(None).await.unwrap().len(), 2);
    assert!(store.upsert(&[]).await);
    assert_eq!(store.query(None).await.unwrap().len(), 2);
}

pub async fn round_trip<S: ProductStore>(store: &S) {
    let mut p = product("Full", "https://s.test/", 7, t0());
    p.description = Some("desc".into());
    p.url = Some("https://s.test/p/full".into());
    p.comments = Some(3);
    p.maker = Some("maker".into());
    p.category = Some("tools".into());
    p.launch_date = Some(t0() - Duration::days(1));
    p.image_url = Some("https://cdn.test/full.png".into());
    assert!(store.upsert(std::slice::from_ref(&p)).await);

    let rows = store.query(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_product(&rows[0]), p, "{}", store.backend());
}

pub async fn newest_first_with_ties<S: ProductStore>(store: &S) {
    let batch = vec![
        product("Old", "https://s.test/", 1, t0() - Duration::hours(2)),
        product("TieA", "https://s.test/", 2, t0()),
        product("Mid", "https://s.test/", 3, t0() - Duration::hours(1)),
        product("TieB", "https://s.test/", 4, t0()),
    ];
    assert!(store.upsert(&batch).await);

    assert_eq!(names(&store.query(None).await.unwrap()), vec!["TieA", "TieB", "Mid", "Old"], "{}", store.backend());
    assert_eq!(names(&store.query(Some(2)).await.unwrap()), vec!["TieA", "TieB"]);
    assert!(store.query(Some(0)).await.unwrap().is_empty());
}

pub async fn stats_match_query<S: ProductStore>(store: &S) {
    assert!(store.stats().await.unwrap().avg_votes.is_none());
    assert!(store.upsert(&[
        product("A", "https://s.test/1", 10, t0()),
        product("B", "https://s.test/1", 20, t0() + Duration::seconds(1)),
        product("C", "https://s.test/2", 30, t0()),
    ]).await);
    assert!(store.upsert(&[product("A", "https://s.test/1", 40, t0())]).await);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_products, store.query(None).await.unwrap().len() as i64);
    assert_eq!(stats.total_products, 3, "{}", store.backend());
    assert_eq!(stats.unique_sources, 2);
    assert_eq!(stats.last_scraped, Some(t0() + Duration::seconds(1)));
    assert_eq!(stats.avg_votes, Some(30.0));
}

/// Extracted text has no length cap, so no backend may impose one.
pub async fn long_fields_are_stored<S: ProductStore>(store: &S) {
    let source = format!("https://s.test/{}", "p".repeat(600));
    let mut p = product(&"N".repeat(300), &source, 1, t0());
    p.url = Some(format!("https://s.test/{}", "u".repeat(520)));
    p.image_url = Some(format!("https://cdn.test/{}", "i".repeat(530)));
    p.maker = Some("m".repeat(300));
    p.category = Some("c".repeat(150));
    assert!(store.upsert(std::slice::from_ref(&p)).await, "{} rejected long fields", store.backend());

    let rows = store.query(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_product(&rows[0]), p);
}

pub async fn failed_batch_is_not_partial<S: ProductStore>(store: &S) {
    assert!(store.upsert(&[product("Keep", "https://s.test/", 1, t0())]).await);

    let bad = vec![
        product("Keep", "https://s.test/", 99, t0()),
        product("Fresh", "https://s.test/", 2, t0()),
        product("", "https://s.test/", 3, t0()),
    ];
    assert!(!store.upsert(&bad).await);

    let rows = store.query(None).await.unwrap();
    assert_eq!(names(&rows), vec!["Keep"], "{}", store.backend());
    assert_eq!(rows[0]["votes"], 1);
}
