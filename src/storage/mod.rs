#[cfg(test)]
mod contract;
mod docstore;
mod postgres;

use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::model::{Product, StorageStats};

pub use docstore::DocStore;
pub use postgres::PgStore;

/// Loosely typed persisted row, keyed by `Product` field names.
pub type Row = Map<String, Value>;

/// Durable, idempotent product storage. Upserts are keyed on `(name, source_url)`
/// and applied all-or-nothing per batch.
#[allow(async_fn_in_trait)]
pub trait ProductStore {
    fn backend(&self) -> &'static str;

    /// Opens the target and makes sure the schema/indexes exist. Safe to repeat.
    async fn connect(&mut self) -> Result<(), StoreError>;

    /// Writes the whole batch or nothing; returns the number of records applied.
    async fn try_upsert(&self, records: &[Product]) -> Result<usize, StoreError>;

    async fn upsert(&self, records: &[Product]) -> bool {
        match self.try_upsert(records).await {
            Ok(n) => {
                info!(backend = self.backend(), records = n, "upsert committed");
                true
            }
            Err(e) => {
                error!(backend = self.backend(), error = %e, "upsert rolled back");
                false
            }
        }
    }

    /// Newest `scraped_at` first; ties keep insertion order.
    async fn query(&self, limit: Option<i64>) -> Result<Vec<Row>, StoreError>;

    async fn stats(&self) -> Result<StorageStats, StoreError>;

    /// Releases the connection. No-op when never connected.
    async fn disconnect(&mut self);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Document,
}

impl StoreKind {
    pub fn parse(tag: &str) -> Result<Self, StoreError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(StoreKind::Postgres),
            "docstore" | "document" => Ok(StoreKind::Document),
            _ => Err(StoreError::UnsupportedBackend(tag.to_string())),
        }
    }
}

/// Backend chosen once at startup.
pub enum Store {
    Postgres(PgStore),
    Document(DocStore),
}

impl Store {
    pub fn open(tag: &str, cfg: &AppConfig) -> Result<Self, StoreError> {
        let store = match StoreKind::parse(tag)? {
            StoreKind::Postgres => Store::Postgres(PgStore::new(cfg.postgres.clone())),
            StoreKind::Document => Store::Document(DocStore::new(cfg.docstore.clone())),
        };
        Ok(store)
    }

    /// Open and connect in one step, for commands that cannot run without storage.
    pub async fn connected(tag: &str, cfg: &AppConfig) -> Result<Self, StoreError> {
        let mut store = Self::open(tag, cfg)?;
        store.connect().await?;
        Ok(store)
    }
}

impl ProductStore for Store {
    fn backend(&self) -> &'static str {
        match self {
            Store::Postgres(s) => s.backend(),
            Store::Document(s) => s.backend(),
        }
    }

    async fn connect(&mut self) -> Result<(), StoreError> {
        match self {
            Store::Postgres(s) => s.connect().await,
            Store::Document(s) => s.connect().await,
        }
    }

    async fn try_upsert(&self, records: &[Product]) -> Result<usize, StoreError> {
        match self {
            Store::Postgres(s) => s.try_upsert(records).await,
            Store::Document(s) => s.try_upsert(records).await,
        }
    }

    async fn query(&self, limit: Option<i64>) -> Result<Vec<Row>, StoreError> {
        match self {
            Store::Postgres(s) => s.query(limit).await,
            Store::Document(s) => s.query(limit).await,
        }
    }

    async fn stats(&self) -> Result<StorageStats, StoreError> {
        match self {
            Store::Postgres(s) => s.stats().await,
            Store::Document(s) => s.stats().await,
        }
    }

    async fn disconnect(&mut self) {
        match self {
            Store::Postgres(s) => s.disconnect().await,
            Store::Document(s) => s.disconnect().await,
        }
    }
}

/// Rejects the whole batch before any write if a record lacks its natural key.
fn validate_batch(records: &[Product]) -> Result<(), StoreError> {
    for (idx, p) in records.iter().enumerate() {
        if p.name.trim().is_empty() {
            return Err(StoreError::Persistence(format!("record {} has an empty name", idx)));
        }
        if p.source_url.trim().is_empty() {
            return Err(StoreError::Persistence(format!("record {} ({}) has an empty source_url", idx, p.name)));
        }
    }
    Ok(())
}

/// Shared row shape so both backends answer `query` with the same field names.
fn product_row(p: &Product) -> Row {
    match serde_json::to_value(p) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AppConfig {
        AppConfig::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn factory_selects_by_tag() {
        assert_eq!(Store::open("postgresql", &cfg()).unwrap().backend(), "postgresql");
        assert_eq!(Store::open("Postgres", &cfg()).unwrap().backend(), "postgresql");
        assert_eq!(Store::open("docstore", &cfg()).unwrap().backend(), "docstore");
        assert_eq!(StoreKind::parse(" DOCUMENT ").unwrap(), StoreKind::Document);
    }

    #[test]
    fn factory_rejects_unknown_tag() {
        match Store::open("oracle", &cfg()) {
            Err(StoreError::UnsupportedBackend(tag)) => assert_eq!(tag, "oracle"),
            _ => panic!("expected UnsupportedBackend"),
        }
    }

    #[test]
    fn batch_validation() {
        let now = chrono::Utc::now();
        let good = Product::new("A", "https://s.test/", now);
        let nameless = Product::new(" ", "https://s.test/", now);
        assert!(validate_batch(&[good.clone()]).is_ok());
        assert!(validate_batch(&[good, nameless]).is_err());
    }

    #[test]
    fn row_uses_field_names() {
        let p = Product::new("A", "https://s.test/", chrono::Utc::now());
        let row = product_row(&p);
        for key in ["name", "tagline", "description", "url", "votes", "comments", "maker", "category", "launch_date", "image_url", "scraped_at", "source_url"] {
            assert!(row.contains_key(key), "missing {}", key);
        }
        assert!(row["scraped_at"].is_string());
    }
}
