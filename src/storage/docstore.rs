use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::DocStoreParams;
use crate::error::StoreError;
use crate::model::{Product, StorageStats};

use super::{product_row, validate_batch, ProductStore, Row};

const COLLECTION: &str = "products";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    product: Product,
    updated_at: DateTime<Utc>,
}

/// Documents in insertion order plus the unique `(name, source_url)` index.
#[derive(Clone, Default)]
struct Collection {
    docs: Vec<Document>,
    index: HashMap<(String, String), usize>,
}

impl Collection {
    fn from_docs(docs: Vec<Document>) -> Result<Self, String> {
        let mut index = HashMap::with_capacity(docs.len());
        for (pos, d) in docs.iter().enumerate() {
            let key = (d.product.name.clone(), d.product.source_url.clone());
            if index.insert(key, pos).is_some() {
                return Err(format!("duplicate key ({}, {})", d.product.name, d.product.source_url));
            }
        }
        Ok(Self { docs, index })
    }

    fn upsert(&mut self, p: &Product, now: DateTime<Utc>) {
        let (name, source) = p.natural_key();
        let key = (name.to_string(), source.to_string());
        match self.index.get(&key) {
            Some(&pos) => {
                let doc = &mut self.docs[pos];
                doc.product.tagline = p.tagline.clone();
                doc.product.description = p.description.clone();
                doc.product.votes = p.votes;
                doc.product.comments = p.comments;
                doc.updated_at = now;
            }
            None => {
                self.index.insert(key, self.docs.len());
                self.docs.push(Document { id: Uuid::new_v4().to_string(), product: p.clone(), updated_at: now });
            }
        }
    }
}

enum Location {
    Memory,
    Snapshot(PathBuf),
}

/// In-process document collection. With a `file://` URI the collection is
/// snapshotted to `<dir>/<database>/products.json` after every committed batch.
pub struct DocStore {
    params: DocStoreParams,
    location: Option<Location>,
    coll: RwLock<Option<Collection>>,
}

impl DocStore {
    pub fn new(params: DocStoreParams) -> Self {
        Self { params, location: None, coll: RwLock::new(None) }
    }

    fn location_for(&self) -> Result<Location, StoreError> {
        let db = self.params.database.trim();
        if db.is_empty() || db.contains(['/', '\\']) || db == ".." {
            return Err(StoreError::Connection(format!("invalid docstore database name {:?}", self.params.database)));
        }
        let uri = self.params.uri.trim();
        if uri == "memory://" || uri == "memory:" {
            return Ok(Location::Memory);
        }
        match uri.strip_prefix("file://") {
            Some(dir) if !dir.is_empty() => {
                Ok(Location::Snapshot(Path::new(dir).join(db).join(format!("{}.json", COLLECTION))))
            }
            _ => Err(StoreError::Connection(format!("unsupported docstore uri {:?}", self.params.uri))),
        }
    }
}

async fn load_snapshot(path: &Path) -> Result<Collection, StoreError> {
    let conn_err = |e: String| StoreError::Connection(format!("{}: {}", path.display(), e));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| conn_err(e.to_string()))?;
    }
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let docs: Vec<Document> = serde_json::from_slice(&bytes).map_err(|e| conn_err(e.to_string()))?;
            Collection::from_docs(docs).map_err(conn_err)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Collection::default()),
        Err(e) => Err(conn_err(e.to_string())),
    }
}

/// Temp file then rename, so readers of the file never see half a batch.
async fn write_snapshot(path: &Path, coll: &Collection) -> Result<(), StoreError> {
    let persist_err = |e: String| StoreError::Persistence(format!("{}: {}", path.display(), e));
    let bytes = serde_json::to_vec_pretty(&coll.docs).map_err(|e| persist_err(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await.map_err(|e| persist_err(e.to_string()))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| persist_err(e.to_string()))?;
    Ok(())
}

fn doc_row(d: &Document) -> Row {
    let mut row = product_row(&d.product);
    row.insert("_id".into(), Value::from(d.id.clone()));
    row.insert("updated_at".into(), Value::from(d.updated_at.to_rfc3339()));
    row
}

impl ProductStore for DocStore {
    fn backend(&self) -> &'static str { "docstore" }

    async fn connect(&mut self) -> Result<(), StoreError> {
        let location = self.location_for()?;
        let coll = match &location {
            Location::Memory => self.coll.get_mut().take().unwrap_or_default(),
            Location::Snapshot(path) => load_snapshot(path).await?,
        };
        info!(uri = %self.params.uri, database = %self.params.database, documents = coll.docs.len(), "docstore connected");
        *self.coll.get_mut() = Some(coll);
        self.location = Some(location);
        Ok(())
    }

    async fn try_upsert(&self, records: &[Product]) -> Result<usize, StoreError> {
        if records.is_empty() { return Ok(0); }
        validate_batch(records)?;

        // writers are serialized; readers see the old collection until the swap
        let mut guard = self.coll.write().await;
        let current = guard
            .as_ref()
            .ok_or_else(|| StoreError::Persistence("docstore is not connected".to_string()))?;

        let mut next = current.clone();
        let now = Utc::now();
        for p in records {
            next.upsert(p, now);
        }

        if let Some(Location::Snapshot(path)) = &self.location {
            write_snapshot(path, &next).await?;
        }
        *guard = Some(next);
        Ok(records.len())
    }

    async fn query(&self, limit: Option<i64>) -> Result<Vec<Row>, StoreError> {
        let guard = self.coll.read().await;
        let coll = guard
            .as_ref()
            .ok_or_else(|| StoreError::Persistence("docstore is not connected".to_string()))?;

        let mut docs: Vec<&Document> = coll.docs.iter().collect();
        // stable sort keeps insertion order among equal timestamps
        docs.sort_by(|a, b| b.product.scraped_at.cmp(&a.product.scraped_at));
        let take = match limit {
            Some(n) => usize::try_from(n.max(0)).unwrap_or(usize::MAX),
            None => usize::MAX,
        };
        Ok(docs.into_iter().take(take).map(doc_row).collect())
    }

    async fn stats(&self) -> Result<StorageStats, StoreError> {
        let guard = self.coll.read().await;
        let coll = guard
            .as_ref()
            .ok_or_else(|| StoreError::Persistence("docstore is not connected".to_string()))?;

        let sources: HashSet<&str> = coll.docs.iter().map(|d| d.product.source_url.as_str()).collect();
        let last_scraped = coll.docs.iter().map(|d| d.product.scraped_at).max();
        let votes: Vec<f64> = coll.docs.iter().filter_map(|d| d.product.votes).map(f64::from).collect();
        let avg_votes = if votes.is_empty() { None } else { Some(votes.iter().sum::<f64>() / votes.len() as f64) };

        Ok(StorageStats {
            total_products: coll.docs.len() as i64,
            unique_sources: sources.len() as i64,
            last_scraped,
            avg_votes,
        })
    }

    async fn disconnect(&mut self) {
        if self.coll.get_mut().take().is_some() {
            info!("docstore closed");
        }
        self.location = None;
    }
}
