mod export;

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::model::Product;
use crate::storage::ProductStore;

pub use export::Exporter;

/// What happened to one aggregate delivery. `None` means the target was not configured.
#[derive(Debug, Default, Serialize)]
pub struct Delivery {
    pub records: usize,
    pub stored: Option<bool>,
    pub exported: Option<PathBuf>,
    pub export_error: Option<String>,
}

/// Fans the aggregate out to storage and file export. The two targets are
/// independent: a failure in one never undoes or skips the other.
pub struct Sink<'a, S> {
    store: Option<&'a S>,
    exporter: Option<Exporter>,
}

impl<'a, S: ProductStore> Sink<'a, S> {
    pub fn new(store: Option<&'a S>, exporter: Option<Exporter>) -> Self {
        Self { store, exporter }
    }

    pub async fn deliver(&self, records: &[Product]) -> Delivery {
        let mut out = Delivery { records: records.len(), ..Default::default() };
        if records.is_empty() {
            warn!("no products to deliver");
            return out;
        }

        if let Some(store) = self.store {
            out.stored = Some(store.upsert(records).await);
        }

        if let Some(exp) = &self.exporter {
            match exp.export(records).await {
                Ok(n) => {
                    info!(path = %exp.path().display(), records = n, "export written");
                    out.exported = Some(exp.path().to_path_buf());
                }
                Err(e) => {
                    error!(path = %exp.path().display(), error = %e, "export failed");
                    out.export_error = Some(e.to_string());
                }
            }
        }
        out
    }
}
