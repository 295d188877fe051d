mod containers;
mod dom;
mod fields;
mod headlines;

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::model::Product;

pub use headlines::extract_headlines_at;

/// Which parser turns a page into products.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Container cascade over listing markup.
    Listing,
    /// Degraded heading scan for bare pages.
    Headlines,
}

impl Strategy {
    pub fn apply(&self, html: &str, source_url: &str, at: DateTime<Utc>) -> Vec<Product> {
        match self {
            Strategy::Listing => extract_at(html, source_url, at),
            Strategy::Headlines => extract_headlines_at(html, source_url, at),
        }
    }
}

/// Never fails: unrecognizable markup yields an empty list, and a container
/// without a name is skipped.
pub fn extract_at(html: &str, source_url: &str, at: DateTime<Utc>) -> Vec<Product> {
    let doc = Html::parse_document(html);
    let base = match Url::parse(source_url) {
        Ok(u) => Some(u),
        Err(e) => {
            warn!(source_url, error = %e, "source url does not parse; relative links stay unresolved");
            None
        }
    };

    let items = containers::locate(&doc);
    if items.is_empty() {
        warn!(source_url, "no product containers found");
        return Vec::new();
    }

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match fields::product_from(item, source_url, base.as_ref(), at) {
            Some(p) => out.push(p),
            None => debug!(source_url, idx, "container dropped: no name"),
        }
    }
    debug!(source_url, found = out.len(), "extracted products");
    out
}
