use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tagline stored when a listing carries no description text.
pub const TAGLINE_DEFAULT: &str = "No description available";

/// One product as listed on a discovery page.
///
/// `(name, source_url)` is the natural key: re-extracting the same page
/// updates the existing row instead of adding a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub tagline: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub votes: Option<i32>,
    pub comments: Option<i32>,
    pub maker: Option<String>,
    pub category: Option<String>,
    pub launch_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub source_url: String,
}

impl Product {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>, scraped_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tagline: TAGLINE_DEFAULT.to_string(),
            description: None,
            url: None,
            votes: None,
            comments: None,
            maker: None,
            category: None,
            launch_date: None,
            image_url: None,
            scraped_at,
            source_url: source_url.into(),
        }
    }

    pub fn natural_key(&self) -> (&str, &str) {
        (&self.name, &self.source_url)
    }
}

/// Result of one fetch-and-extract attempt. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub records: Vec<Product>,
    pub page_url: String,
    pub scraped_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl ScrapeOutcome {
    pub fn succeeded(page_url: &str, records: Vec<Product>, scraped_at: DateTime<Utc>) -> Self {
        Self { success: true, records, page_url: page_url.to_string(), scraped_at, error_message: None }
    }

    pub fn failed(page_url: &str, error: impl ToString, scraped_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            records: Vec::new(),
            page_url: page_url.to_string(),
            scraped_at,
            error_message: Some(error.to_string()),
        }
    }
}

/// Aggregate projection over everything a backend currently holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageStats {
    pub total_products: i64,
    pub unique_sources: i64,
    pub last_scraped: Option<DateTime<Utc>>,
    pub avg_votes: Option<f64>,
}
