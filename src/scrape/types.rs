use serde::Serialize;

use crate::extractor::Strategy;
use crate::model::{ScrapeOutcome, StorageStats};
use crate::sink::Delivery;

#[derive(Serialize)]
pub struct PageSummary {
    pub url: String,
    pub success: bool,
    pub records: usize,
    pub error: Option<String>,
}

impl From<&ScrapeOutcome> for PageSummary {
    fn from(o: &ScrapeOutcome) -> Self {
        PageSummary {
            url: o.page_url.clone(),
            success: o.success,
            records: o.records.len(),
            error: o.error_message.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ScrapeReport {
    pub engine: Strategy,
    pub backend: Option<&'static str>,
    pub pages: Vec<PageSummary>,
    pub delivery: Delivery,
    pub stats: Option<StorageStats>,
}
