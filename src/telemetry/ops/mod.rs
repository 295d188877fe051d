pub mod scrape;
pub mod stats;
pub mod query;
