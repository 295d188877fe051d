pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

pub fn scrape() -> LogCtx<ops::scrape::Scrape> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn stats() -> LogCtx<ops::stats::Stats> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn query() -> LogCtx<ops::query::Query> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
