use anyhow::Result;
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{info, warn, error, Span};

use crate::model::{ScrapeOutcome, StorageStats};
use crate::output::{Emitter, Envelope, Meta, OutputConfig};

pub trait PhaseSpan {
    fn name(&self) -> &'static str;
    fn span(&self) -> Span;
}

pub trait OpMarker {
    const NAME: &'static str;
    type Phase: PhaseSpan;
    fn root_span() -> Span;
}

pub struct LogCtx<O: OpMarker> {
    pub(crate) json: bool,
    pub(crate) _marker: PhantomData<O>,
}

impl<O: OpMarker> LogCtx<O> {
    fn op_name(&self) -> &'static str { O::NAME }

    pub fn root_span_kv<'a, T>(&self, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = O::root_span();
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), "start");
        } else {
            info!(op = %self.op_name(), details = %details, "start");
        }
        span
    }

    pub fn span(&self, ph: &O::Phase) -> Span { ph.span() }

    pub fn span_kv<'a, T>(&self, ph: &O::Phase, fields: T) -> Span
    where
        T: IntoIterator<Item = (&'a str, String)>,
    {
        let span = self.span(ph);
        let details = kv_to_string(fields);
        if details.is_empty() {
            info!(op = %self.op_name(), phase = ph.name(), "span_start");
        } else {
            info!(op = %self.op_name(), phase = ph.name(), details = %details, "span_start");
        }
        span
    }

    pub fn info(&self, msg: impl AsRef<str>) { if self.json { info!(op = %self.op_name(), "{}", msg.as_ref()); } else { info!("{}", msg.as_ref()); } }
    pub fn warn(&self, msg: impl AsRef<str>) { if self.json { warn!(op = %self.op_name(), "{}", msg.as_ref()); } else { warn!("{}", msg.as_ref()); } }
    pub fn error(&self, msg: impl AsRef<str>) { if self.json { error!(op = %self.op_name(), "{}", msg.as_ref()); } else { error!("{}", msg.as_ref()); } }

    pub fn info_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); info!(op = %self.op_name(), details = %details, "{}", msg); }
        else { info!("{}", msg); }
    }

    pub fn warn_kv<'a, D>(&self, msg: &str, kv: D)
    where
        D: IntoIterator<Item = (&'a str, String)>,
    {
        if self.json { let details = kv_to_string(kv); warn!(op = %self.op_name(), details = %details, "{}", msg); }
        else { warn!("{}", msg); }
    }

    /// Result envelope on stdout, rendered by the configured presenter.
    pub fn result<T: Serialize>(&self, result: &T, meta: Option<Meta>) -> Result<()> {
        let env = Envelope::result(self.op_name(), result, meta)?;
        Emitter::from_env(OutputConfig::from_env()).emit(&env)?;
        Ok(())
    }

    pub fn storage_stats(&self, backend: &str, s: &StorageStats) {
        if self.json {
            info!(op = %self.op_name(), backend, total = s.total_products, sources = s.unique_sources,
                last_scraped = ?s.last_scraped, avg_votes = ?s.avg_votes, "storage_stats");
        } else {
            let last = s.last_scraped.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string());
            let avg = s.avg_votes.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string());
            info!("📊 {} stats — products={} sources={} last_scraped={} avg_votes={}", backend, s.total_products, s.unique_sources, last, avg);
        }
    }
}

impl LogCtx<crate::telemetry::ops::scrape::Scrape> {
    pub fn page_summary(&self, o: &ScrapeOutcome) {
        let records = o.records.len();
        match (&o.error_message, self.json) {
            (None, true) => info!(op = %self.op_name(), url = %o.page_url, records, "page_summary"),
            (None, false) => info!("✅ {} — records={}", o.page_url, records),
            (Some(err), true) => error!(op = %self.op_name(), url = %o.page_url, error = %err, "page_failed"),
            (Some(err), false) => error!("❌ {} — {}", o.page_url, err),
        }
    }

    pub fn totals(&self, pages: usize, failed: usize, records: usize) {
        if self.json { info!(op = %self.op_name(), pages, failed, records, "scrape_totals"); }
        else { info!("📦 Scrape totals — pages={} failed={} records={}", pages, failed, records); }
    }
}

fn kv_to_string<'a, T>(kv: T) -> String
where
    T: IntoIterator<Item = (&'a str, String)>,
{
    let mut parts: Vec<String> = Vec::new();
    for (k, v) in kv { parts.push(format!("{}={}", k, v)); }
    parts.join(" ")
}
