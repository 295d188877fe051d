use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::storage::{ProductStore, Row, Store};
use crate::telemetry::{self};
use crate::telemetry::ops::query::Phase as QueryPhase;

#[derive(Args, Debug)]
pub struct QueryCmd {
    /// Storage backend: postgresql | docstore
    #[arg(long, default_value = "postgresql")]
    pub database: String,

    /// Maximum rows, newest first (default: all)
    #[arg(long)]
    pub limit: Option<i64>,
}

#[derive(Serialize)]
struct QueryResult<'a> {
    backend: &'static str,
    count: usize,
    rows: &'a [Row],
}

pub async fn run(cfg: &AppConfig, args: QueryCmd) -> Result<()> {
    let log = telemetry::query();
    let _g = log.root_span_kv([
        ("database", args.database.clone()),
        ("limit", format!("{:?}", args.limit)),
    ]).entered();

    if args.limit.is_some_and(|n| n < 0) {
        anyhow::bail!("--limit must be zero or positive");
    }

    let mut store = {
        let _s = log.span(&QueryPhase::Connect).entered();
        Store::connected(&args.database, cfg).await.with_context(|| format!("open {} storage", args.database))?
    };

    let rows = {
        let _s = log.span(&QueryPhase::FetchRows).entered();
        store.query(args.limit).await
    };
    store.disconnect().await;
    let rows = rows.context("query stored products")?;

    let _s = log.span(&QueryPhase::Output).entered();
    if telemetry::config::json_mode() {
        log.result(&QueryResult { backend: store.backend(), count: rows.len(), rows: &rows }, None)?;
    } else {
        log.info(format!("🗂️ {} products from {}", rows.len(), store.backend()));
        for r in &rows { log.info(format!("  {}", row_line(r))); }
    }
    Ok(())
}

fn row_line(r: &Row) -> String {
    let text = |k: &str| r.get(k).and_then(Value::as_str).unwrap_or("-").to_string();
    let votes = r.get("votes").and_then(Value::as_i64).map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    format!("{}  {}  votes={}  {}", text("scraped_at"), text("name"), votes, text("source_url"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_line_tolerates_missing_fields() {
        let full = json!({"name": "Widget", "votes": 3, "scraped_at": "2024-01-01T00:00:00+00:00", "source_url": "https://s.test/"});
        let Value::Object(full) = full else { unreachable!() };
        assert_eq!(row_line(&full), "2024-01-01T00:00:00+00:00  Widget  votes=3  https://s.test/");

        let Value::Object(sparse) = json!({"name": "Bare", "votes": null}) else { unreachable!() };
        assert_eq!(row_line(&sparse), "-  Bare  votes=-  -");
    }
}
