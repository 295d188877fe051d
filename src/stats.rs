use anyhow::{Context, Result};
use clap::Args;

use crate::config::AppConfig;
use crate::storage::{ProductStore, Store};
use crate::telemetry::{self};
use crate::telemetry::ops::stats::Phase as StatsPhase;

#[derive(Args, Debug)]
pub struct StatsCmd {
    /// Storage backend: postgresql | docstore
    #[arg(long, default_value = "postgresql")]
    pub database: String,
}

pub async fn run(cfg: &AppConfig, args: StatsCmd) -> Result<()> {
    let log = telemetry::stats();
    let _g = log.root_span_kv([("database", args.database.clone())]).entered();

    let mut store = {
        let _s = log.span(&StatsPhase::Connect).entered();
        Store::connected(&args.database, cfg).await.with_context(|| format!("open {} storage", args.database))?
    };

    let stats = {
        let _s = log.span(&StatsPhase::Summary).entered();
        store.stats().await
    };
    store.disconnect().await;
    let stats = stats.context("read storage stats")?;

    log.storage_stats(store.backend(), &stats);
    if telemetry::config::json_mode() {
        log.result(&stats, None)?;
    }
    Ok(())
}
