use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{self, AppConfig, ExportFormat, DEFAULT_URLS};
use crate::extractor::Strategy;
use crate::fetch::HttpFetcher;
use crate::output::Meta;
use crate::pipeline::{aggregate, Orchestrator};
use crate::sink::{Exporter, Sink};
use crate::storage::{ProductStore, Store};
use crate::telemetry::{self};
use crate::telemetry::ops::scrape::Phase as ScrapePhase;

mod types;

use types::{PageSummary, ScrapeReport};

#[derive(Args, Debug)]
pub struct ScrapeCmd {
    /// Pages to scrape (default: the Product Hunt front page and four topic pages)
    #[arg(long, num_args = 1..)]
    pub urls: Vec<String>,

    #[arg(long, value_enum, default_value_t = Strategy::Listing)]
    pub engine: Strategy,

    /// Storage backend: postgresql | docstore
    #[arg(long, default_value = "postgresql")]
    pub database: String,

    /// Seconds between page attempts (overrides SCRAP_DELAY)
    #[arg(long)]
    pub delay: Option<f64>,

    /// Per-request timeout in seconds (overrides TIMEOUT)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Export format (overrides OUTPUT_FORMAT)
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Export path (overrides FILE_PATH)
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_export: bool,

    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    /// Accepted for compatibility; pages are fetched without a browser
    #[arg(long, default_value_t = false)]
    pub headless: bool,
}

pub async fn run(cfg: &AppConfig, args: ScrapeCmd) -> Result<()> {
    let t0 = Instant::now();
    let log = telemetry::scrape();
    let urls = target_urls(&args);
    let _g = log.root_span_kv([
        ("urls", urls.len().to_string()),
        ("engine", format!("{:?}", args.engine)),
        ("database", args.database.clone()),
        ("no_store", args.no_store.to_string()),
        ("no_export", args.no_export.to_string()),
        ("headless", args.headless.to_string()),
    ]).entered();
    if args.headless {
        debug!("--headless ignored: no browser engine");
    }

    // an unknown backend tag fails here, before anything is fetched
    let store = if args.no_store { None } else { Some(Store::open(&args.database, cfg)?) };
    let delay = match args.delay { Some(d) => config::secs(d)?, None => cfg.scrape.delay };
    let timeout = args.timeout.map(Duration::from_secs).unwrap_or(cfg.scrape.timeout);

    let mut store = match store {
        Some(mut s) => {
            let _s = log.span(&ScrapePhase::Connect).entered();
            match s.connect().await {
                Ok(()) => Some(s),
                Err(e) => {
                    let msg = format!("⚠️ {} unavailable ({}); continuing with file export only", s.backend(), e);
                    log.warn_kv(&msg, [("backend", s.backend().to_string()), ("error", e.to_string())]);
                    None
                }
            }
        }
        None => None,
    };

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping after the current page");
                cancel.cancel();
            }
        })
    };

    let fetcher = HttpFetcher::new(&cfg.scrape.user_agent)?;
    let orch = Orchestrator::new(fetcher, args.engine, delay, timeout).with_cancel(cancel);
    log.info(format!("🚀 Scraping {} pages (engine={:?}, delay={:?})", urls.len(), args.engine, delay));
    let outcomes = {
        let _s = log.span_kv(&ScrapePhase::Crawl, [("pages", urls.len().to_string())]).entered();
        orch.run(&urls).await
    };
    watcher.abort();

    for o in &outcomes { log.page_summary(o); }
    let records = { let _s = log.span(&ScrapePhase::Aggregate).entered(); aggregate(&outcomes) };
    let failed = outcomes.iter().filter(|o| !o.success).count();
    log.totals(outcomes.len(), failed, records.len());
    if !outcomes.is_empty() && failed == outcomes.len() {
        log.warn("⚠️ Every page failed; nothing to store or export");
    }

    let delivery = {
        let _s = log.span_kv(&ScrapePhase::Deliver, [("records", records.len().to_string())]).entered();
        Sink::new(store.as_ref(), exporter_for(cfg, &args)).deliver(&records).await
    };
    match (delivery.stored, &store) {
        (Some(true), Some(s)) => log.info(format!("💾 Saved {} records to {}", records.len(), s.backend())),
        (Some(false), Some(s)) => log.error(format!("💥 Saving to {} failed; batch rolled back", s.backend())),
        _ => {}
    }
    if let Some(path) = &delivery.exported {
        log.info_kv(&format!("📝 Exported to {}", path.display()), [("path", path.display().to_string()), ("records", records.len().to_string())]);
    }

    let stats = match &store {
        Some(s) => {
            let _s = log.span(&ScrapePhase::Stats).entered();
            match s.stats().await {
                Ok(st) => { log.storage_stats(s.backend(), &st); Some(st) }
                Err(e) => { log.warn_kv("stats unavailable", [("error", e.to_string())]); None }
            }
        }
        None => None,
    };
    if let Some(s) = store.as_mut() { s.disconnect().await; }

    if telemetry::config::json_mode() {
        let report = ScrapeReport {
            engine: args.engine,
            backend: store.as_ref().map(|s| s.backend()),
            pages: outcomes.iter().map(PageSummary::from).collect(),
            delivery,
            stats,
        };
        log.result(&report, Some(Meta { duration_ms: Some(t0.elapsed().as_millis()) }))?;
    }

    log.info("✅ Scrape finished");
    Ok(())
}

fn target_urls(args: &ScrapeCmd) -> Vec<String> {
    if args.urls.is_empty() {
        DEFAULT_URLS.iter().map(|u| u.to_string()).collect()
    } else {
        args.urls.clone()
    }
}

fn exporter_for(cfg: &AppConfig, args: &ScrapeCmd) -> Option<Exporter> {
    if args.no_export || !cfg.export.enabled {
        return None;
    }
    let format = args.format.unwrap_or(cfg.export.format);
    let path = args.output.clone().unwrap_or_else(|| cfg.export.path.clone());
    Some(Exporter::new(format, path))
}
