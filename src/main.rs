use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod config;
mod error;
mod extractor;
mod fetch;
mod model;
mod output;
mod pipeline;
mod query;
mod scrape;
mod sink;
mod stats;
mod storage;
mod telemetry;

#[derive(Parser)]
#[command(name = "pscrape", about = "Product listing scraper CLI")]
struct Cli {
    /// Postgres DSN; overrides DATABASE_URL and the POSTGRES_* settings
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Scrape(scrape::ScrapeCmd),
    Stats(stats::StatsCmd),
    Query(query::QueryCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr, plus files under PSCRAPE_LOG_DIR)
    let _log_guards = telemetry::config::init_tracing();

    let mut cfg = config::AppConfig::from_env()?;
    if let Some(dsn) = cli.dsn {
        cfg.postgres.url = Some(dsn);
    }

    match cli.command {
        Commands::Scrape(args) => scrape::run(&cfg, args).await?,
        Commands::Stats(args) => stats::run(&cfg, args).await?,
        Commands::Query(args) => query::run(&cfg, args).await?,
    }

    Ok(())
}
