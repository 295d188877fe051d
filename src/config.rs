use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::ExportError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Category pages scraped when no URLs are given on the command line.
pub const DEFAULT_URLS: [&str; 5] = [
    "https://www.producthunt.com/",
    "https://www.producthunt.com/topics/developer-tools",
    "https://www.producthunt.com/topics/artificial-intelligence",
    "https://www.producthunt.com/topics/productivity",
    "https://www.producthunt.com/topics/design-tools",
];

#[derive(Clone, Debug)]
pub struct PgParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Full DSN; wins over the discrete fields when set.
    pub url: Option<String>,
}

impl PgParams {
    /// Human-readable target with the password left out.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(u) => match url::Url::parse(u) {
                Ok(mut parsed) => {
                    if parsed.password().is_some() { let _ = parsed.set_password(Some("***")); }
                    parsed.to_string()
                }
                Err(_) => "<unparseable DATABASE_URL>".to_string(),
            },
            None => format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DocStoreParams {
    pub uri: String,
    pub database: String,
}

#[derive(Clone, Debug)]
pub struct ScrapeSettings {
    pub delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = ExportError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExportSettings {
    pub enabled: bool,
    pub format: ExportFormat,
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub postgres: PgParams,
    pub docstore: DocStoreParams,
    pub scrape: ScrapeSettings,
    pub export: ExportSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |k: &str, d: &str| get(k).unwrap_or_else(|| d.to_string());

        let postgres = PgParams {
            host: or("POSTGRES_HOST", "localhost"),
            port: parse_or(&get, "POSTGRES_PORT", 5432u16)?,
            database: or("POSTGRES_DB", "producthunt_data"),
            user: or("POSTGRES_USER", "postgres"),
            password: or("POSTGRES_PASSWORD", ""),
            url: get("DATABASE_URL").filter(|s| !s.trim().is_empty()),
        };

        let docstore = DocStoreParams {
            uri: or("DOCSTORE_URI", "file://./data/docstore"),
            database: or("DOCSTORE_DB", "producthunt_data"),
        };

        let delay_secs: f64 = parse_or(&get, "SCRAP_DELAY", 2.0)?;
        let timeout_secs: u64 = parse_or(&get, "TIMEOUT", 30)?;
        let scrape = ScrapeSettings {
            delay: secs(delay_secs).context("SCRAP_DELAY must be a non-negative number of seconds")?,
            timeout: Duration::from_secs(timeout_secs),
            user_agent: or("USER_AGENT", DEFAULT_USER_AGENT),
        };

        let format = or("OUTPUT_FORMAT", "json")
            .parse::<ExportFormat>()
            .context("OUTPUT_FORMAT must be json or csv")?;
        let export = ExportSettings {
            enabled: or("SAVE_TO_FILE", "true").eq_ignore_ascii_case("true"),
            format,
            path: PathBuf::from(or("FILE_PATH", "./data/scraped_data.json")),
        };

        Ok(AppConfig { postgres, docstore, scrape, export })
    }
}

/// Seconds as a float (CLI `--delay 1.5`) into a Duration; rejects negatives and NaN.
pub fn secs(v: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(v).with_context(|| format!("invalid duration: {}s", v))
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().with_context(|| format!("invalid {}={:?}", key, raw)),
        None => Ok(default),
    }
}
