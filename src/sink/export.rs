use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::config::ExportFormat;
use crate::error::ExportError;
use crate::model::Product;

/// Header row, in `Product` field order.
const COLUMNS: [&str; 12] = [
    "name", "tagline", "description", "url", "votes", "comments",
    "maker", "category", "launch_date", "image_url", "scraped_at", "source_url",
];

/// Writes one file per run from the aggregate records; no fields are added.
#[derive(Clone, Debug)]
pub struct Exporter {
    format: ExportFormat,
    path: PathBuf,
}

impl Exporter {
    /// For CSV a configured `.json` path is swapped to `.csv`.
    pub fn new(format: ExportFormat, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = match format {
            ExportFormat::Csv if path.extension().is_some_and(|e| e == "json") => path.with_extension("csv"),
            _ => path,
        };
        Self { format, path }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Writes a sibling temp file and renames it over the target, so a failed
    /// export never leaves a truncated file behind.
    pub fn write(&self, records: &[Product]) -> Result<usize, ExportError> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        match self.format {
            ExportFormat::Json => write_json(&mut tmp, records)?,
            ExportFormat::Csv => write_csv(&mut tmp, records)?,
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(records.len())
    }

    /// `write` on the blocking pool, for callers on the async runtime.
    pub async fn export(&self, records: &[Product]) -> Result<usize, ExportError> {
        let exporter = self.clone();
        let records = records.to_vec();
        tokio::task::spawn_blocking(move || exporter.write(&records))
            .await
            .map_err(|e| ExportError::Io(io::Error::other(e)))?
    }
}

fn write_json(out: impl Write, records: &[Product]) -> Result<(), ExportError> {
    let mut w = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut w, records)?;
    writeln!(w)?;
    w.flush()?;
    Ok(())
}

fn write_csv(out: impl Write, records: &[Product]) -> Result<(), ExportError> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    w.write_record(COLUMNS)?;
    for p in records {
        w.write_record(csv_row(p))?;
    }
    w.flush()?;
    Ok(())
}

fn csv_row(p: &Product) -> [String; 12] {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    let num = |v: Option<i32>| v.map(|n| n.to_string()).unwrap_or_default();
    let ts = |v: Option<DateTime<Utc>>| v.map(|t| t.to_rfc3339()).unwrap_or_default();
    [
        p.name.clone(),
        p.tagline.clone(),
        opt(&p.description),
        opt(&p.url),
        num(p.votes),
        num(p.comments),
        opt(&p.maker),
        opt(&p.category),
        ts(p.launch_date),
        opt(&p.image_url),
        p.scraped_at.to_rfc3339(),
        p.source_url.clone(),
    ]
}
