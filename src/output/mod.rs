//! Output module for crawl results
//!
//! This module handles:
//! - Serializing crawl records as a JSON array or JSON Lines
//! - Summarizing a crawl report as run statistics

pub mod stats;

pub use stats::{print_statistics, CrawlStatistics};

use crate::crawler::CrawlRecord;
use crate::TrawlError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serialization format for crawl records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// A single pretty-printed JSON array
    #[default]
    Json,
    /// One JSON object per line
    Jsonl,
}

/// Writes records to `writer` in the requested format
///
/// Each record is `{"url": ..., "data": {"title", "headings", "links"}}`.
pub fn write_records<W: Write>(
    records: &[CrawlRecord],
    format: OutputFormat,
    mut writer: W,
) -> Result<(), TrawlError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, records)?;
            writeln!(writer)?;
        }
        OutputFormat::Jsonl => {
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Writes records to a file, replacing any existing content
pub fn write_records_to_path(
    records: &[CrawlRecord],
    format: OutputFormat,
    path: &Path,
) -> Result<(), TrawlError> {
    let file = File::create(path)?;
    write_records(records, format, BufWriter::new(file))?;
    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
