#![forbid(unsafe_code)]
//! # Tweet Analysis
//!
//! Streaming analyzer for social-media datasets collected as delimited
//! text. One pass over the input builds statistics, interaction
//! networks and per-user indices; afterwards a fixed set of tables,
//! Gephi graphs and word-cloud blobs is written to the working
//! directory and a textual overview is returned for printing.
//!
//! Four input layouts are recognized from the header row: the current
//! collector format, Gephi edge-list exports, the YourTwapperKeeper
//! legacy format and ExportComments tweet exports. Corrupt rows are
//! counted and skipped, never fatal; only an unreadable input file or a
//! run without a single valid row fails.
//!
//! ## Example
//! ```bash
//! cargo run --release -- tweets.csv --time-format "%d/%m/%Y" --utc-offset -3
//! ```

pub mod engine;
pub mod gender;
pub mod geo;
pub mod interactions;
pub mod output;
pub mod report;
pub mod schema;
pub mod state;
pub mod text;

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use chrono::format::{Item, StrftimeItems};
use clap::ValueEnum;
use log::info;
use thiserror::Error;

use crate::engine::EngineConfig;
use crate::geo::Gazetteer;
use crate::schema::{ColumnMap, SchemaVariant, classify_schema, detect_delimiter_in, normalize_name};

pub use crate::output::csv_safe_cell;
pub use crate::report::Summary;

/// Output quoting behavior, mapped onto the CSV writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuotingMode {
    /// Quote only when required.
    Minimal,
    /// Quote every field.
    All,
    /// Never quote.
    None,
    /// Quote everything that is not a number.
    NonNumeric,
}

impl From<QuotingMode> for csv::QuoteStyle {
    fn from(mode: QuotingMode) -> csv::QuoteStyle {
        match mode {
            QuotingMode::Minimal => csv::QuoteStyle::Necessary,
            QuotingMode::All => csv::QuoteStyle::Always,
            QuotingMode::None => csv::QuoteStyle::Never,
            QuotingMode::NonNumeric => csv::QuoteStyle::NonNumeric,
        }
    }
}

/// Configuration surface of one analysis run.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Output field delimiter.
    pub delimiter: u8,
    pub quoting: QuotingMode,
    /// strftime format used as the per-period bucket key. Must be
    /// injective over the capture window to keep days apart.
    pub time_format: String,
    /// UTC offset in hours applied before bucketing.
    pub utc_offset_hours: i32,
    /// Optional GeoNames gazetteer for reverse geocoding.
    pub gazetteer: Option<PathBuf>,
    /// When set, rows with an empty value in this column are skipped.
    pub consider: Option<String>,
    /// Language allow-list for ExportComments inputs; empty keeps all.
    pub languages: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            delimiter: b',',
            quoting: QuotingMode::Minimal,
            time_format: "%d/%m/%Y".to_string(),
            utc_offset_hours: 0,
            gazetteer: None,
            consider: None,
            languages: Vec::new(),
        }
    }
}

/// Fatal failures of a run. Row-level anomalies are counted in the
/// report instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unable to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("input file has no header line")]
    EmptyInput,
    #[error("invalid time format string '{0}'")]
    InvalidTimeFormat(String),
    #[error("invalid UTC offset {0}")]
    InvalidUtcOffset(i32),
    #[error("not enough data to parse")]
    NoValidRows,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct Report {
    /// Line accounting followed by the fixed-order overview; printed
    /// verbatim by the CLI.
    pub summary: String,
    pub schema: SchemaVariant,
    pub total_lines: u64,
    pub valid_lines: u64,
    pub corrupted_lines: u64,
    pub duplicate_lines: u64,
    pub ads_lines: u64,
    pub language_filtered_lines: u64,
}

fn validate_time_format(fmt: &str) -> Result<(), ParseError> {
    let has_error = StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error));
    if has_error {
        Err(ParseError::InvalidTimeFormat(fmt.to_string()))
    } else {
        Ok(())
    }
}

/// Analyze one dataset. Output files land in the current working
/// directory; the returned report carries the overview text.
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Report, ParseError> {
    let path = path.as_ref();
    validate_time_format(&options.time_format)?;
    let utc_offset = FixedOffset::east_opt(options.utc_offset_hours * 3600)
        .ok_or(ParseError::InvalidUtcOffset(options.utc_offset_hours))?;

    // The delimiter is sniffed from the raw header line before the CSV
    // reader is built.
    let mut first_line = String::new();
    BufReader::new(std::fs::File::open(path)?).read_line(&mut first_line)?;
    let first_line = first_line.trim_end_matches(['\n', '\r']);
    if first_line.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let delimiter = detect_delimiter_in(first_line).unwrap_or(b',');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut header = csv::StringRecord::new();
    if !reader.read_record(&mut header)? {
        return Err(ParseError::EmptyInput);
    }
    let header_fields: Vec<String> = header.iter().map(|s| s.to_string()).collect();
    let schema = classify_schema(&header_fields);
    match schema {
        SchemaVariant::GephiEdges => info!("Gephi edges network data found"),
        SchemaVariant::Current => info!("up-to-date tweets dataset found"),
        SchemaVariant::LegacyAggregator => info!("YourTwapperKeeper dataset found"),
        SchemaVariant::ExportComments => info!("ExportComments dataset found"),
    }
    let cols = ColumnMap::from_header(&header_fields);
    let gazetteer = Gazetteer::load(options.gazetteer.as_deref());
    let consider_column = options
        .consider
        .as_deref()
        .and_then(|name| cols.position(&normalize_name(name)));

    let engine_cfg = EngineConfig {
        schema,
        cols: &cols,
        time_format: &options.time_format,
        utc_offset,
        consider_column,
        languages: &options.languages,
        gazetteer: &gazetteer,
    };
    let state = engine::run(&mut reader, &header, &engine_cfg);

    let mut accounting = format!("Read {} total lines.", state.total_lines());
    if state.corrupted_lines > 0 {
        accounting.push_str(&format!("\n{} corrupted lines.", state.corrupted_lines));
    }
    if state.ads_lines > 0 {
        accounting.push_str(&format!("\n{} ads lines.", state.ads_lines));
    }
    if state.language_filtered_lines > 0 {
        accounting.push_str(&format!(
            "\n{} different language lines.",
            state.language_filtered_lines
        ));
    }
    if state.duplicate_lines > 0 {
        accounting.push_str(&format!("\n{} duplicate tweets.", state.duplicate_lines));
    }
    if state.valid_lines() > 0 {
        accounting.push_str(&format!("\n{} valid lines.", state.valid_lines()));
    }

    // No output files are written when nothing survived the pass.
    if state.valid_lines() == 0 {
        return Err(ParseError::NoValidRows);
    }

    let synthesis = report::synthesize(&state, schema);
    let output_cfg = output::OutputConfig {
        delimiter: options.delimiter,
        quote_style: options.quoting.into(),
    };
    report::write_outputs(&state, &synthesis, output_cfg)?;

    let summary = format!("{accounting}\n{}", synthesis.overview);
    info!("{summary}");

    Ok(Report {
        summary,
        schema,
        total_lines: state.total_lines(),
        valid_lines: state.valid_lines(),
        corrupted_lines: state.corrupted_lines,
        duplicate_lines: state.duplicate_lines,
        ads_lines: state.ads_lines,
        language_filtered_lines: state.language_filtered_lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_format_validation() {
        assert!(validate_time_format("%d/%m/%Y").is_ok());
        assert!(validate_time_format("%Y-%m-%d %H:%M").is_ok());
        assert!(matches!(
            validate_time_format("%Q"),
            Err(ParseError::InvalidTimeFormat(_))
        ));
    }

    #[test]
    fn missing_input_is_fatal() {
        let err = parse_file("/no/such/input.csv", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }

    #[test]
    fn quoting_mode_maps_to_quote_style() {
        assert!(matches!(
            csv::QuoteStyle::from(QuotingMode::All),
            csv::QuoteStyle::Always
        ));
        assert!(matches!(
            csv::QuoteStyle::from(QuotingMode::Minimal),
            csv::QuoteStyle::Necessary
        ));
    }
}
