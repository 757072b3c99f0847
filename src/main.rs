#![forbid(unsafe_code)]
//! # Tweet Analysis CLI
//!
//! Command-line front end for the `tweet_analysis` crate: analyze one
//! delimited social-media dataset and write the statistics tables,
//! network graphs and word-cloud blobs into the current directory.
//!
//! ## Example
//! ```bash
//! cargo run --release -- tweets.csv --time-format "%d/%m/%Y" --utc-offset -3
//! ```
//!
//! See `--help` for all available options.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use log::error;
use tweet_analysis::{ParseOptions, QuotingMode, parse_file};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Dataset to analyze (delimited text with a single header row)
    input: String,

    /// Output field delimiter
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Output quoting mode
    #[arg(long, value_enum, default_value = "minimal")]
    quoting: QuotingMode,

    /// strftime format for per-period bucketing (e.g. "%d/%m/%Y")
    #[arg(long, default_value = "%d/%m/%Y")]
    time_format: String,

    /// UTC offset in hours applied when bucketing dates
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    utc_offset: i32,

    /// Optional GeoNames gazetteer file for reverse geocoding
    #[arg(long)]
    gazetteer: Option<PathBuf>,

    /// Skip rows whose value in this column is empty
    #[arg(long)]
    consider: Option<String>,

    /// Keep only these languages (comma-separated ISO 639-3 codes,
    /// applies to ExportComments datasets)
    #[arg(long)]
    languages: Option<String>,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    anyhow::ensure!(
        cli.delimiter.is_ascii(),
        "output delimiter must be a single ASCII character"
    );

    let options = ParseOptions {
        delimiter: cli.delimiter as u8,
        quoting: cli.quoting,
        time_format: cli.time_format.clone(),
        utc_offset_hours: cli.utc_offset,
        gazetteer: cli.gazetteer.clone(),
        consider: cli.consider.clone(),
        languages: cli
            .languages
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(|l| l.trim().to_lowercase())
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    let report = parse_file(&cli.input, &options)
        .with_context(|| format!("analyzing {}", cli.input))?;
    println!("{}", report.summary);
    Ok(())
}
