//! Output emitters: delimited tables, Gephi graphs, word-cloud blobs.
//!
//! Column orders are a compatibility contract for downstream
//! spreadsheets and Gephi; they must not change between releases.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Ranked value tables are capped to keep spreadsheets workable.
pub const MAX_TABLE_ROWS: usize = 1000;
/// Word-cloud blobs carry at most this many words.
pub const MAX_WORDCLOUD_WORDS: usize = 120;

/// Output delimiter and quoting, applied to every delimited file.
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub delimiter: u8,
    pub quote_style: csv::QuoteStyle,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            delimiter: b',',
            quote_style: csv::QuoteStyle::Necessary,
        }
    }
}

/// Neutralize spreadsheet formula injection: cells starting with a
/// formula trigger get a leading apostrophe (unless already present).
pub fn csv_safe_cell(cell: String) -> String {
    if cell.starts_with(['=', '+', '-', '@']) {
        format!("'{cell}")
    } else {
        cell
    }
}

fn writer_for(path: &Path, cfg: OutputConfig) -> csv::Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new()
        .delimiter(cfg.delimiter)
        .quote_style(cfg.quote_style)
        .from_path(path)?)
}

/// Write an ordered list of rows under a header.
pub fn write_rows(
    path: &Path,
    header: &[&str],
    rows: &[Vec<String>],
    cfg: OutputConfig,
) -> csv::Result<()> {
    let mut wtr = writer_for(path, cfg)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Sort a key=>count map descending by count; ties break on the key so
/// output is stable across runs.
pub fn rank(map: &HashMap<String, i64>) -> Vec<(String, i64)> {
    let mut entries: Vec<(String, i64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

/// Same for unsigned counters.
pub fn rank_counts(map: &HashMap<String, u64>) -> Vec<(String, i64)> {
    let as_i64: HashMap<String, i64> = map.iter().map(|(k, v)| (k.clone(), *v as i64)).collect();
    rank(&as_i64)
}

/// Percentage with two decimals and a "%" suffix.
pub fn str_pct(value: f64) -> String {
    format!("{value:.2}%")
}

/// Write a ranked key=>count table, optionally with a percentage
/// column over the total.
pub fn write_ranked(
    path: &Path,
    header: &[&str],
    entries: &[(String, i64)],
    pct: bool,
    cfg: OutputConfig,
) -> csv::Result<()> {
    let total: i64 = entries.iter().map(|(_, v)| v).sum();
    let mut wtr = writer_for(path, cfg)?;
    wtr.write_record(header)?;
    for (key, value) in entries.iter().take(MAX_TABLE_ROWS) {
        let key = csv_safe_cell(key.clone());
        if pct {
            let share = if total > 0 {
                (*value as f64 * 100.0) / total as f64
            } else {
                0.0
            };
            wtr.write_record([key, value.to_string(), str_pct(share)])?;
        } else {
            wtr.write_record([key, value.to_string()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// UTF-16LE with BOM variant of [`write_ranked`], for tables carrying
/// emoji that older spreadsheet imports mangle as UTF-8.
pub fn write_ranked_utf16(
    path: &Path,
    header: &[&str],
    entries: &[(String, i64)],
    cfg: OutputConfig,
) -> csv::Result<()> {
    let mut buf = Vec::new();
    {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(cfg.delimiter)
            .quote_style(cfg.quote_style)
            .from_writer(&mut buf);
        wtr.write_record(header)?;
        for (key, value) in entries.iter().take(MAX_TABLE_ROWS) {
            wtr.write_record([csv_safe_cell(key.clone()), value.to_string()])?;
        }
        wtr.flush()?;
    }
    let text = String::from_utf8(buf).expect("csv output is utf8");
    let mut out = File::create(path)?;
    out.write_all(&[0xFF, 0xFE])?;
    for unit in text.encode_utf16() {
        out.write_all(&unit.to_le_bytes())?;
    }
    Ok(())
}

/// Export nodes and edges in the Gephi GDF format. Node and edge
/// attribute declarations follow the caller's column order; edges get a
/// trailing `directed` flag.
pub fn write_gdf(
    path: &Path,
    nodes: &[Vec<String>],
    node_attrs: &[&str],
    edges: &[Vec<String>],
    edge_attrs: &[&str],
    directed: bool,
) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let mut node_header = vec!["nodedef>name VARCHAR".to_string()];
    node_header.extend(node_attrs.iter().map(|s| s.to_string()));
    wtr.write_record(&node_header)?;
    for node in nodes {
        wtr.write_record(node)?;
    }

    let mut edge_header = vec![
        "edgedef>node1 VARCHAR".to_string(),
        "node2 VARCHAR".to_string(),
    ];
    edge_header.extend(edge_attrs.iter().map(|s| s.to_string()));
    edge_header.push("directed BOOLEAN".to_string());
    wtr.write_record(&edge_header)?;
    for edge in edges {
        let mut row = edge.clone();
        row.push(directed.to_string());
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a normalized word-frequency blob for word-cloud rendering:
/// the most frequent word maps to 100 repetitions, everything else
/// proportional with a floor of 1.
pub fn write_wordcloud(path: &Path, counts: &HashMap<String, u64>) -> std::io::Result<()> {
    if counts.is_empty() {
        return Ok(());
    }
    let max = counts.values().copied().max().unwrap_or(1).max(1);
    let mut entries = rank_counts(counts);
    entries.truncate(MAX_WORDCLOUD_WORDS);

    let mut out = File::create(path)?;
    for (word, count) in entries {
        let mut weight = (100 * count as u64) / max;
        if weight < 1 {
            weight = 1;
        }
        for _ in 0..weight {
            write!(out, "{word} ")?;
        }
    }
    Ok(())
}
