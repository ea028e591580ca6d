//! Ticker list rendering and the list-generation stage.
//!
//! Text lists are plain UTF-8, one `EXCHANGE:SYMBOL` per line, with optional
//! `// <label>` section headers. File names embed the generation date.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{info, info_span, warn};

use crate::config::PipelineConfig;
use crate::domain::RankedInstrument;
use crate::files::{self, LatestBy};
use crate::ranking::{self, ListSet};
use crate::schema::{EnrichedSchema, EXCHANGE, MARKET_CAP, SCORE, SCORE_2, SYMBOL};

pub const TOP_BIG_LABEL: &str = "Top 30 Big";
pub const TOP_GLOBAL_LABEL: &str = "Top 50 Global";

/// One ticker per line.
pub fn render_tickers(rows: &[RankedInstrument]) -> String {
    let mut out = String::with_capacity(rows.len() * 16);
    for row in rows {
        out.push_str(&row.ticker());
        out.push('\n');
    }
    out
}

/// Labelled sections, each introduced by a `// <label>` comment line.
pub fn render_sections(sections: &[(&str, &[RankedInstrument])]) -> String {
    let mut out = String::new();
    for (label, rows) in sections {
        out.push_str(&format!("// {label}\n"));
        out.push_str(&render_tickers(rows));
    }
    out
}

/// Paths written by one list-generation run.
#[derive(Debug, Clone)]
pub struct ListReport {
    pub source: PathBuf,
    pub unified: PathBuf,
    pub threshold: PathBuf,
    pub worst: PathBuf,
    pub lists: ListSet,
}

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("no enriched file matching '{pattern}' in {dir}")]
    NoEnrichedFile { dir: PathBuf, pattern: String },

    #[error("invalid file pattern: {0}")]
    Pattern(String),

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("{path} is missing columns: {columns:?}")]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Rank the most recent enriched table and write the three dated lists.
pub fn generate_lists(config: &PipelineConfig, today: NaiveDate) -> Result<ListReport, ListError> {
    let dirs = &config.directories;
    let pattern = config.files.enriched_pattern();
    let matcher = files::matcher(&pattern).map_err(|e| ListError::Pattern(e.to_string()))?;

    let candidates = files::list_matching(&dirs.enriched, &matcher).map_err(|e| ListError::Read {
        path: dirs.enriched.clone(),
        message: e.to_string(),
    })?;
    let source = files::latest(&candidates, LatestBy::FilenameDate).ok_or_else(|| {
        ListError::NoEnrichedFile {
            dir: dirs.enriched.clone(),
            pattern: pattern.clone(),
        }
    })?;

    let _span = info_span!("lists", file = %source.display()).entered();
    info!(candidates = candidates.len(), "using most recent enriched file");

    let rows = load_ranked(&source)?;
    let lists = ranking::build_lists(&rows, &config.ranking);

    for skip in lists.skipped() {
        info!(ticker = %skip.ticker, score = skip.score, "skipped duplicate while filling tier B");
    }

    let date = today.format("%Y-%m-%d");
    let prefix = &config.files.list_prefix;
    let unified = dirs.lists.join(format!("{prefix}_{date}.txt"));
    let threshold = dirs.lists.join(format!("{prefix}_2_7_{date}.txt"));
    let worst = dirs.lists.join(format!("{prefix}_worst_{date}.txt"));

    fs::create_dir_all(&dirs.lists).map_err(|e| ListError::Write {
        path: dirs.lists.clone(),
        message: e.to_string(),
    })?;
    write_text(&unified, &lists.unified)?;
    write_text(&threshold, &lists.threshold)?;
    write_text(&worst, &lists.worst)?;

    let selection = &lists.selection;
    info!(
        tier_a = selection.tiers.tier_a.len(),
        tier_b = selection.tiers.tier_b.len(),
        skipped = lists.skipped().len(),
        top_big = selection.top_big.len(),
        top_global = selection.top_global.len(),
        threshold = selection.threshold.len(),
        worst = selection.worst.len(),
        "ticker lists written"
    );
    for (label, rows) in [
        (TOP_BIG_LABEL, &selection.top_big),
        (TOP_GLOBAL_LABEL, &selection.top_global),
    ] {
        let head: Vec<String> = rows.iter().take(5).map(|r| r.ticker()).collect();
        info!(section = label, head = ?head, "section leaders");
    }

    Ok(ListReport {
        source,
        unified,
        threshold,
        worst,
        lists,
    })
}

/// Load the ranking projection of an enriched CSV, preserving file order.
pub fn load_ranked(path: &Path) -> Result<Vec<RankedInstrument>, ListError> {
    let read_err = |e: PolarsError| ListError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    // all text; ranked_rows casts the numeric columns
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(read_err)?;

    let missing = EnrichedSchema::missing(&df);
    if !missing.is_empty() {
        return Err(ListError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    ranked_rows(&df).map_err(read_err)
}

/// Extract ranking rows from an enriched frame. Rows without a symbol are dropped.
pub fn ranked_rows(df: &DataFrame) -> PolarsResult<Vec<RankedInstrument>> {
    let df = df
        .clone()
        .lazy()
        .select([
            col(SYMBOL).cast(DataType::String),
            col(EXCHANGE).cast(DataType::String),
            col(MARKET_CAP).cast(DataType::Float64),
            col(SCORE).cast(DataType::Float64),
            col(SCORE_2).cast(DataType::Float64),
        ])
        .collect()?;

    let symbols = df.column(SYMBOL)?.as_materialized_series().str()?;
    let exchanges = df.column(EXCHANGE)?.as_materialized_series().str()?;
    let caps = df.column(MARKET_CAP)?.f64()?;
    let scores = df.column(SCORE)?.f64()?;
    let scores_2 = df.column(SCORE_2)?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(symbol) = symbols.get(i).filter(|s| !s.is_empty()) else {
            warn!(row = i, "enriched row has no symbol, dropping");
            continue;
        };
        rows.push(RankedInstrument {
            symbol: symbol.to_string(),
            exchange: exchanges.get(i).unwrap_or_default().to_string(),
            market_cap: caps.get(i),
            score: scores.get(i).unwrap_or(0.0),
            score_2: scores_2.get(i).unwrap_or(0.0),
        });
    }
    Ok(rows)
}

fn write_text(path: &Path, content: &str) -> Result<(), ListError> {
    fs::write(path, content).map_err(|e| ListError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!(path = %path.display(), "wrote ticker list");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(exchange: &str, symbol: &str) -> RankedInstrument {
        RankedInstrument {
            symbol: symbol.into(),
            exchange: exchange.into(),
            market_cap: None,
            score: 1.0,
            score_2: 1.0,
        }
    }

    #[test]
    fn renders_exchange_symbol_lines() {
        let rows = vec![instrument("NASDAQ", "AAPL"), instrument("NYSE", "JPM")];
        assert_eq!(render_tickers(&rows), "NASDAQ:AAPL\nNYSE:JPM\n");
    }

    #[test]
    fn sections_start_with_comment_headers() {
        let big = vec![instrument("NASDAQ", "AAPL")];
        let global: Vec<RankedInstrument> = Vec::new();
        let out = render_sections(&[
            ("Top 30 Big", big.as_slice()),
            ("Top 50 Global", global.as_slice()),
        ]);
        assert_eq!(out, "// Top 30 Big\nNASDAQ:AAPL\n// Top 50 Global\n");
    }

    #[test]
    fn ranked_rows_keep_file_order_and_nullable_caps() {
        let df = DataFrame::new(vec![
            Column::new(SYMBOL.into(), &[Some("AAPL"), None, Some("7203")]),
            Column::new(EXCHANGE.into(), &["NASDAQ", "NYSE", "TSE"]),
            Column::new(MARKET_CAP.into(), &[Some(2.5e12), Some(1e9), None]),
            Column::new(SCORE.into(), &[2.1, 1.0, 3.3]),
            Column::new(SCORE_2.into(), &[1.2, 1.0, 0.9]),
        ])
        .unwrap();

        let rows = ranked_rows(&df).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker(), "NASDAQ:AAPL");
        assert_eq!(rows[0].market_cap, Some(2.5e12));
        assert_eq!(rows[1].ticker(), "TSE:7203");
        assert_eq!(rows[1].market_cap, None);
        assert_eq!(rows[1].score, 3.3);
    }
}
