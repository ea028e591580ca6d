//! Enrichment engine: derived performance and moving-average columns for snapshot tables.
//!
//! Processing order is fixed and part of the output contract:
//! perf columns -> technical indicators -> scores -> null-fill -> round -> sort.
//! Nulls propagate through every formula and are only zeroed at the end, so a
//! missing input and a genuine zero are indistinguishable in the output.

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::files;
use crate::schema::{
    EnrichedSchema, SnapshotSchema, DIFF, EXCHANGE, MA200, MA21, MRAT, PERF_1M, PERF_1Y,
    PERF_3M, PERF_6M, PERF_NORM, PERF_NORM_2, PERF_SUM, PERF_SUM_2, PRICE, SCORE, SCORE_2,
    SYMBOL,
};

/// Decimal places kept for every float column.
pub const DECIMALS: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("no snapshot files matching '{pattern}' in {dir}")]
    NoInput { dir: PathBuf, pattern: String },

    #[error("invalid file pattern: {0}")]
    Pattern(String),

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("missing columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}

/// Numeric cells that could not be parsed and were read as null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercedCells {
    pub column: String,
    pub count: usize,
}

/// Column means of one enriched table, for the run log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    pub perf_sum_mean: f64,
    pub mrat_mean: f64,
    pub diff_mean: f64,
    pub score_mean: f64,
}

/// Outcome of one enrichment run over the inbox.
#[derive(Debug, Default)]
pub struct EnrichReport {
    pub written: Vec<PathBuf>,
    /// Inputs whose enriched twin already existed.
    pub already_enriched: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl EnrichReport {
    pub fn processed(&self) -> usize {
        self.written.len() + self.already_enriched.len()
    }
}

/// Compute every derived column, zero nulls, round and sort by `score` descending.
///
/// Input numeric columns are coerced to floats first; unparseable cells become
/// null and are reported with a warning.
pub fn enrich(df: DataFrame) -> Result<DataFrame, EnrichError> {
    let missing = SnapshotSchema::missing(&df);
    if !missing.is_empty() {
        return Err(EnrichError::MissingColumns(missing));
    }

    let mut df = df;
    for coerced in coerce_numeric(&mut df)? {
        warn!(
            column = %coerced.column,
            cells = coerced.count,
            "unparseable numeric cells treated as null"
        );
    }

    let derived = df
        .lazy()
        .with_columns([(col(PERF_1Y) + col(PERF_6M) + col(PERF_3M)).alias(PERF_SUM)])
        .with_columns([
            (lit(1.0) + col(PERF_SUM) / lit(1000.0)).alias(PERF_NORM),
            (col(PERF_1M) + col(PERF_3M) + col(PERF_6M)).alias(PERF_SUM_2),
        ])
        .with_columns([(lit(1.0) + col(PERF_SUM_2) / lit(1000.0)).alias(PERF_NORM_2)])
        .with_columns([
            ratio_to_ma200(MA21).alias(MRAT),
            ratio_to_ma200(PRICE).alias(DIFF),
        ])
        .with_columns([
            (col(PERF_NORM) + col(MRAT)).alias(SCORE),
            (col(PERF_NORM_2) + col(MRAT)).alias(SCORE_2),
        ])
        .with_columns(EnrichedSchema::DERIVED.map(|name| col(name).fill_null(lit(0.0))))
        .collect()?;

    let rounding: Vec<Expr> = derived
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_float())
        .map(|c| col(c.name().clone()).round(DECIMALS))
        .collect();

    let enriched = derived
        .lazy()
        .with_columns(rounding)
        .sort(
            [SCORE],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;

    Ok(enriched)
}

/// `numerator / ma200`, null when the 200-day average is zero or missing.
fn ratio_to_ma200(numerator: &str) -> Expr {
    when(col(MA200).neq(lit(0.0)))
        .then(col(numerator) / col(MA200))
        .otherwise(lit(NULL))
}

/// Cast numeric inputs to Float64 and identifiers to String, in place.
pub fn coerce_numeric(df: &mut DataFrame) -> PolarsResult<Vec<CoercedCells>> {
    for name in [SYMBOL, EXCHANGE] {
        let cast = df.column(name)?.cast(&DataType::String)?;
        df.with_column(cast)?;
    }

    let mut coerced = Vec::new();
    for name in SnapshotSchema::NUMERIC_INPUTS {
        let column = df.column(name)?;
        let before = column.null_count();
        let cast = column.cast(&DataType::Float64)?;
        let after = cast.null_count();
        if after > before {
            coerced.push(CoercedCells {
                column: name.to_string(),
                count: after - before,
            });
        }
        df.with_column(cast)?;
    }
    Ok(coerced)
}

pub fn summarize(df: &DataFrame) -> PolarsResult<TableSummary> {
    let mean = |name: &str| -> PolarsResult<f64> {
        Ok(df
            .column(name)?
            .as_materialized_series()
            .mean()
            .unwrap_or(0.0))
    };
    Ok(TableSummary {
        rows: df.height(),
        perf_sum_mean: mean(PERF_SUM)?,
        mrat_mean: mean(MRAT)?,
        diff_mean: mean(DIFF)?,
        score_mean: mean(SCORE)?,
    })
}

/// Read a snapshot with every column as text.
///
/// Nothing is inferred, so numeric-looking symbols keep their leading zeros and
/// a malformed number anywhere in the file reaches [`coerce_numeric`] as a cell.
pub fn read_snapshot(path: &Path) -> Result<DataFrame, EnrichError> {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| EnrichError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Write `df` as CSV. Written to a `.tmp` sibling and renamed into place.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<(), EnrichError> {
    let write_err = |e: String| EnrichError::Write {
        path: path.to_path_buf(),
        message: e,
    };
    let tmp_path = path.with_extension("csv.tmp");

    let mut file = fs::File::create(&tmp_path).map_err(|e| write_err(e.to_string()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| write_err(e.to_string()))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        write_err(format!("atomic rename failed: {e}"))
    })
}

/// Read, enrich and write one snapshot file.
pub fn enrich_file(input: &Path, output: &Path) -> Result<TableSummary, EnrichError> {
    let raw = read_snapshot(input)?;
    info!(rows = raw.height(), columns = raw.width(), "snapshot loaded");

    let mut enriched = enrich(raw)?;
    write_table(&mut enriched, output)?;
    Ok(summarize(&enriched)?)
}

/// Enrich every snapshot in the inbox into the enriched directory.
///
/// Files whose enriched twin already exists are left alone. A file that fails
/// is logged and recorded; the rest of the batch still runs. Finding no
/// snapshot at all is an error.
pub fn enrich_directory(config: &PipelineConfig) -> Result<EnrichReport, EnrichError> {
    let dirs = &config.directories;
    let naming = &config.files;
    let pattern = files::matcher(&naming.snapshot_pattern)
        .map_err(|e| EnrichError::Pattern(e.to_string()))?;

    let inputs: Vec<PathBuf> = files::list_matching(&dirs.inbox, &pattern)
        .map_err(|e| EnrichError::Read {
            path: dirs.inbox.clone(),
            message: e.to_string(),
        })?
        .into_iter()
        .filter(|p| files::file_name(p).is_some_and(|n| !naming.is_enriched(n)))
        .collect();

    if inputs.is_empty() {
        return Err(EnrichError::NoInput {
            dir: dirs.inbox.clone(),
            pattern: naming.snapshot_pattern.clone(),
        });
    }

    fs::create_dir_all(&dirs.enriched).map_err(|e| EnrichError::Write {
        path: dirs.enriched.clone(),
        message: e.to_string(),
    })?;
    info!(count = inputs.len(), dir = %dirs.inbox.display(), "snapshot files found");

    let mut report = EnrichReport::default();
    for input in inputs {
        let name = files::file_name(&input).unwrap_or_default().to_string();
        let _span = info_span!("enrich", file = %name).entered();
        let output = dirs.enriched.join(naming.enriched_name(&name));

        if output.exists() {
            info!(output = %output.display(), "already enriched, nothing to do");
            report.already_enriched.push(input);
            continue;
        }

        match enrich_file(&input, &output) {
            Ok(summary) => {
                info!(
                    output = %output.display(),
                    rows = summary.rows,
                    perf_sum_mean = summary.perf_sum_mean,
                    mrat_mean = summary.mrat_mean,
                    diff_mean = summary.diff_mean,
                    score_mean = summary.score_mean,
                    "snapshot enriched"
                );
                report.written.push(output);
            }
            Err(e) => {
                error!(error = %e, "failed to enrich snapshot, skipping file");
                report.failed.push((input, e.to_string()));
            }
        }
    }

    info!(
        processed = report.processed(),
        failed = report.failed.len(),
        "enrichment finished"
    );
    Ok(report)
}
