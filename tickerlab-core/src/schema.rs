//! Column schema of TOP MONDE snapshot exports and their enriched twins.
//!
//! Header names are matched verbatim; the screener export is the source of truth.

use polars::prelude::*;

pub const SYMBOL: &str = "Symbol";
pub const EXCHANGE: &str = "Exchange";
pub const PRICE: &str = "Price";
pub const MARKET_CAP: &str = "Market capitalization";
pub const PERF_1Y: &str = "Performance % 1 year";
pub const PERF_6M: &str = "Performance % 6 months";
pub const PERF_3M: &str = "Performance % 3 months";
pub const PERF_1M: &str = "Performance % 1 month";
pub const MA21: &str = "Simple Moving Average (21) 1 day";
pub const MA200: &str = "Simple Moving Average (200) 1 day";

pub const PERF_SUM: &str = "perf_sum";
pub const PERF_NORM: &str = "perf_norm";
pub const PERF_SUM_2: &str = "perfsum_2";
pub const PERF_NORM_2: &str = "perf_norm_2";
pub const MRAT: &str = "mrat";
pub const DIFF: &str = "diff";
pub const SCORE: &str = "score";
pub const SCORE_2: &str = "score_2";

/// Schema of a raw snapshot file.
pub struct SnapshotSchema;

impl SnapshotSchema {
    /// Numeric inputs of the enrichment formulas.
    pub const NUMERIC_INPUTS: [&'static str; 8] = [
        MARKET_CAP, PERF_1Y, PERF_6M, PERF_3M, PERF_1M, MA21, MA200, PRICE,
    ];

    /// Every column a raw snapshot must carry.
    pub fn required() -> Vec<&'static str> {
        let mut cols = vec![SYMBOL, EXCHANGE];
        cols.extend_from_slice(&Self::NUMERIC_INPUTS);
        cols
    }

    /// Required columns absent from `df`, in schema order. Empty means valid.
    pub fn missing(df: &DataFrame) -> Vec<String> {
        missing_from(df, &Self::required())
    }
}

/// Schema of an enriched file as consumed by the list builder.
pub struct EnrichedSchema;

impl EnrichedSchema {
    /// Derived columns in the order they are appended.
    pub const DERIVED: [&'static str; 8] = [
        PERF_SUM,
        PERF_NORM,
        PERF_SUM_2,
        PERF_NORM_2,
        MRAT,
        DIFF,
        SCORE,
        SCORE_2,
    ];

    pub fn required() -> Vec<&'static str> {
        vec![SYMBOL, EXCHANGE, MARKET_CAP, SCORE, SCORE_2]
    }

    pub fn missing(df: &DataFrame) -> Vec<String> {
        missing_from(df, &Self::required())
    }
}

fn missing_from(df: &DataFrame, required: &[&str]) -> Vec<String> {
    let schema = df.schema();
    required
        .iter()
        .filter(|name| !schema.contains(name))
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        let mut columns = vec![
            Column::new(SYMBOL.into(), &["AAPL"]),
            Column::new(EXCHANGE.into(), &["NASDAQ"]),
        ];
        for name in SnapshotSchema::NUMERIC_INPUTS {
            columns.push(Column::new(name.into(), &[1.0]));
        }
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn complete_snapshot_has_no_missing_columns() {
        assert!(SnapshotSchema::missing(&raw_frame()).is_empty());
    }

    #[test]
    fn reports_missing_columns_in_schema_order() {
        let df = DataFrame::new(vec![
            Column::new(SYMBOL.into(), &["AAPL"]),
            Column::new(PRICE.into(), &[150.0]),
        ])
        .unwrap();

        let missing = SnapshotSchema::missing(&df);
        assert_eq!(missing[0], EXCHANGE);
        assert!(missing.contains(&MA200.to_string()));
        assert!(!missing.contains(&PRICE.to_string()));
    }

    #[test]
    fn raw_snapshot_is_not_an_enriched_table() {
        let missing = EnrichedSchema::missing(&raw_frame());
        assert_eq!(missing, vec![SCORE.to_string(), SCORE_2.to_string()]);
    }
}
