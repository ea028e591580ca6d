//! Tiered selection over an enriched table.
//!
//! Selection is deterministic and order-sensitive:
//! - Tier A: the `tier_size` big caps with the highest `score_2`
//! - Tier B: the next big caps by `score`, skipping symbols already selected,
//!   until `tier_size` rows are collected or the pool runs dry
//! - Top Global: the `global_size` highest `score` rows of the whole table
//! - Threshold: every row with `score >= score_threshold`
//! - Worst: the `worst_size` lowest strictly positive scores
//!
//! All sorts are stable, so ties keep table order.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::config::RankingConfig;
use crate::domain::RankedInstrument;
use crate::export;

/// A Tier B candidate passed over because its symbol was already selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateSkip {
    pub symbol: String,
    pub ticker: String,
    pub score: f64,
}

/// The two big-cap tiers and the duplicates skipped while filling Tier B.
#[derive(Debug, Clone, Default)]
pub struct TierSelection {
    pub tier_a: Vec<RankedInstrument>,
    pub tier_b: Vec<RankedInstrument>,
    pub skipped: Vec<DuplicateSkip>,
}

impl TierSelection {
    /// Top 30 Big: Tier A followed by Tier B.
    pub fn top_big(&self) -> impl Iterator<Item = &RankedInstrument> {
        self.tier_a.iter().chain(self.tier_b.iter())
    }
}

/// Every list the builder produces, before rendering.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub tiers: TierSelection,
    /// Top 30 Big with repeated symbols removed.
    pub top_big: Vec<RankedInstrument>,
    /// Top 50 Global minus symbols already in `top_big`.
    pub top_global: Vec<RankedInstrument>,
    pub threshold: Vec<RankedInstrument>,
    pub worst: Vec<RankedInstrument>,
}

/// Rendered ticker lists plus the Tier B skip report.
#[derive(Debug, Clone, Default)]
pub struct ListSet {
    pub unified: String,
    pub threshold: String,
    pub worst: String,
    pub selection: Selection,
}

impl ListSet {
    pub fn skipped(&self) -> &[DuplicateSkip] {
        &self.selection.tiers.skipped
    }
}

/// Rank `rows` (in enriched-table order) and render the three ticker lists.
pub fn build_lists(rows: &[RankedInstrument], config: &RankingConfig) -> ListSet {
    let selection = select(rows, config);
    ListSet {
        unified: export::render_sections(&[
            (export::TOP_BIG_LABEL, selection.top_big.as_slice()),
            (export::TOP_GLOBAL_LABEL, selection.top_global.as_slice()),
        ]),
        threshold: export::render_tickers(&selection.threshold),
        worst: export::render_tickers(&selection.worst),
        selection,
    }
}

pub fn select(rows: &[RankedInstrument], config: &RankingConfig) -> Selection {
    let tiers = select_tiers(rows, config);

    let mut seen: HashSet<&str> = HashSet::new();
    let top_big: Vec<RankedInstrument> = tiers
        .top_big()
        .filter(|r| seen.insert(r.symbol.as_str()))
        .cloned()
        .collect();

    let all: Vec<&RankedInstrument> = rows.iter().collect();
    let top_global: Vec<RankedInstrument> = top_n(&all, config.global_size, |r| r.score)
        .into_iter()
        .filter(|r| seen.insert(r.symbol.as_str()))
        .cloned()
        .collect();

    let mut threshold: Vec<&RankedInstrument> = rows
        .iter()
        .filter(|r| r.score >= config.score_threshold)
        .collect();
    threshold.sort_by(|a, b| descending(a.score, b.score));

    let mut worst: Vec<&RankedInstrument> = rows.iter().filter(|r| r.score > 0.0).collect();
    worst.sort_by(|a, b| descending(b.score, a.score));
    worst.truncate(config.worst_size);

    Selection {
        top_big,
        top_global,
        threshold: threshold.into_iter().cloned().collect(),
        worst: worst.into_iter().cloned().collect(),
        tiers,
    }
}

/// Build Tier A and Tier B from the big-cap pool.
pub fn select_tiers(rows: &[RankedInstrument], config: &RankingConfig) -> TierSelection {
    let big: Vec<&RankedInstrument> = rows
        .iter()
        .filter(|r| r.is_big_cap(config.big_cap_min))
        .collect();

    let tier_a: Vec<RankedInstrument> = top_n(&big, config.tier_size, |r| r.score_2)
        .into_iter()
        .cloned()
        .collect();

    let mut taken: HashSet<&str> = tier_a.iter().map(|r| r.symbol.as_str()).collect();
    let mut tier_b = Vec::with_capacity(config.tier_size);
    let mut skipped = Vec::new();

    for candidate in top_n(&big, big.len(), |r| r.score) {
        if tier_b.len() >= config.tier_size {
            break;
        }
        if !taken.insert(candidate.symbol.as_str()) {
            tracing::debug!(
                ticker = %candidate.ticker(),
                score = candidate.score,
                "tier B candidate already selected, skipping"
            );
            skipped.push(DuplicateSkip {
                symbol: candidate.symbol.clone(),
                ticker: candidate.ticker(),
                score: candidate.score,
            });
            continue;
        }
        tier_b.push(candidate.clone());
    }

    TierSelection {
        tier_a,
        tier_b,
        skipped,
    }
}

/// The `n` rows with the highest `key`, ties in input order.
fn top_n<'a, F>(rows: &[&'a RankedInstrument], n: usize, key: F) -> Vec<&'a RankedInstrument>
where
    F: Fn(&RankedInstrument) -> f64,
{
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| descending(key(a), key(b)));
    sorted.truncate(n);
    sorted
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
