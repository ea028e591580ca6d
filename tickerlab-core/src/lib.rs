//! TickerLab Core: snapshot enrichment, tiered ticker lists, archival, monthly history.
//!
//! Stages run in one direction:
//! - `enrich`: raw screener export -> enriched table with derived scores
//! - `export`/`ranking`: latest enriched table -> dated text lists
//! - `archive`: move consumed files to their next directory role
//! - `data`: monthly history retrieval and trailing-return leaders

pub mod archive;
pub mod config;
pub mod data;
pub mod domain;
pub mod enrich;
pub mod export;
pub mod files;
pub mod ranking;
pub mod schema;

pub use archive::{archive, move_all_matching, ArchiveError, MoveReport};
pub use config::{ConfigError, PipelineConfig};
pub use domain::RankedInstrument;
pub use enrich::{enrich, enrich_directory, EnrichError, EnrichReport};
pub use export::{generate_lists, ListError, ListReport};
pub use files::LatestBy;
pub use ranking::{build_lists, ListSet};
