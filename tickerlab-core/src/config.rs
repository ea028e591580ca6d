//! Pipeline configuration: directory topology, file naming, ranking limits, history settings.
//!
//! Every field has a default, so an empty or partial TOML file is valid and the
//! CLI runs without any configuration at all.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration passed to every stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub directories: DirectoryLayout,
    pub files: FileNaming,
    pub ranking: RankingConfig,
    pub history: HistoryConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Every directory rooted under `root` instead of the working directory.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            directories: DirectoryLayout::rooted_at(root),
            ..Self::default()
        }
    }
}

/// The directory roles files move through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectoryLayout {
    /// Raw snapshot exports waiting to be enriched.
    pub inbox: PathBuf,
    /// Enrichment output.
    pub enriched: PathBuf,
    /// Post-ranking holding area.
    pub ranked: PathBuf,
    /// Consumed raw snapshots.
    pub raw_archive: PathBuf,
    /// Historical aggregates and the snapshots they were seeded from.
    pub history: PathBuf,
    /// Where generated text lists are written.
    pub lists: PathBuf,
}

impl DirectoryLayout {
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            inbox: root.join("waiting_room"),
            enriched: root.join("ready_to_use"),
            ranked: root.join("ticker_room"),
            raw_archive: root.join("used_input_files"),
            history: root.join("history"),
            lists: root.to_path_buf(),
        }
    }
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        Self::rooted_at(Path::new("data"))
    }
}

/// File name conventions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileNaming {
    /// Glob matching raw snapshot exports.
    pub snapshot_pattern: String,
    /// Marker appended to the file stem of an enriched twin.
    pub enriched_suffix: String,
    /// Prefix of the generated text lists.
    pub list_prefix: String,
}

impl FileNaming {
    /// Name of the enriched twin of `raw_name` (`X.csv` -> `X_enhanced.csv`).
    pub fn enriched_name(&self, raw_name: &str) -> String {
        let stem = raw_name.strip_suffix(".csv").unwrap_or(raw_name);
        format!("{stem}{}.csv", self.enriched_suffix)
    }

    /// Glob matching enriched twins of snapshot exports.
    pub fn enriched_pattern(&self) -> String {
        let stem = self
            .snapshot_pattern
            .strip_suffix(".csv")
            .unwrap_or(&self.snapshot_pattern);
        format!("{stem}{}.csv", self.enriched_suffix)
    }

    pub fn is_enriched(&self, file_name: &str) -> bool {
        file_name.contains(&self.enriched_suffix)
    }
}

impl Default for FileNaming {
    fn default() -> Self {
        Self {
            snapshot_pattern: "TOP MONDE*.csv".into(),
            enriched_suffix: "_enhanced".into(),
            list_prefix: "top_monde".into(),
        }
    }
}

/// Limits of the ranking tiers and list filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Strict lower bound on market cap for the big-cap pool.
    pub big_cap_min: f64,
    pub tier_size: usize,
    pub global_size: usize,
    /// Inclusive lower bound on score for the threshold list.
    pub score_threshold: f64,
    pub worst_size: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            big_cap_min: 10_000_000_000.0,
            tier_size: 15,
            global_size: 50,
            score_threshold: 2.7,
            worst_size: 100,
        }
    }
}

/// Historical retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Lookback window in months.
    pub months: u32,
    /// Top performers kept per 12-month window.
    pub top_per_period: usize,
    pub max_retries: u32,
    pub cooldown_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            months: 13,
            top_per_period: 10,
            max_retries: 3,
            cooldown_secs: 30 * 60,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Parse(String),
}
