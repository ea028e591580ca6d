//! Archival: move processed files between directory roles.
//!
//! Moves never overwrite. When the destination already holds a file with the
//! same name the source file stays where it is, a warning is logged and the
//! conflict is listed in the report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::files;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("failed to list {dir}: {source}")]
    List { dir: PathBuf, source: io::Error },

    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Result of one move-all operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveReport {
    pub moved: Vec<PathBuf>,
    /// Source files left in place because the destination name was taken.
    pub conflicts: Vec<PathBuf>,
}

impl MoveReport {
    fn absorb(&mut self, other: MoveReport) {
        self.moved.extend(other.moved);
        self.conflicts.extend(other.conflicts);
    }
}

/// Move every file in `from` matching `pattern` into `to`.
pub fn move_all_matching(pattern: &str, from: &Path, to: &Path) -> Result<MoveReport, ArchiveError> {
    move_where(pattern, from, to, |_| true)
}

/// Like [`move_all_matching`], restricted to names accepted by `keep`.
pub fn move_where<F>(pattern: &str, from: &Path, to: &Path, keep: F) -> Result<MoveReport, ArchiveError>
where
    F: Fn(&str) -> bool,
{
    let matcher = files::matcher(pattern).map_err(|e| ArchiveError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    let candidates = files::list_matching(from, &matcher).map_err(|source| ArchiveError::List {
        dir: from.to_path_buf(),
        source,
    })?;

    let mut report = MoveReport::default();
    for path in candidates {
        let Some(name) = files::file_name(&path) else {
            continue;
        };
        if !keep(name) {
            continue;
        }

        let dest = to.join(name);
        if dest.exists() {
            warn!(
                file = name,
                destination = %to.display(),
                "destination already has this file, leaving source in place"
            );
            report.conflicts.push(path);
            continue;
        }

        move_file(&path, &dest).map_err(|source| ArchiveError::Move {
            from: path.clone(),
            to: dest.clone(),
            source,
        })?;
        info!(file = name, destination = %to.display(), "moved");
        report.moved.push(dest);
    }
    Ok(report)
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    // rename fails across filesystems; fall back to copy + delete
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Run the three archival moves in order:
/// inbox -> raw archive, ranked -> enriched, non-enriched files in enriched -> raw archive.
pub fn archive(config: &PipelineConfig) -> Result<MoveReport, ArchiveError> {
    let dirs = &config.directories;
    let naming = &config.files;
    let mut report = MoveReport::default();

    report.absorb(move_all_matching("*.csv", &dirs.inbox, &dirs.raw_archive)?);
    report.absorb(move_all_matching("*.csv", &dirs.ranked, &dirs.enriched)?);
    report.absorb(move_where("*.csv", &dirs.enriched, &dirs.raw_archive, |name| {
        !naming.is_enriched(name)
    })?);

    info!(
        moved = report.moved.len(),
        conflicts = report.conflicts.len(),
        "archival finished"
    );
    Ok(report)
}
