//! File discovery and "most recent file" selection.

use chrono::NaiveDate;
use globset::{Glob, GlobMatcher};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// How `latest` orders candidate files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatestBy {
    /// Filesystem modification time.
    ModifiedTime,
    /// First `YYYY-MM-DD` found in the file name. Files without one are ignored.
    #[default]
    FilenameDate,
}

/// Compile a file-name glob such as `TOP MONDE*.csv`.
pub fn matcher(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(Glob::new(pattern)?.compile_matcher())
}

/// Regular files directly inside `dir` whose name matches `pattern`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn list_matching(dir: &Path, pattern: &GlobMatcher) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if file_name(&path).is_some_and(|name| pattern.is_match(name)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Pick the most recent file. Ties are broken by the lexicographically greatest file name.
pub fn latest(files: &[PathBuf], by: LatestBy) -> Option<PathBuf> {
    match by {
        LatestBy::FilenameDate => files
            .iter()
            .filter_map(|p| {
                let name = file_name(p)?;
                Some(((date_in_name(name)?, name.to_string()), p))
            })
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, p)| p.clone()),
        LatestBy::ModifiedTime => files
            .iter()
            .filter_map(|p| {
                let modified = fs::metadata(p).and_then(|m| m.modified()).ok()?;
                Some(((modified, file_name(p)?.to_string()), p))
            })
            .max_by(|a, b| cmp_modified(&a.0, &b.0))
            .map(|(_, p)| p.clone()),
    }
}

fn cmp_modified(a: &(SystemTime, String), b: &(SystemTime, String)) -> std::cmp::Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

/// First `YYYY-MM-DD` date embedded in a file name.
pub fn date_in_name(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    (0..=bytes.len() - 10).find_map(|start| {
        let candidate = name.get(start..start + 10)?;
        if !candidate.as_bytes()[0].is_ascii_digit() {
            return None;
        }
        NaiveDate::parse_from_str(candidate, "%Y-%m-%d").ok()
    })
}

pub fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
