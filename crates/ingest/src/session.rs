//! Layout of the scan archive: `project/<session>/<subject>/<acquisition>/MR*`.
//!
//! Session directories are named by their start time, e.g.
//! `2024.06.27-09.19.11`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, NaiveDate, TimeZone};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ReaderError, Result};

/// Acquisition directories that never hold image DICOMs.
const SKIP_ACQ_DIRS: [&str; 2] = ["PhysioLog", "PhoenixZIPReport"];

/// `MR.*`, `*.dcm` or `*.IMA`, ignoring case.
pub fn is_dicom_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("mr.") || lower.ends_with(".dcm") || lower.ends_with(".ima")
}

/// 19 characters of digits, dots and dashes, starting with `2`.
pub fn is_session_dir_name(name: &str) -> bool {
    name.len() == 19
        && name.starts_with('2')
        && name.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}

/// A project directory holds at least one session directory.
pub fn is_project(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_str().is_some_and(is_session_dir_name))
}

/// Immediate subdirectories of `project_dir` modified on or after `since` (local midnight).
pub fn sessions_modified_since(project_dir: &Path, since: NaiveDate) -> Result<Vec<PathBuf>> {
    let cutoff: SystemTime = since
        .and_hms_opt(0, 0, 0)
        .and_then(|t| Local.from_local_datetime(&t).earliest())
        .map(SystemTime::from)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let entries = fs::read_dir(project_dir).map_err(|source| ReaderError::Io {
        path: project_dir.to_path_buf(),
        source,
    })?;

    let mut sessions: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .is_ok_and(|mtime| mtime >= cutoff)
        })
        .map(|e| e.path())
        .collect();
    sessions.sort();
    Ok(sessions)
}

/// One representative DICOM per acquisition directory of a session.
pub fn find_first_dicoms(session_root: &Path) -> Result<Vec<PathBuf>> {
    if !session_root.is_dir() {
        return Err(ReaderError::Io {
            path: session_root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut first = Vec::new();
    for entry in WalkDir::new(session_root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let acq_dir = entry.path();
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if SKIP_ACQ_DIRS.iter().any(|skip| name.contains(skip)) {
            debug!(dir = %acq_dir.display(), "skipping non-image acquisition");
            continue;
        }
        match first_dicom_in(acq_dir) {
            Some(dcm) => {
                debug!(dcm = %dcm.display(), "found first dicom");
                first.push(dcm);
            }
            None => warn!(dir = %acq_dir.display(), "no dicoms found"),
        }
    }
    Ok(first)
}

fn first_dicom_in(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_str().is_some_and(is_dicom_name))
        .map(|e| e.into_path())
}
