//! Column order of the header-dump tool's output.
//!
//! A tag list file has one `name<TAB>tag<TAB>desc` line per column. Lines
//! starting with `#` or `name` are comments/headers.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{ReaderError, Result};

/// Column order used when no tag list file is configured.
pub const DEFAULT_COLUMNS: [&str; 23] = [
    "Phase",
    "iPAT",
    "AcqTime",
    "AcqDate",
    "SeriesNumber",
    "SubID",
    "Comments",
    "Operator",
    "Project",
    "SequenceName",
    "SequenceType",
    "PED_major",
    "TR",
    "TE",
    "Matrix",
    "PixelResol",
    "BWP",
    "BWPPE",
    "FA",
    "TA",
    "FoV",
    "Shims",
    "Station",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagList {
    names: Vec<String>,
}

impl Default for TagList {
    fn default() -> Self {
        Self {
            names: DEFAULT_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TagList {
    pub fn parse(text: &str) -> Result<Self> {
        let mut names = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') || line.starts_with("name") {
                continue;
            }
            let name = line.split('\t').next().unwrap_or_default().trim();
            if name.is_empty() {
                return Err(ReaderError::TagList {
                    line: i + 1,
                    reason: "missing tag name".to_string(),
                });
            }
            if names.iter().any(|n| n == name) {
                return Err(ReaderError::TagList {
                    line: i + 1,
                    reason: format!("duplicate tag name '{name}'"),
                });
            }
            names.push(name.to_string());
        }
        if names.is_empty() {
            return Err(ReaderError::TagList {
                line: 0,
                reason: "no tags defined".to_string(),
            });
        }
        Ok(Self { names })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ReaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let list = Self::parse(&text)?;
        info!(path = %path.display(), columns = list.len(), "tag list loaded");
        Ok(list)
    }

    /// The configured file, or the default order.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
