//! Incremental batch update from the scan archive.
//!
//! Each project's newest stored acquisition day decides which session
//! directories are new. Sessions are copied to the archive after they are
//! acquired, so the mtime cutoff is the following midnight.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use mrqa_core::DCM_PATH;
use mrqa_ingest::{find_first_dicoms, is_project, sessions_modified_since, FieldReader};
use mrqa_store::{IngestOutcome, ParameterStore, ProtocolPattern};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub projects: usize,
    pub sessions: usize,
    pub files: usize,
    pub recorded: usize,
    pub new_param_sets: usize,
    pub duplicates: usize,
    /// Headers without identity or project.
    pub rejected: usize,
}

impl UpdateSummary {
    fn count(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Recorded { new_param_set, .. } => {
                self.recorded += 1;
                if new_param_set {
                    self.new_param_sets += 1;
                }
            }
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::MissingIdentity | IngestOutcome::MissingProject => self.rejected += 1,
        }
    }
}

/// Project directories directly under `scan_root`, sorted.
pub fn project_dirs(scan_root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let root = scan_root
        .to_str()
        .with_context(|| format!("scan root {} is not valid UTF-8", scan_root.display()))?;
    let pattern = format!("{}/*", glob::Pattern::escape(root));
    let mut dirs: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("bad scan root pattern {pattern}"))?
        .filter_map(|entry| entry.ok())
        .filter(|dir| is_project(dir))
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Midnight after the last stored day, or the epoch with no history.
fn session_cutoff(recent: Option<NaiveDate>) -> NaiveDate {
    recent
        .and_then(|day| day.checked_add_days(Days::new(1)))
        .unwrap_or_default()
}

/// Read the first DICOM of every new acquisition under `projects` and store it.
///
/// With `dry_run` the headers are logged and nothing is written.
pub async fn update_projects(
    store: &ParameterStore,
    reader: &dyn FieldReader,
    projects: &[PathBuf],
    dry_run: bool,
) -> anyhow::Result<UpdateSummary> {
    let mut summary = UpdateSummary::default();
    let latest_any = store.most_recent(&ProtocolPattern::any()?).await?;

    for dir in projects {
        if !is_project(dir) {
            warn!(dir = %dir.display(), "not a project directory, skipping");
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        summary.projects += 1;

        let recent = store
            .most_recent(&ProtocolPattern::new(&format!("*{name}"))?)
            .await?
            .or(latest_any);
        let cutoff = session_cutoff(recent);
        let sessions = sessions_modified_since(dir, cutoff)?;
        info!(
            project = name,
            recent = ?recent,
            %cutoff,
            sessions = sessions.len(),
            "scanning project for new sessions"
        );

        for session in sessions {
            let dicoms = match find_first_dicoms(&session) {
                Ok(d) => d,
                Err(e) => {
                    warn!(session = %session.display(), error = %e, "cannot list session");
                    continue;
                }
            };
            summary.sessions += 1;
            info!(session = %session.display(), dicoms = dicoms.len(), "session");

            for dcm in dicoms {
                debug!(path = %dcm.display(), "processing first dicom of acquisition");
                let fields = reader.read(&dcm).await;
                summary.files += 1;
                if dry_run {
                    let path = fields.get(DCM_PATH).map(String::as_str).unwrap_or("?");
                    info!(path, ?fields, "dry run");
                    continue;
                }
                summary.count(store.ingest(&fields).await?);
            }
        }
    }

    info!(?summary, dry_run, "update finished");
    Ok(summary)
}
