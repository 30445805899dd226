//! Recursive directory watch yielding finished DICOM files.

use std::path::PathBuf;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use mrqa_ingest::is_dicom_name;

use crate::error::{LiveError, Result};

/// Owns the OS watcher; events stop when this is dropped.
pub struct DicomWatcher {
    _watcher: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

/// A file is ready once its writer closed it, or once it was renamed into place.
/// Plain creation fires before the contents are written.
fn is_finished_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

fn dicom_paths(event: Event) -> impl Iterator<Item = PathBuf> {
    let ready = is_finished_write(&event.kind);
    event.paths.into_iter().filter(move |p| {
        ready
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_dicom_name)
    })
}

impl DicomWatcher {
    /// Watch every directory in `dirs` recursively, forwarding finished DICOM
    /// paths to `tx`.
    pub fn start(dirs: &[PathBuf], tx: mpsc::Sender<PathBuf>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in dicom_paths(event) {
                    debug!(path = %path.display(), "dicom written");
                    // The callback runs on the watcher's own thread.
                    if tx.blocking_send(path).is_err() {
                        debug!("monitor gone, dropping file event");
                    }
                }
            }
            Err(e) => error!("file watcher error: {e}"),
        })?;

        for dir in dirs {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(|source| LiveError::Watch {
                    path: dir.clone(),
                    source,
                })?;
            info!(dir = %dir.display(), "watching for new dicoms");
        }

        Ok(Self {
            _watcher: watcher,
            dirs: dirs.to_vec(),
        })
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}
