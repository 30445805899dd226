use std::path::PathBuf;

use mrqa_live::Broadcaster;
use mrqa_store::TemplateInferencer;

/// Shared by every HTTP handler.
pub struct AppState {
    pub inferencer: TemplateInferencer,
    pub broadcaster: Broadcaster,
    /// Directories under live watch; empty when only history is served.
    pub watch_dirs: Vec<PathBuf>,
}

impl AppState {
    pub fn new(inferencer: TemplateInferencer, broadcaster: Broadcaster) -> Self {
        Self {
            inferencer,
            broadcaster,
            watch_dirs: Vec::new(),
        }
    }

    pub fn with_watch_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.watch_dirs = dirs;
        self
    }
}
