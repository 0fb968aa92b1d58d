use std::path::PathBuf;
use std::sync::Arc;

use crate::metrics::RelayMetrics;
use crate::perturb::SnapshotTransform;
use crate::snapshot::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub metrics: Arc<RelayMetrics>,
    /// Optional transform applied to each `/data` response.
    pub transform: Option<Arc<dyn SnapshotTransform>>,
    /// Viewer page on disk; `None` serves the built-in page.
    pub page_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(store: Arc<SnapshotStore>, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            store,
            metrics,
            transform: None,
            page_path: None,
        }
    }

    pub fn with_transform(mut self, transform: Arc<dyn SnapshotTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_page_path(mut self, path: PathBuf) -> Self {
        self.page_path = Some(path);
        self
    }
}
