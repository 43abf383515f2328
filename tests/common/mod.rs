use snakelsp::progress::{ProgressSink, WorkDone};
use snakelsp::workspace::settings::ClientSettings;
use snakelsp::workspace::Workspace;
use std::sync::Arc;
use tempfile::TempDir;
use tower_lsp::lsp_types::{Url, WorkDoneProgress};

/// Progress sink for tests: emissions go nowhere.
pub struct NoopSink;

#[tower_lsp::async_trait]
impl ProgressSink for NoopSink {
    async fn create_token(&self, _token: String) {}
    async fn notify(&self, _token: String, _value: WorkDoneProgress) {}
}

pub struct TestWorkspace {
    pub workspace: Arc<Workspace>,
    pub root: TempDir,
}

impl TestWorkspace {
    pub fn url_for(&self, relative: &str) -> Url {
        Url::from_file_path(self.root.path().join(relative)).unwrap()
    }
}

/// Writes the given files under a fresh workspace root and runs the full
/// initialize pipeline: walk, parse, imports, symbols, link.
pub async fn setup_workspace(files: &[(&str, &str)]) -> TestWorkspace {
    let root = TempDir::new().unwrap();
    for (relative, content) in files {
        let path = root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    let workspace = Arc::new(Workspace::new().unwrap());
    workspace.set_settings(ClientSettings::new(None, root.path().to_path_buf()));

    let progress = WorkDone::new(Arc::new(NoopSink));
    let walked = workspace.walk_project(root.path(), None);
    workspace.bulk_parse(&walked, &progress).await;
    workspace.bulk_parse_imports(&progress).await;
    workspace.bulk_parse_symbols(&progress).await;

    TestWorkspace { workspace, root }
}
