//! Request-scoped scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use reelsmith_models::ProjectId;

use crate::error::MediaResult;

/// Scratch directory owned by a single composition request.
///
/// Each request gets a fresh, uniquely named directory, so concurrent
/// requests never share intermediate files.
#[derive(Debug)]
pub struct RequestWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl RequestWorkspace {
    /// Create a workspace under `root` named `reelsmith-<project>-XXXXXX`.
    pub async fn create(root: &Path, project: &ProjectId) -> MediaResult<Self> {
        tokio::fs::create_dir_all(root).await?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("reelsmith-{}-", project.sanitized()))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created request workspace");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an intermediate file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the workspace. Failures are logged, never returned.
    pub fn cleanup(mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "Removed request workspace"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    "Failed to remove request workspace: {}", e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workspaces_are_isolated() {
        let root = TempDir::new().unwrap();
        let project = ProjectId::new("demo/project");

        let a = RequestWorkspace::create(root.path(), &project).await.unwrap();
        let b = RequestWorkspace::create(root.path(), &project).await.unwrap();

        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("reelsmith-demo_project-"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_files() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), &ProjectId::new("p"))
            .await
            .unwrap();
        let file = ws.file("captions.srt");
        tokio::fs::write(&file, b"1").await.unwrap();
        let path = ws.path().to_path_buf();

        ws.cleanup();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_of_vanished_dir_does_not_panic() {
        let root = TempDir::new().unwrap();
        let ws = RequestWorkspace::create(root.path(), &ProjectId::new("p"))
            .await
            .unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        ws.cleanup();
    }
}
