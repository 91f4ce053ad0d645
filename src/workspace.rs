//! Clones and removes a deployment's source tree under the configured mount root.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

pub struct Workspace {
    mount_root: PathBuf,
}

impl Workspace {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    pub fn clone_dir(&self, namespace: &str) -> PathBuf {
        self.mount_root.join(namespace)
    }

    /// Clones `git_url` at `branch` into `{mount_root}/{namespace}`, removing
    /// any existing directory first. Returns the clone path.
    #[tracing::instrument(skip(self, git_url), fields(namespace))]
    pub async fn prepare(&self, namespace: &str, git_url: &str, branch: &str) -> Result<PathBuf> {
        let path = self.clone_dir(namespace);
        self.remove(&path).await?;

        let output = Command::new("git")
            .arg("clone")
            .arg("-b")
            .arg(branch)
            .arg(git_url)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OrchestratorError::CloneFailed {
                message: format!("failed to spawn git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(namespace, stderr, "git clone failed");
            return Err(OrchestratorError::CloneFailed { message: stderr });
        }

        tracing::info!(namespace, path = %path.display(), "cloned repository");
        Ok(path)
    }

    /// Idempotent recursive delete; absence is not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::Io(e)),
        }
    }
}
