//! Drives `docker compose` against the rewritten compose file for one deployment.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

pub struct ComposeRunner {
    clone_dir: PathBuf,
}

impl ComposeRunner {
    pub fn new(clone_dir: impl Into<PathBuf>) -> Self {
        Self {
            clone_dir: clone_dir.into(),
        }
    }

    /// `docker compose up -d --build`, run after the compose file has been
    /// rewritten so the inner nginx service is present.
    #[tracing::instrument(skip(self))]
    pub async fn up(&self) -> Result<()> {
        let output = self
            .compose(&["up", "-d", "--build"])
            .await
            .map_err(|e| OrchestratorError::ComposeUpFailed {
                message: format!("failed to spawn docker compose: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(OrchestratorError::ComposeUpFailed { message: stderr });
        }
        Ok(())
    }

    /// `docker compose down -v`. If the clone directory is already gone this
    /// is a no-op that logs and returns success, since teardown must be
    /// idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn down(&self) -> Result<()> {
        if !self.clone_dir.exists() {
            tracing::info!(dir = %self.clone_dir.display(), "clone dir already removed; skipping compose down");
            return Ok(());
        }

        let output = self.compose(&["down", "-v"]).await.map_err(|e| {
            tracing::warn!(error = %e, "failed to spawn docker compose down");
            e
        });

        match output {
            Ok(output) if !output.status.success() => {
                tracing::warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "docker compose down exited non-zero; proceeding with teardown"
                );
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(_) => Ok(()),
        }
    }

    async fn compose(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        Command::new("docker")
            .arg("compose")
            .args(args)
            .current_dir(&self.clone_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }

    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn down_is_noop_when_clone_dir_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");
        let runner = ComposeRunner::new(&missing);
        assert!(runner.down().await.is_ok());
    }
}
