//! Per-namespace mutual exclusion.
//!
//! Two concurrent requests for the same namespace are serialized; requests
//! on distinct namespaces proceed independently. Shaped the same way as a
//! small keyed cache: a registry of lazily-created per-key state guarded by
//! an `RwLock`, with the actual exclusion done by a `tokio::sync::Mutex`
//! held for the duration of one Create or Delete flow.
//!
//! The lock file on disk is a persisted artifact, not the exclusion
//! mechanism: this is a single long-running process, so in-process mutexes
//! are sufficient to serialize same-namespace requests, and the file exists
//! only so the namespace's lock is visible on disk for operator inspection
//! and survives process restarts as an artifact (not as live lock state).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{OrchestratorError, Result};

pub struct NamespaceLockRegistry {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    lock_dir: PathBuf,
}

impl NamespaceLockRegistry {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
            lock_dir: lock_dir.into(),
        }
    }

    fn lock_path(&self, namespace: &str) -> PathBuf {
        self.lock_dir.join(format!("{namespace}.lock"))
    }

    /// Acquires the per-namespace lock, touching its on-disk lock file on
    /// first acquisition. The returned guard releases the lock on drop.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, namespace: &str) -> Result<Arc<Mutex<()>>> {
        if let Some(existing) = self.locks.read().await.get(namespace) {
            return Ok(existing.clone());
        }

        let mut locks = self.locks.write().await;
        let mutex = locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        drop(locks);

        self.touch_lock_file(namespace).await?;
        Ok(mutex)
    }

    async fn touch_lock_file(&self, namespace: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.lock_dir)
            .await
            .map_err(OrchestratorError::Io)?;
        let path = self.lock_path(namespace);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::write(&path, b"").await.map_err(OrchestratorError::Io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_creates_lock_file_once() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = NamespaceLockRegistry::new(tmp.path());

        let mutex1 = registry.acquire("p_main_abc").await.unwrap();
        let _guard = mutex1.lock().await;
        assert!(tmp.path().join("p_main_abc.lock").exists());

        drop(_guard);
        let mutex2 = registry.acquire("p_main_abc").await.unwrap();
        assert!(Arc::ptr_eq(&mutex1, &mutex2));
    }

    #[tokio::test]
    async fn distinct_namespaces_get_distinct_mutexes() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = NamespaceLockRegistry::new(tmp.path());

        let a = registry.acquire("ns_a").await.unwrap();
        let b = registry.acquire("ns_b").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
