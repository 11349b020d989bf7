//! Caller-side admission control.
//!
//! Bounds how many compositions render at once and serializes requests that
//! target the same project. Unrelated projects never wait on each other
//! beyond the global limit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{AcquireError, Mutex as AsyncMutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use reelsmith_models::ProjectId;

/// Held for the duration of one composition.
#[derive(Debug)]
pub struct AdmissionPermit {
    _slot: OwnedSemaphorePermit,
    _project: OwnedMutexGuard<()>,
}

#[derive(Debug, Clone)]
pub struct AdmissionControl {
    slots: Arc<Semaphore>,
    projects: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl AdmissionControl {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            projects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for the project lock, then for a global slot.
    ///
    /// The project lock is taken first so a queued request for a busy
    /// project does not occupy a slot another project could use.
    pub async fn acquire(&self, project: &ProjectId) -> Result<AdmissionPermit, AcquireError> {
        let lock = self.project_lock(project.as_str());
        let project_guard = lock.lock_owned().await;
        let slot = self.slots.clone().acquire_owned().await?;

        debug!(
            project_id = %project,
            available = self.available_slots(),
            "Composition admitted"
        );
        Ok(AdmissionPermit {
            _slot: slot,
            _project: project_guard,
        })
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    fn project_lock(&self, project: &str) -> Arc<AsyncMutex<()>> {
        let mut projects = match self.projects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Drop locks nobody holds or waits on
        projects.retain(|_, lock| Arc::strong_count(lock) > 1);
        projects
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_project_is_serialized() {
        let admission = AdmissionControl::new(4);
        let project = ProjectId::new("p");

        let first = admission.acquire(&project).await.unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), admission.acquire(&project)).await;
        assert!(blocked.is_err());

        drop(first);
        let second =
            tokio::time::timeout(Duration::from_millis(50), admission.acquire(&project)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_different_projects_run_together() {
        let admission = AdmissionControl::new(2);
        let _a = admission.acquire(&ProjectId::new("a")).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            admission.acquire(&ProjectId::new("b")),
        )
        .await;
        assert!(b.is_ok());
        assert_eq!(admission.available_slots(), 0);
    }

    #[tokio::test]
    async fn test_global_limit() {
        let admission = AdmissionControl::new(1);
        let _a = admission.acquire(&ProjectId::new("a")).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            admission.acquire(&ProjectId::new("b")),
        )
        .await;
        assert!(b.is_err());
    }
}
