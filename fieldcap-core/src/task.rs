//! Timers and background tasks scoped to their owner
//!
//! A [`ScopedTask`] aborts its task when dropped, so a countdown or polling
//! loop never outlives the screen that started it.

use crate::error::FieldCapResult;
use crate::resource::{ResourceKind, ResourceLease, ResourceLedger};
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

/// Background task that is aborted when its owner goes away
#[derive(Debug)]
pub struct ScopedTask {
    name: String,
    handle: Option<JoinHandle<()>>,
    _lease: Option<ResourceLease>,
}

impl ScopedTask {
    /// Spawn `future` on the current tokio runtime
    pub fn spawn<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        debug!("Spawning scoped task {}", name);
        Self {
            name,
            handle: Some(tokio::spawn(future)),
            _lease: None,
        }
    }

    /// Spawn `future` and account it as a timer in `ledger`
    pub fn spawn_timer<F>(
        name: impl Into<String>,
        ledger: &ResourceLedger,
        future: F,
    ) -> FieldCapResult<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lease = ledger.acquire(ResourceKind::Timer)?;
        let mut task = Self::spawn(name, future);
        task._lease = Some(lease);
        Ok(task)
    }

    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task has run to completion (or was aborted)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Abort the task now
    pub fn abort(mut self) {
        self.abort_inner();
    }

    /// Let the task run to completion on its own
    ///
    /// Used when the task itself decides to finish, and by owners that want
    /// an in-flight step to complete while ignoring its result.
    pub fn detach(mut self) {
        if self.handle.take().is_some() {
            debug!("Detached scoped task {}", self.name);
        }
    }

    /// Wait for the task to finish
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    fn abort_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Aborted scoped task {}", self.name);
        }
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.abort_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();

        let task = ScopedTask::spawn("ticker", async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        drop(task);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_timer_lease() {
        let ledger = ResourceLedger::default();
        let task = ScopedTask::spawn_timer("countdown", &ledger, async {}).unwrap();
        assert_eq!(ledger.live(ResourceKind::Timer), 1);

        task.join().await;
        assert_eq!(ledger.live(ResourceKind::Timer), 0);
    }
}
