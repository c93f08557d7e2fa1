//! Ordered multi-step operations across systems that cannot share a
//! transaction (Postgres and the blob store).
//!
//! Each step that succeeds registers a named compensating action. If a later
//! step fails, [`Saga::fail`] runs the registered compensations newest first.
//! A compensation that itself fails is logged and the remaining ones still
//! run, so the caller always surfaces the original error.

use anyhow::Result;
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{debug, error, info};

type Compensation = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

pub struct Saga {
    name: &'static str,
    compensations: Vec<(&'static str, Compensation)>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    /// Record that `step` completed and how to undo it
    pub fn compensate_with<F, Fut>(&mut self, step: &'static str, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        debug!(saga = self.name, step, "saga step completed");
        self.compensations.push((step, Box::new(move || Box::pin(action()))));
    }

    /// Number of compensations that would run on failure
    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Undo every completed step, newest first.
    /// Returns the names of compensations that failed.
    pub async fn fail(self) -> Vec<&'static str> {
        let mut failed = Vec::new();

        for (step, action) in self.compensations.into_iter().rev() {
            info!(saga = self.name, step, "running compensating action");
            if let Err(e) = action().await {
                error!(saga = self.name, step, "compensating action failed: {:#}", e);
                failed.push(step);
            }
        }

        failed
    }

    /// All steps succeeded; drop the compensations
    pub fn complete(self) {
        debug!(saga = self.name, steps = self.compensations.len(), "saga completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_fail_runs_compensations_in_reverse() {
        let log = recorder();
        let mut saga = Saga::new("test");

        for step in ["insert_row", "put_blob", "update_row"] {
            let log = log.clone();
            saga.compensate_with(step, move || async move {
                log.lock().unwrap().push(step);
                Ok(())
            });
        }
        assert_eq!(saga.pending(), 3);

        let failed = saga.fail().await;
        assert!(failed.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["update_row", "put_blob", "insert_row"]);
    }

    #[tokio::test]
    async fn test_failing_compensation_does_not_stop_the_rest() {
        let log = recorder();
        let mut saga = Saga::new("test");

        let first = log.clone();
        saga.compensate_with("first", move || async move {
            first.lock().unwrap().push("first");
            Ok(())
        });
        saga.compensate_with("broken", || async { Err(anyhow::anyhow!("blob store unreachable")) });

        let failed = saga.fail().await;
        assert_eq!(failed, vec!["broken"]);
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_complete_skips_compensations() {
        let log = recorder();
        let mut saga = Saga::new("test");

        let inner = log.clone();
        saga.compensate_with("step", move || async move {
            inner.lock().unwrap().push("step");
            Ok(())
        });
        saga.complete();

        assert!(log.lock().unwrap().is_empty());
    }
}
