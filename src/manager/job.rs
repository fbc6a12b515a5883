use super::ManagerInner;
use crate::error::ManagerError;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// Fixed-delay evaluation loop of one manager
pub(super) struct EvaluationJob {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

impl EvaluationJob {
    /// Start the loop: wait `initial_delay`, then run a cycle and wait
    /// `refresh` after each one completes.
    pub(super) fn spawn(
        runtime: &Handle,
        manager: Weak<ManagerInner>,
        initial_delay: Duration,
        refresh: Duration,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let handle = runtime.spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                if flag.load(Ordering::Acquire) {
                    break;
                }
                let Some(inner) = manager.upgrade() else {
                    debug!("Manager dropped, stopping evaluation job");
                    break;
                };

                // The cycle locks and writes outputs synchronously. A panic
                // surfaces as a JoinError and the loop goes on.
                let cycle_flag = Arc::clone(&flag);
                let cycle = tokio::task::spawn_blocking(move || inner.run_cycle(&cycle_flag));
                match cycle.await {
                    Ok(outcome) => trace!("Evaluation cycle finished: {:?}", outcome),
                    Err(e) => error!("Evaluation cycle failed: {}", ManagerError::from(e)),
                }

                tokio::time::sleep(refresh).await;
            }
        });

        Self { handle, cancel }
    }

    pub(super) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the loop; a cycle in flight stops before its next channel
    pub(super) fn stop(self) {
        self.cancel.store(true, Ordering::Release);
        self.handle.abort();
    }
}
