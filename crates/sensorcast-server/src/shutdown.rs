//! Server shutdown: one cancellation signal for the listener, every open
//! event stream and the stats logger, plus a bounded drain of their tasks.

use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a [`ShutdownSignal::drain`] left behind.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Tasks that ran to completion.
    pub completed: usize,
    /// Tasks that ended with a panic.
    pub panicked: usize,
    /// Tasks still running at the deadline. Already aborted; awaiting one
    /// yields a cancelled `JoinError`.
    pub aborted: Vec<JoinHandle<()>>,
}

impl DrainReport {
    /// Whether every task stopped on its own.
    pub fn is_clean(&self) -> bool {
        self.panicked == 0 && self.aborted.is_empty()
    }
}

/// Shared stop signal for a running server.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by event streams and background tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop accepting connections and end every event stream.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger, then wait up to `deadline` for `tasks`.
    ///
    /// Tasks still running at the deadline are aborted and handed back in
    /// the report.
    pub async fn drain(&self, mut tasks: Vec<JoinHandle<()>>, deadline: Duration) -> DrainReport {
        self.trigger();
        let deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        info!(task_count = tasks.len(), deadline_ms, "draining server tasks");

        let joined = tokio::time::timeout(deadline, join_all(tasks.iter_mut())).await;
        match joined {
            Ok(results) => {
                let panicked = results.iter().filter(|r| r.is_err()).count();
                if panicked > 0 {
                    warn!(panicked, "server tasks ended with a panic");
                }
                DrainReport {
                    completed: results.len() - panicked,
                    panicked,
                    aborted: Vec::new(),
                }
            }
            Err(_) => {
                let (finished, stuck): (Vec<_>, Vec<_>) =
                    tasks.into_iter().partition(JoinHandle::is_finished);
                for task in &stuck {
                    task.abort();
                }
                warn!(
                    tasks_aborted = stuck.len(),
                    deadline_ms, "drain deadline passed, aborting remaining tasks"
                );
                DrainReport {
                    completed: finished.len(),
                    panicked: 0,
                    aborted: stuck,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_idempotent_and_shared_by_clones() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let clone = signal.clone();
        let token = signal.token();
        clone.trigger();
        clone.trigger();
        assert!(token.is_cancelled());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn drain_waits_for_cooperative_tasks() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        let task = tokio::spawn(async move {
            token.cancelled().await;
            let _ = done_tx.send(());
        });

        let report = signal.drain(vec![task], Duration::from_secs(5)).await;
        assert!(report.is_clean());
        assert_eq!(report.completed, 1);
        assert!(done_rx.await.is_ok());
    }

    #[tokio::test]
    async fn drain_counts_panicked_tasks() {
        let signal = ShutdownSignal::new();
        let task = tokio::spawn(async { panic!("stats logger crashed") });

        let report = signal.drain(vec![task], Duration::from_secs(5)).await;
        assert_eq!(report.panicked, 1);
        assert_eq!(report.completed, 0);
        assert!(!report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_aborts_tasks_that_ignore_the_signal() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        let polite = tokio::spawn(async move { token.cancelled().await });
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let mut report = signal
            .drain(vec![polite, stuck], Duration::from_millis(100))
            .await;
        assert!(signal.is_triggered());
        assert_eq!(report.completed, 1);
        assert_eq!(report.aborted.len(), 1);

        let err = report.aborted.pop().unwrap().await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
