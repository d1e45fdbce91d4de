use crate::error::ClientError;
use crate::feedback::BackgroundFailureLog;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long `shutdown` waits for an in-flight poll before detaching it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Owns a running poll task. Dropping the handle stops the timer; a request
/// that is already in flight is allowed to finish.
pub struct PollHandle {
    name: &'static str,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the timer and gives an in-flight poll up to [`SHUTDOWN_GRACE`]
    /// to finish. A poll still running after that is left to complete on its
    /// own.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Poller {} still busy at shutdown, detaching", self.name);
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Runs `job` immediately and then every `every`, until the returned handle
/// is cancelled or dropped. Failures are routed to `failures`.
pub fn spawn_poller<F, Fut>(
    name: &'static str,
    every: Duration,
    failures: Arc<BackgroundFailureLog>,
    mut job: F,
) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Poller {} started ({:?})", name, every);

        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = job().await {
                        failures.record(name, &e);
                    }
                }
            }
        }

        debug!("Poller {} stopped", name);
    });

    PollHandle {
        name,
        token,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(
        calls: Arc<AtomicUsize>,
        fail: bool,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send>>
    {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(ClientError::validation("offline"))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_on_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(BackgroundFailureLog::default());
        let handle = spawn_poller(
            "file list",
            Duration::from_secs(2),
            log.clone(),
            counting_job(calls.clone(), false),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(log.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_stops_the_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(BackgroundFailureLog::default());
        let handle = spawn_poller(
            "disk space",
            Duration::from_secs(30),
            log.clone(),
            counting_job(calls.clone(), false),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_does_not_wait_for_a_stuck_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(BackgroundFailureLog::default());
        let started = calls.clone();
        let handle = spawn_poller("file list", Duration::from_secs(2), log, move || {
            started.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<(), ClientError>>()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::timeout(SHUTDOWN_GRACE * 2, handle.shutdown())
            .await
            .expect("shutdown waited on the stuck poll");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_go_to_the_background_log() {
        let calls = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(BackgroundFailureLog::default());
        let handle = spawn_poller(
            "file list",
            Duration::from_secs(2),
            log.clone(),
            counting_job(calls.clone(), true),
        );

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(log.len(), 2);
        assert_eq!(log.recent()[0].source, "file list");

        handle.shutdown().await;
    }
}
