use std::{future::Future, pin::Pin, time::Duration};

use log::debug;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A recurring job. Each tick builds and awaits one future; the next tick is
/// not observed until that future completes.
pub type Job = Box<dyn FnMut() -> JobFuture + Send>;

/// Cancellable handle for a scheduled recurring task.
///
/// Cancellation is idempotent: only the first call has an effect, and ticks
/// that race with it are dropped. A job already running when the handle is
/// cancelled is allowed to finish.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            token: CancellationToken::new(),
        }
    }

    /// Returns `true` if this call stopped the task.
    pub fn cancel(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        debug!("cancelled scheduled task '{}'", self.name);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

pub trait Scheduler: Send + Sync {
    /// Runs `job` after `first_delay`, then every `period` after that first run.
    fn schedule_repeating(
        &self,
        name: &'static str,
        first_delay: Duration,
        period: Duration,
        job: Job,
    ) -> TaskHandle;

    /// Runs `job` once after `delay` unless cancelled first.
    fn schedule_once(&self, name: &'static str, delay: Duration, job: JobFuture) -> TaskHandle;
}

/// Scheduler backed by the ambient tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(
        &self,
        name: &'static str,
        first_delay: Duration,
        period: Duration,
        mut job: Job,
    ) -> TaskHandle {
        let handle = TaskHandle::new(name);
        let token = handle.token();

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + first_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                job().await;
            }
        });

        handle
    }

    fn schedule_once(&self, name: &'static str, delay: Duration, job: JobFuture) -> TaskHandle {
        let handle = TaskHandle::new(name);
        let token = handle.token();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => job.await,
            }
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    fn counting_job(counter: Arc<AtomicU32>) -> Job {
        Box::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn repeating_task_runs_after_first_delay_then_on_period() {
        let runs = Arc::new(AtomicU32::new(0));
        let scheduler = TokioScheduler::new();
        let handle = scheduler.schedule_repeating(
            "test",
            Duration::from_secs(1),
            Duration::from_secs(15),
            counting_job(runs.clone()),
        );

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        assert!(handle.cancel());
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let scheduler = TokioScheduler::new();
        let handle = scheduler.schedule_repeating(
            "idle",
            Duration::from_secs(1),
            Duration::from_secs(1),
            counting_job(Arc::new(AtomicU32::new(0))),
        );

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_one_shot_never_runs() {
        let runs = Arc::new(AtomicU32::new(0));
        let scheduler = TokioScheduler::new();
        let counter = runs.clone();
        let handle = scheduler.schedule_once(
            "once",
            Duration::from_secs(2),
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
