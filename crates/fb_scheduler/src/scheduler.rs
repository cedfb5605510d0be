use async_trait::async_trait;
use chrono::{DateTime, Local};
use fb_core::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cron::CronSchedule;

/// Work invoked at every occurrence of a job's schedule.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn run(&self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> JobHandler for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self) -> Result<()> {
        (self)().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub schedule: String,
    pub running: bool,
}

struct JobEntry {
    schedule: CronSchedule,
    task: Option<JoinHandle<()>>,
}

impl JobEntry {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

/// Runs named jobs on cron schedules in local time.
///
/// Jobs move from registered to running on [`Scheduler::add_job`] and to
/// stopped on [`Scheduler::stop_job`]; stopped jobs stay listed in
/// [`Scheduler::status`].
#[derive(Default)]
pub struct Scheduler {
    jobs: RwLock<BTreeMap<String, JobEntry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` and starts firing it. An existing job with the same
    /// name is stopped and replaced. A malformed expression registers nothing.
    pub async fn add_job(
        &self,
        name: &str,
        expression: &str,
        handler: Arc<dyn JobHandler>,
    ) -> Result<()> {
        let schedule = CronSchedule::parse(expression)?;

        let mut jobs = self.jobs.write().await;
        if let Some(mut previous) = jobs.remove(name) {
            previous.stop();
            info!(job = name, "replacing existing job");
        }

        let task = tokio::spawn(run_job(name.to_string(), schedule.clone(), handler));
        info!(job = name, schedule = schedule.expression(), "job scheduled");
        jobs.insert(
            name.to_string(),
            JobEntry {
                schedule,
                task: Some(task),
            },
        );
        Ok(())
    }

    pub async fn stop_job(&self, name: &str) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(name) {
            Some(entry) => {
                if entry.stop() {
                    info!(job = name, "job stopped");
                }
            }
            None => debug!(job = name, "stop requested for unknown job"),
        }
    }

    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.write().await;
        for (name, entry) in jobs.iter_mut() {
            if entry.stop() {
                info!(job = %name, "job stopped");
            }
        }
    }

    pub async fn status(&self) -> Vec<JobStatus> {
        self.jobs
            .read()
            .await
            .iter()
            .map(|(name, entry)| JobStatus {
                name: name.clone(),
                schedule: entry.schedule.expression().to_string(),
                running: entry.is_running(),
            })
            .collect()
    }
}

async fn run_job(name: String, schedule: CronSchedule, handler: Arc<dyn JobHandler>) {
    let mut last_fire: Option<DateTime<Local>> = None;

    loop {
        // Never compute from before the previous firing, or a fast handler
        // could see the same occurrence twice.
        let now = Local::now();
        let from = match last_fire {
            Some(fired) if fired > now => fired,
            _ => now,
        };
        let Some(next) = schedule.next_after(&from) else {
            warn!(job = %name, "schedule has no further occurrences");
            return;
        };

        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(job = %name, next = %next, "waiting for next occurrence");
        tokio::time::sleep(wait).await;
        last_fire = Some(next);

        info!(job = %name, "running job");
        let invocation = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.run().await })
        };
        match invocation.await {
            Ok(Ok(())) => info!(job = %name, "job completed"),
            Ok(Err(e)) if e.is_structural() => warn!(job = %name, "job could not run: {}", e),
            Ok(Err(e)) => error!(job = %name, "job failed: {}", e),
            Err(e) if e.is_panic() => error!(job = %name, "job panicked"),
            Err(e) => warn!(job = %name, "job invocation cancelled: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fb_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> Arc<dyn JobHandler> {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_invalid_schedule_registers_nothing() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let result = scheduler
            .add_job("broken", "not a cron", counting_handler(counter))
            .await;
        assert!(matches!(result, Err(Error::InvalidSchedule { .. })));
        assert!(scheduler.status().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_fires_until_stopped() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_job("tick", "* * * * *", counting_handler(counter.clone()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
        assert_eq!(
            scheduler.status().await,
            vec![JobStatus {
                name: "tick".to_string(),
                schedule: "* * * * *".to_string(),
                running: true
            }]
        );

        scheduler.stop_job("tick").await;
        tokio::task::yield_now().await;
        let fired = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);

        let status = scheduler.status().await;
        assert_eq!(status.len(), 1);
        assert!(!status[0].running);

        // idempotent
        scheduler.stop_job("tick").await;
        scheduler.stop_job("missing").await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_and_panicking_handlers_keep_firing() {
        let scheduler = Scheduler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = calls.clone();
        let handler: Arc<dyn JobHandler> = Arc::new(move || {
            let calls = handler_calls.clone();
            async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => panic!("first run blows up"),
                    1 => Err(Error::Fetch("feed down".to_string())),
                    _ => Ok(()),
                }
            }
        });
        scheduler.add_job("flaky", "* * * * *", handler).await.unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert!(scheduler.status().await[0].running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_job_replaces_same_name() {
        let scheduler = Scheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler
            .add_job("brief", "* * * * *", counting_handler(first.clone()))
            .await
            .unwrap();
        scheduler
            .add_job("brief", "*/5 * * * *", counting_handler(second.clone()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert!(second.load(Ordering::SeqCst) >= 1);

        let status = scheduler.status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].schedule, "*/5 * * * *");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() {
        let scheduler = Scheduler::new();
        for name in ["a", "b"] {
            scheduler
                .add_job(name, "0 8 * * *", counting_handler(Arc::new(AtomicUsize::new(0))))
                .await
                .unwrap();
        }
        scheduler.stop_all().await;
        tokio::task::yield_now().await;

        let status = scheduler.status().await;
        assert_eq!(status.len(), 2);
        assert!(status.iter().all(|s| !s.running));
    }
}
