pub mod session_cleanup;
pub mod store_flush;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::{Config, WorkerConfig};
use crate::srs::registry::SessionRegistry;
use crate::store::Store;

/// 单次执行上限
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    SessionCleanup,
    StoreFlush,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCleanup => "session_cleanup",
            Self::StoreFlush => "store_flush",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

pub struct WorkerManager {
    store: Arc<Store>,
    sessions: Arc<SessionRegistry>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
    session_idle: chrono::Duration,
}

impl WorkerManager {
    pub fn new(
        store: Arc<Store>,
        sessions: Arc<SessionRegistry>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            sessions,
            shutdown_rx,
            config: config.worker.clone(),
            session_idle: chrono::Duration::minutes(config.study.session_idle_minutes.max(1)),
        }
    }

    /// Jobs this instance schedules; empty unless it is the worker leader.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::SessionCleanup,
                cron: "0 */10 * * * *",
                enabled: true,
            },
            JobSpec {
                name: WorkerName::StoreFlush,
                cron: "0 * * * * *",
                enabled: true,
            },
        ]
    }

    /// Runs the scheduler until the shutdown broadcast fires.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Not the worker leader; nothing to schedule");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        for spec in self.planned_jobs().into_iter().filter(|spec| spec.enabled) {
            self.register(&scheduler, &spec).await;
        }
        scheduler.start().await?;
        tracing::info!("Worker scheduler running");

        let _ = self.shutdown_rx.recv().await;
        tracing::info!(drain_ms = DRAIN_TIMEOUT.as_millis() as u64, "Stopping worker scheduler");
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register(&self, scheduler: &JobScheduler, spec: &JobSpec) {
        match spec.name {
            WorkerName::SessionCleanup => {
                let sessions = self.sessions.clone();
                let idle = self.session_idle;
                add_job(scheduler, spec, move || {
                    let sessions = sessions.clone();
                    async move { session_cleanup::run(&sessions, idle).await }
                })
                .await;
            }
            WorkerName::StoreFlush => {
                let store = self.store.clone();
                add_job(scheduler, spec, move || {
                    let store = store.clone();
                    async move { store_flush::run(&store).await }
                })
                .await;
            }
        }
    }
}

/// 同一个 job 上一轮未结束时直接跳过本轮；释放在 drop 中完成，超时也能复位
struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn add_job<Fut, F>(scheduler: &JobScheduler, spec: &JobSpec, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let worker = spec.name.as_str();
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(spec.cron, move |_uuid, _lock| {
        let Some(flag) = RunningFlag::acquire(&running) else {
            tracing::warn!(worker, "Previous run still in progress, skipping tick");
            return Box::pin(async {});
        };
        let fut = run();
        Box::pin(async move {
            let _flag = flag;
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(worker, timeout_secs = WORKER_TIMEOUT.as_secs(), "Worker timed out");
            }
        })
    });

    let added = match job {
        Ok(job) => scheduler.add(job).await.map(|_| ()),
        Err(e) => Err(e),
    };
    match added {
        Ok(()) => tracing::info!(worker, cron = spec.cron, "Registered worker"),
        Err(e) => tracing::error!(worker, cron = spec.cron, error = %e, "Failed to register worker"),
    }
}
