// In-process job queue.
//
// Every unit of work (one scrape, one post label, one post extraction, one
// full pipeline run) is its own job, retried on its own. N workers share one
// receiver. Retryable failures are re-sent after a fixed backoff until the
// try budget is spent; then the handler's exhaustion hook runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shopscout_core::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    Scrape { profile_id: Uuid, run_id: Uuid },
    LabelPost { post_id: Uuid },
    ProcessPost { post_id: Uuid, run_id: Uuid },
    FullPipeline { profile_id: Uuid, run_id: Uuid },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Scrape { .. } => "scrape",
            Job::LabelPost { .. } => "label_post",
            Job::ProcessPost { .. } => "process_post",
            Job::FullPipeline { .. } => "full_pipeline",
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job) -> Result<(), PipelineError>;

    /// Called once when a job fails for the last time.
    async fn on_exhausted(&self, job: Job, error: &PipelineError);

    fn timeout_for(&self, job: &Job) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub tries: u32,
    pub backoff: Duration,
}

#[derive(Debug)]
struct Envelope {
    job: Job,
    attempt: u32,
}

struct Shared {
    tx: mpsc::UnboundedSender<Envelope>,
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Sending half of the queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<Shared>,
}

/// Receiving half, consumed by [`WorkerPool::start`].
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl JobQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            shared: Arc::new(Shared {
                tx,
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        };
        (queue, JobReceiver { rx })
    }

    pub fn enqueue(&self, job: Job) -> Result<(), PipelineError> {
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.shared.tx.send(Envelope { job, attempt: 1 }).is_err() {
            self.finish();
            return Err(PipelineError::Other(anyhow!("job queue is closed")));
        }
        debug!(job = job.name(), "Job enqueued");
        Ok(())
    }

    /// Jobs enqueued and not yet finished, retries in backoff included.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued job has finished for good.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn resend(&self, envelope: Envelope) {
        if self.shared.tx.send(envelope).is_err() {
            self.finish();
        }
    }

    fn finish(&self) {
        if self.shared.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.idle.notify_waiters();
        }
    }
}

pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        receiver: JobReceiver,
        queue: JobQueue,
        handler: Arc<dyn JobHandler>,
        workers: usize,
        policy: RetryPolicy,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let rx = Arc::new(Mutex::new(receiver.rx));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let queue = queue.clone();
                let handler = handler.clone();
                let mut shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    loop {
                        let envelope = tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            next = async { rx.lock().await.recv().await } => match next {
                                Some(envelope) => envelope,
                                None => break,
                            },
                        };
                        run_job(worker, &queue, handler.clone(), policy, envelope).await;
                    }
                    debug!(worker, "Worker stopped");
                })
            })
            .collect();

        Self { shutdown, handles }
    }

    /// Stop taking new jobs and wait for in-flight ones.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_job(
    worker: usize,
    queue: &JobQueue,
    handler: Arc<dyn JobHandler>,
    policy: RetryPolicy,
    envelope: Envelope,
) {
    let Envelope { job, attempt } = envelope;
    let timeout = handler.timeout_for(&job);
    debug!(worker, job = job.name(), attempt, "Job started");

    let task_handler = handler.clone();
    let mut task = tokio::spawn(async move { task_handler.handle(job).await });
    let result = match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(PipelineError::Other(anyhow!("job task failed: {join}"))),
        Err(_) => {
            task.abort();
            Err(PipelineError::Timeout(timeout.as_secs()))
        }
    };

    match result {
        Ok(()) => {
            debug!(worker, job = job.name(), attempt, "Job finished");
            queue.finish();
        }
        Err(e) if e.is_retryable() && attempt < policy.tries => {
            warn!(
                worker,
                job = job.name(),
                attempt,
                max_attempts = policy.tries,
                error = %e,
                "Job failed, retrying"
            );
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::time::sleep(policy.backoff).await;
                queue.resend(Envelope {
                    job,
                    attempt: attempt + 1,
                });
            });
        }
        Err(e) => {
            error!(worker, job = ?job, attempt, error = %e, "Job failed permanently");
            handler.on_exhausted(job, &e).await;
            queue.finish();
        }
    }
}
