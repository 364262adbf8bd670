//! Worker pool — runs jobs against the completion client with bounded
//! concurrency.
//!
//! Submissions land on an unbounded FIFO queue; a pool task admits them one
//! at a time by acquiring a semaphore permit before spawning, so at most
//! `size` jobs run concurrently and nothing is dropped while all workers
//! are busy. Each job opens its own dataset connection and closes it on
//! every exit path.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::completion::{CompletionClient, CompletionError, ToolContext};
use crate::dataset::DatasetStore;
use crate::job::{Job, JobResult};

type Submission = (Job, oneshot::Sender<JobResult>);

#[derive(Clone)]
pub struct WorkerPool {
    submit_tx: mpsc::UnboundedSender<Submission>,
}

impl WorkerPool {
    /// Start the pool with a fixed worker count. The count is configuration,
    /// not runtime state; it never changes after startup.
    pub fn start(size: usize, store: DatasetStore, client: Arc<dyn CompletionClient>) -> Self {
        let (submit_tx, mut submit_rx) = mpsc::unbounded_channel::<Submission>();
        let semaphore = Arc::new(Semaphore::new(size.max(1)));

        tokio::spawn(async move {
            tracing::info!(workers = size.max(1), "worker pool started");

            while let Some((job, reply_tx)) = submit_rx.recv().await {
                // Admission in queue order: the next job waits here until a
                // worker slot frees up.
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break, // semaphore closed
                };

                let store = store.clone();
                let client = client.clone();

                tokio::spawn(async move {
                    let job_id = job.id;
                    let result = run_job(&store, client.as_ref(), job).await;

                    tracing::debug!(
                        job_id,
                        ok = result.error.is_none(),
                        intermediates = result.intermediate.len(),
                        "job finished"
                    );

                    // The session may have gone away; nothing left to do then.
                    let _ = reply_tx.send(result);
                    drop(permit);
                });
            }

            tracing::info!("submission queue closed, worker pool exiting");
        });

        Self { submit_tx }
    }

    /// Enqueue a job. The returned receiver yields exactly one `JobResult`,
    /// success or failure.
    pub fn submit(&self, job: Job) -> oneshot::Receiver<JobResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if let Err(mpsc::error::SendError((job, reply_tx))) =
            self.submit_tx.send((job, reply_tx))
        {
            // Pool task is gone; fail the job rather than dropping it silently.
            tracing::error!(job_id = job.id, "worker pool is down, failing job");
            let _ = reply_tx.send(JobResult::failure(CompletionError::Other(
                "worker pool unavailable".into(),
            )));
        }
        reply_rx
    }
}

/// Run one job to completion. Never panics the pool: every failure becomes
/// a `JobResult` with `error` set. The dataset connection opened here is
/// dropped on all paths.
async fn run_job(store: &DatasetStore, client: &dyn CompletionClient, job: Job) -> JobResult {
    let conn = match store.connect() {
        Ok(conn) => conn,
        Err(e) => {
            return JobResult::failure(CompletionError::Other(format!(
                "failed to open dataset connection: {e}"
            )))
        }
    };

    let mut tools = ToolContext::new(conn);
    match client.complete(&job.messages, &job.model, &mut tools).await {
        Ok(completion) => JobResult::success(
            completion.message,
            completion.intermediate,
            tools.last_invocation(),
        ),
        Err(e) => {
            tracing::warn!(job_id = job.id, error = %e, "completion failed");
            JobResult::failure(e)
        }
    }
}
