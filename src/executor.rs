use anyhow::anyhow;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::model::RenderJob;
use crate::progress::ProgressTracker;
use crate::render::Renderer;

pub const DEFAULT_SEQUENTIAL_THRESHOLD: usize = 10;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const TIMEOUT_REASON: &str = "cancelled: batch timeout elapsed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub max_concurrency: usize,
    pub sequential_threshold: usize,
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(1),
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
            timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("max concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("batch timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Empty,
    Complete,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub success_count: usize,
    pub failures: Vec<JobFailure>,
    pub timed_out: bool,
}

impl BatchOutcome {
    fn for_batch(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn status(&self) -> BatchStatus {
        if self.total == 0 {
            BatchStatus::Empty
        } else if self.failures.is_empty() && self.success_count == self.total {
            BatchStatus::Complete
        } else if self.success_count == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Partial
        }
    }

    fn record_failure(&mut self, text: String, reason: String) {
        error!("render failed for '{}': {}", text, reason);
        self.failures.push(JobFailure { text, reason });
    }
}

/// Runs a batch of render jobs either inline or on bounded tokio tasks.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        if config.max_concurrency == 0 {
            return Err(ExecutorError::ZeroConcurrency);
        }
        if config.timeout.is_zero() {
            return Err(ExecutorError::ZeroTimeout);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn strategy_for(&self, job_count: usize) -> Strategy {
        if job_count < self.config.sequential_threshold {
            Strategy::Sequential
        } else {
            Strategy::Parallel
        }
    }

    pub async fn execute_all(
        &self,
        jobs: Vec<RenderJob>,
        renderer: Arc<dyn Renderer>,
        progress: Arc<ProgressTracker>,
    ) -> BatchOutcome {
        if jobs.is_empty() {
            debug!("no jobs to execute");
            return BatchOutcome::default();
        }
        let outcome = match self.strategy_for(jobs.len()) {
            Strategy::Sequential => {
                info!(
                    "processing {} jobs sequentially (below threshold of {})",
                    jobs.len(),
                    self.config.sequential_threshold
                );
                execute_sequentially(jobs, renderer.as_ref(), &progress)
            }
            Strategy::Parallel => {
                info!(
                    "processing {} jobs in parallel with {} permits",
                    jobs.len(),
                    self.config.max_concurrency
                );
                self.execute_in_parallel(jobs, renderer, progress).await
            }
        };
        if outcome.failures.is_empty() {
            info!("all {} jobs completed", outcome.success_count);
        } else {
            warn!(
                "{} of {} jobs failed",
                outcome.failure_count(),
                outcome.total
            );
        }
        outcome
    }

    async fn execute_in_parallel(
        &self,
        jobs: Vec<RenderJob>,
        renderer: Arc<dyn Renderer>,
        progress: Arc<ProgressTracker>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::for_batch(jobs.len());
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, (usize, String)> = HashMap::with_capacity(jobs.len());

        for (position, job) in jobs.into_iter().enumerate() {
            let text = job.text.clone();
            let permits = Arc::clone(&permits);
            let renderer = Arc::clone(&renderer);
            let progress = Arc::clone(&progress);
            let handle = tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow!("render permits closed"))?;
                tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                    render_one(renderer.as_ref(), &job)?;
                    progress.increment();
                    Ok(())
                })
                .await
                .map_err(|err| anyhow!("render task aborted: {}", err))?
            });
            pending.insert(handle.id(), (position, text));
        }

        let drained = tokio::time::timeout(self.config.timeout, async {
            while let Some(joined) = tasks.join_next_with_id().await {
                record_joined(&mut outcome, &mut pending, joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "batch timeout of {:?} elapsed with {} jobs outstanding; cancelling",
                self.config.timeout,
                pending.len()
            );
            cancel_outstanding(&mut tasks, pending, &mut outcome);
        }
        outcome
    }
}

type Joined = Result<(Id, anyhow::Result<()>), JoinError>;

fn record_joined(
    outcome: &mut BatchOutcome,
    pending: &mut HashMap<Id, (usize, String)>,
    joined: Joined,
) {
    match joined {
        Ok((id, result)) => {
            let text = pending.remove(&id).map(|(_, text)| text).unwrap_or_default();
            match result {
                Ok(()) => {
                    debug!("rendered job for text: {}", text);
                    outcome.success_count += 1;
                }
                Err(err) => outcome.record_failure(text, format!("{:#}", err)),
            }
        }
        Err(err) => {
            let text = pending
                .remove(&err.id())
                .map(|(_, text)| text)
                .unwrap_or_default();
            outcome.record_failure(text, format!("render task failed: {}", err));
        }
    }
}

/// Records jobs that finished but were not yet joined, then aborts the rest
/// and marks them cancelled in input order.
fn cancel_outstanding(
    tasks: &mut JoinSet<anyhow::Result<()>>,
    mut pending: HashMap<Id, (usize, String)>,
    outcome: &mut BatchOutcome,
) {
    while let Some(joined) = tasks.try_join_next_with_id() {
        record_joined(outcome, &mut pending, joined);
    }
    tasks.abort_all();
    outcome.timed_out = true;
    let mut outstanding: Vec<(usize, String)> = pending.into_values().collect();
    outstanding.sort_by_key(|(position, _)| *position);
    for (_, text) in outstanding {
        outcome.record_failure(text, TIMEOUT_REASON.to_string());
    }
}

fn execute_sequentially(
    jobs: Vec<RenderJob>,
    renderer: &dyn Renderer,
    progress: &ProgressTracker,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::for_batch(jobs.len());
    for job in jobs {
        match render_one(renderer, &job) {
            Ok(()) => {
                progress.increment();
                outcome.success_count += 1;
                debug!("rendered job for text: {}", job.text);
            }
            Err(err) => outcome.record_failure(job.text, format!("{:#}", err)),
        }
    }
    outcome
}

/// Invokes the renderer, turning a panic into an ordinary job failure.
fn render_one(renderer: &dyn Renderer, job: &RenderJob) -> anyhow::Result<()> {
    debug!("rendering job for text: {}", job.text);
    match catch_unwind(AssertUnwindSafe(|| renderer.render(job))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow!("renderer panicked: {}", message))
        }
    }
}
