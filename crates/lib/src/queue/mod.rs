//! Serialized compiler job queue.
//!
//! One background worker consumes [`CompileJob`]s strictly in submission
//! order, so at most one compiler process runs at any time. Submitting never
//! blocks; callers observe progress through [`TaskQueue::is_busy`] or wait
//! cooperatively with [`TaskQueue::wait_idle`].

mod backend;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::unit::UnitId;

pub use backend::{BackendError, CommandBackend, CompilerBackend, CompilerCall, JobKind};

#[derive(Debug, Error)]
pub enum PreWorkError {
  #[error("failed to write generated source {path}: {source}")]
  WriteSource {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("code generation failed for {unit}: {message}")]
  Generation { unit: UnitId, message: String },
}

/// A waiting caller was interrupted by its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait for the compiler queue was cancelled")]
pub struct WaitCancelled;

type PreWork = Box<dyn FnOnce() -> Result<(), PreWorkError> + Send>;

/// A single compile or link request.
pub struct CompileJob {
  pub call: CompilerCall,
  /// Runs on the worker right before the compiler, e.g. to write generated code.
  pub pre_work: Option<PreWork>,
  pub unit: Option<UnitId>,
  pub label: String,
  /// Cancelling skips the job if still queued and aborts it if running.
  pub cancel: CancellationToken,
}

impl CompileJob {
  pub fn new(call: CompilerCall, label: impl Into<String>, cancel: CancellationToken) -> Self {
    Self {
      call,
      pre_work: None,
      unit: None,
      label: label.into(),
      cancel,
    }
  }

  pub fn for_unit(mut self, unit: UnitId) -> Self {
    self.unit = Some(unit);
    self
  }

  pub fn with_pre_work(mut self, pre_work: impl FnOnce() -> Result<(), PreWorkError> + Send + 'static) -> Self {
    self.pre_work = Some(Box::new(pre_work));
    self
  }
}

impl fmt::Debug for CompileJob {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompileJob")
      .field("call", &self.call)
      .field("pre_work", &self.pre_work.is_some())
      .field("unit", &self.unit)
      .field("label", &self.label)
      .field("cancelled", &self.cancel.is_cancelled())
      .finish()
  }
}

struct Shared {
  jobs: mpsc::UnboundedSender<CompileJob>,
  pending: Arc<watch::Sender<usize>>,
  submitted: AtomicUsize,
  log_path: PathBuf,
}

/// Handle to the process-wide compiler queue. Clones share the same worker.
#[derive(Clone)]
pub struct TaskQueue {
  shared: Arc<Shared>,
}

impl TaskQueue {
  /// Start the worker on the current tokio runtime.
  ///
  /// Compiler output of every job is written to `log_path`. A job running
  /// longer than `job_timeout` is aborted and its cancellation token fired,
  /// so the rest of the submitting build's jobs are skipped.
  pub fn spawn<B: CompilerBackend>(backend: B, log_path: PathBuf, job_timeout: Option<Duration>) -> Self {
    let (jobs, receiver) = mpsc::unbounded_channel();
    let (pending, _) = watch::channel(0usize);
    let pending = Arc::new(pending);

    tokio::spawn(run_worker(
      backend,
      receiver,
      Arc::clone(&pending),
      log_path.clone(),
      job_timeout,
    ));

    Self {
      shared: Arc::new(Shared {
        jobs,
        pending,
        submitted: AtomicUsize::new(0),
        log_path,
      }),
    }
  }

  /// Append a job. Returns immediately.
  pub fn submit(&self, job: CompileJob) {
    debug!(job = %job.label, "job submitted");
    self.shared.pending.send_modify(|n| *n += 1);
    self.shared.submitted.fetch_add(1, Ordering::SeqCst);

    if let Err(mpsc::error::SendError(job)) = self.shared.jobs.send(job) {
      error!(job = %job.label, "compiler worker is gone, job dropped");
      self.shared.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
  }

  /// True while a job is queued or running.
  pub fn is_busy(&self) -> bool {
    *self.shared.pending.borrow() > 0
  }

  /// Number of jobs queued or running.
  pub fn pending(&self) -> usize {
    *self.shared.pending.borrow()
  }

  /// Observe the pending-job count.
  pub fn subscribe(&self) -> watch::Receiver<usize> {
    self.shared.pending.subscribe()
  }

  /// Total jobs ever submitted to this queue.
  pub fn submitted_count(&self) -> usize {
    self.shared.submitted.load(Ordering::SeqCst)
  }

  pub fn log_path(&self) -> &Path {
    &self.shared.log_path
  }

  /// Wait until no job is queued or running.
  ///
  /// `on_yield` is called every `interval` while waiting so the host can stay
  /// responsive. Returns early when `cancel` fires.
  pub async fn wait_idle(
    &self,
    interval: Duration,
    cancel: &CancellationToken,
    mut on_yield: impl FnMut(),
  ) -> Result<(), WaitCancelled> {
    let mut pending = self.subscribe();
    let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      if *pending.borrow_and_update() == 0 {
        return Ok(());
      }

      tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(WaitCancelled),
        changed = pending.changed() => {
          if changed.is_err() {
            return Ok(());
          }
        }
        _ = tick.tick() => on_yield(),
      }
    }
  }
}

impl fmt::Debug for TaskQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskQueue")
      .field("pending", &self.pending())
      .field("submitted", &self.submitted_count())
      .field("log_path", &self.shared.log_path)
      .finish()
  }
}

async fn run_worker<B: CompilerBackend>(
  backend: B,
  mut jobs: mpsc::UnboundedReceiver<CompileJob>,
  pending: Arc<watch::Sender<usize>>,
  log_path: PathBuf,
  job_timeout: Option<Duration>,
) {
  debug!("compiler worker started");
  let backend = Arc::new(backend);
  while let Some(job) = jobs.recv().await {
    let label = job.label.clone();
    // A panicking job must not take the worker, and the pending count, down with it.
    let handle = tokio::spawn(run_job(Arc::clone(&backend), job, log_path.clone(), job_timeout));
    if let Err(e) = handle.await {
      error!(job = %label, error = %e, "job aborted");
    }
    pending.send_modify(|n| *n = n.saturating_sub(1));
  }
  debug!("compiler worker stopped");
}

async fn run_job<B: CompilerBackend>(
  backend: Arc<B>,
  mut job: CompileJob,
  log_path: PathBuf,
  job_timeout: Option<Duration>,
) {
  if job.cancel.is_cancelled() {
    debug!(job = %job.label, "skipping cancelled job");
    return;
  }

  info!(job = %job.label, "job started");

  // Success is judged by the output's existence, so a leftover from an earlier build must go.
  if job.call.output_file.exists()
    && let Err(e) = std::fs::remove_file(&job.call.output_file)
  {
    warn!(output = ?job.call.output_file, error = %e, "failed to remove stale output");
  }

  if let Some(pre_work) = job.pre_work.take()
    && let Err(e) = pre_work()
  {
    error!(job = %job.label, error = %e, "pre-work failed, compiler not invoked");
    return;
  }

  let timer = async {
    match job_timeout {
      Some(limit) => tokio::time::sleep(limit).await,
      None => std::future::pending().await,
    }
  };

  tokio::select! {
    result = backend.invoke(&job.call, &log_path) => match result {
      Ok(()) => info!(job = %job.label, "job finished"),
      Err(e) => warn!(job = %job.label, error = %e, "compiler reported failure"),
    },
    _ = job.cancel.cancelled() => {
      warn!(job = %job.label, "job cancelled");
    }
    _ = timer => {
      error!(job = %job.label, timeout = ?job_timeout, "job timed out");
      job.cancel.cancel();
    }
  }
}
