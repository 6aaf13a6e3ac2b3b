use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::backend::JobBackend;
use crate::error::Result;
use crate::job::{Job, JobId, JobStatus};

const SLEEP_SLICE: Duration = Duration::from_millis(50);
const DEFAULT_FAILURE_MESSAGE: &str = "Cost analysis failed";

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEventKind {
    Progress(Job),
    Completed(Job),
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: JobId,
    pub kind: JobEventKind,
}

/// One poll step against the backend for a single job.
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    job_id: JobId,
    max_errors: u32,
    consecutive_errors: u32,
    last_seen: Option<(u8, Option<String>)>,
    finished: bool,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn JobBackend>, job_id: JobId, max_errors: u32) -> Self {
        Self {
            backend,
            job_id,
            max_errors: max_errors.max(1),
            consecutive_errors: 0,
            last_seen: None,
            finished: false,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `None` when nothing changed since the last poll, or when a transient
    /// fetch error is still under the failure threshold.
    pub fn poll(&mut self) -> Option<JobEvent> {
        if self.finished {
            return None;
        }
        let kind = match self.backend.fetch_job(&self.job_id) {
            Ok(job) => {
                self.consecutive_errors = 0;
                tracing::debug!(job_id = %self.job_id, progress = job.progress, status = %job.status, "polled job");
                match job.status {
                    JobStatus::Complete => {
                        self.finished = true;
                        JobEventKind::Completed(job)
                    }
                    JobStatus::Failed => {
                        self.finished = true;
                        JobEventKind::Failed(
                            job.error_message
                                .filter(|m| !m.trim().is_empty())
                                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
                        )
                    }
                    JobStatus::Cancelled => {
                        self.finished = true;
                        JobEventKind::Cancelled
                    }
                    JobStatus::Pending | JobStatus::Processing => {
                        let seen = (job.progress, job.current_step.clone());
                        if self.last_seen.as_ref() == Some(&seen) {
                            return None;
                        }
                        self.last_seen = Some(seen);
                        JobEventKind::Progress(job)
                    }
                }
            }
            Err(e) => {
                self.consecutive_errors += 1;
                tracing::warn!(
                    job_id = %self.job_id,
                    attempt = self.consecutive_errors,
                    "job poll failed: {e}"
                );
                if self.consecutive_errors < self.max_errors {
                    return None;
                }
                self.finished = true;
                JobEventKind::Failed(e.to_string())
            }
        };
        Some(JobEvent {
            job_id: self.job_id.clone(),
            kind,
        })
    }
}

/// Polls one job on a background thread and delivers [`JobEvent`]s over a
/// channel until the job ends or the watcher is cancelled.
pub struct JobWatcher {
    job_id: JobId,
    backend: Arc<dyn JobBackend>,
    events: Receiver<JobEvent>,
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl JobWatcher {
    pub fn spawn(
        backend: Arc<dyn JobBackend>,
        job_id: JobId,
        interval: Duration,
        max_errors: u32,
    ) -> Result<Self> {
        let (tx, rx) = unbounded();
        let token = CancellationToken::new();
        let poller = JobPoller::new(backend.clone(), job_id.clone(), max_errors);
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("job-watcher-{job_id}"))
            .spawn(move || run_watch_loop(poller, tx, thread_token, interval))?;
        tracing::info!(%job_id, "watching job");
        Ok(Self {
            job_id,
            backend,
            events: rx,
            token,
            _handle: handle,
        })
    }

    pub fn try_next(&self) -> Option<JobEvent> {
        self.events.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event. `None` on timeout or once the
    /// watcher has stopped and every event was drained.
    pub fn next_timeout(&self, timeout: Duration) -> Option<JobEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops polling and asks the backend to cancel without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
        let backend = self.backend.clone();
        let job_id = self.job_id.clone();
        let spawned = thread::Builder::new()
            .name(format!("job-cancel-{job_id}"))
            .spawn(move || {
                if let Err(e) = backend.cancel_job(&job_id) {
                    tracing::warn!(%job_id, "backend cancellation failed: {e}");
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(job_id = %self.job_id, "could not dispatch cancellation: {e}");
        }
    }
}

impl Drop for JobWatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn run_watch_loop(
    mut poller: JobPoller,
    tx: Sender<JobEvent>,
    token: CancellationToken,
    interval: Duration,
) {
    while !token.is_cancelled() {
        if let Some(event) = poller.poll() {
            if token.is_cancelled() || tx.send(event).is_err() {
                break;
            }
        }
        if poller.is_finished() {
            break;
        }
        sleep_unless_cancelled(interval, &token);
    }
    tracing::debug!(job_id = %poller.job_id(), "job watcher stopped");
}

fn sleep_unless_cancelled(interval: Duration, token: &CancellationToken) {
    let deadline = Instant::now() + interval;
    loop {
        let now = Instant::now();
        if token.is_cancelled() || now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
