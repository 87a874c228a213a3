//! Sampling loop.
//!
//! Flow per iteration:
//! SampleRequestSpec → SampleRequester → ResponseParser → SampleRun
//!
//! Batches are issued strictly one after another. A failed batch is counted
//! and skipped, never retried; the run stops early only when the
//! consecutive-failure budget is exhausted or the caller cancels.

use crate::client::{ResponseParser, SampleRequester};
use crate::models::{
    BatchFailure, RawOutcome, RunStatus, SampleRequestSpec, SampleRun, SamplingConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Caller-side cancellation, observed between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut notified = pin!(self.0.notify.notified());
        // Register before checking so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Loop policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorOptions {
    /// Back-to-back failures tolerated before the run is degraded
    pub max_consecutive_failures: u32,
    /// Pause between two calls
    pub request_interval: Duration,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            request_interval: Duration::ZERO,
        }
    }
}

impl CollectorOptions {
    pub fn from_config(sampling: &SamplingConfig) -> Self {
        Self {
            max_consecutive_failures: sampling.max_consecutive_failures.max(1),
            request_interval: Duration::from_millis(sampling.request_interval_ms),
        }
    }
}

/// Progress bar in the style used for terminal runs.
pub fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

/// Drives a requester until the run's target is met.
pub struct SampleCollector<R> {
    requester: R,
    parser: ResponseParser,
    user: String,
    options: CollectorOptions,
    cancel: CancelFlag,
    progress: ProgressBar,
}

impl<R: SampleRequester> SampleCollector<R> {
    /// Create a collector with a hidden progress bar and its own cancel flag.
    pub fn new(
        requester: R,
        parser: ResponseParser,
        user: impl Into<String>,
        options: CollectorOptions,
    ) -> Self {
        Self {
            requester,
            parser,
            user: user.into(),
            options,
            cancel: CancelFlag::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn requester(&self) -> &R {
        &self.requester
    }

    /// Create a fresh run and drive it to a terminal state.
    pub async fn run(&self, pool: &str, target: u64, batch_size: u32) -> SampleRun {
        let mut run = SampleRun::new(pool, target, batch_size);
        self.collect(&mut run).await;
        run
    }

    /// Drive an existing run to a terminal state.
    ///
    /// Runs that are already terminal are left untouched.
    pub async fn collect(&self, run: &mut SampleRun) {
        if run.status().is_terminal() {
            return;
        }

        let start = Instant::now();
        run.set_status(RunStatus::InProgress);

        info!(
            pool = run.pool(),
            target = run.target(),
            batch_size = run.batch_size(),
            planned_batches = run.planned_batches(),
            "Starting sampling run"
        );

        self.progress.set_length(run.target());
        self.progress.set_position(run.collected());

        let mut first = true;
        while run.wants_more() {
            if self.stop_if_cancelled(run) {
                break;
            }

            if !first && !self.options.request_interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.request_interval) => {}
                    _ = self.cancel.cancelled() => {}
                }
                if self.stop_if_cancelled(run) {
                    break;
                }
            }
            first = false;

            let spec = SampleRequestSpec {
                pool: run.pool().to_string(),
                user: self.user.clone(),
                batch_size: run.batch_size(),
            };
            let batch = run.batches_issued() + 1;

            match self.draw_batch(&spec).await {
                Ok(outcomes) => {
                    debug!(batch, outcomes = outcomes.len(), "Batch collected");
                    run.record_success(outcomes);
                }
                Err(failure) => {
                    let kind = failure.kind();
                    let streak = run.record_failure(kind);
                    warn!(
                        batch,
                        kind = %kind,
                        streak,
                        error = %failure,
                        "Batch failed, skipping"
                    );

                    if streak >= self.options.max_consecutive_failures {
                        warn!(
                            streak,
                            budget = self.options.max_consecutive_failures,
                            collected = run.collected(),
                            "Consecutive-failure budget exhausted, stopping run"
                        );
                        run.set_status(RunStatus::Degraded);
                        break;
                    }
                }
            }

            self.progress.set_position(run.collected().min(run.target()));
            self.progress
                .set_message(format!("failed batches: {}", run.failed_batches()));
        }

        if run.status() == RunStatus::InProgress {
            run.set_status(RunStatus::Completed);
        }

        self.progress.finish_with_message(format!(
            "{}: {} collected, {} failed batches",
            run.status(),
            run.collected(),
            run.failed_batches()
        ));

        info!(
            status = %run.status(),
            collected = run.collected(),
            batches = run.batches_issued(),
            failed = run.failed_batches(),
            elapsed = format!("{:.1}s", start.elapsed().as_secs_f64()),
            "Sampling run finished"
        );
    }

    fn stop_if_cancelled(&self, run: &mut SampleRun) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        warn!(collected = run.collected(), "Run cancelled by caller");
        run.set_status(RunStatus::Cancelled);
        true
    }

    /// One request + parse.
    async fn draw_batch(
        &self,
        spec: &SampleRequestSpec,
    ) -> std::result::Result<Vec<RawOutcome>, BatchFailure> {
        let body = self.requester.request(spec).await?;
        Ok(self.parser.parse(&body, spec.batch_size)?)
    }
}
