use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn, Instrument};

use crate::{
    retry::{RetryDecision, RetryPolicy},
    store::OrderedStore,
    transport::TransportAdapter,
    EmailJob, JobEvent, MailQueueConfig, ObservabilityLayer,
};

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Delayed jobs moved into the ready set
    pub promoted: usize,
    /// Jobs popped from the store
    pub claimed: usize,
    pub sent: usize,
    /// Claimed before due and parked again
    pub deferred: usize,
    pub retried: usize,
    pub exhausted: usize,
    /// Jobs whose re-insert failed; their retry schedule is gone
    pub lost: usize,
    /// The store could not be reached this tick
    pub store_unavailable: bool,
}

impl TickReport {
    /// Check if the tick found nothing to do
    pub fn is_idle(&self) -> bool {
        self.claimed == 0 && self.promoted == 0
    }
}

/// Claims the highest-priority ready jobs and attempts delivery
pub struct Dispatcher {
    store: Arc<dyn OrderedStore>,
    transport: TransportAdapter,
    retry: RetryPolicy,
    observability: ObservabilityLayer,
    batch_size: usize,
    promote_batch: usize,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn OrderedStore>,
        transport: TransportAdapter,
        observability: ObservabilityLayer,
        config: &MailQueueConfig,
    ) -> Self {
        Self {
            store,
            transport,
            retry: config.retry,
            observability,
            batch_size: config.batch_size.max(1),
            promote_batch: config.promote_batch,
        }
    }

    /// Run one claim-and-send cycle. Never fails: every problem is logged.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let now = Utc::now();

        if self.store.capabilities().delayed_segment && self.promote_batch > 0 {
            match self.store.promote_due(now, self.promote_batch).await {
                Ok(promoted) => report.promoted = promoted,
                Err(e) => {
                    self.observability.metrics().increment_store_errors();
                    warn!(store = self.store.name(), error = %e, "Store unavailable, skipping tick");
                    report.store_unavailable = true;
                    return report;
                }
            }
        }

        let jobs = match self.store.pop_highest(self.batch_size).await {
            Ok(jobs) => jobs,
            Err(e) => {
                self.observability.metrics().increment_store_errors();
                warn!(store = self.store.name(), error = %e, "Store unavailable, skipping tick");
                report.store_unavailable = true;
                return report;
            }
        };

        if jobs.is_empty() {
            trace!("No pending email jobs");
            return report;
        }

        report.claimed = jobs.len();
        for job in jobs {
            let span = tracing::info_span!(
                "email_job",
                job.id = %job.id,
                job.category = %job.category,
                job.attempts = job.attempts
            );
            self.process(job, &mut report).instrument(span).await;
        }

        report
    }

    async fn process(&self, job: EmailJob, report: &mut TickReport) {
        let now = Utc::now();

        if !job.is_due(now) {
            let until = job.scheduled_at.unwrap_or(now);
            let job_id = job.id.clone();
            match self.store.schedule(job).await {
                Ok(()) => {
                    report.deferred += 1;
                    self.observability.metrics().increment_deferred();
                    self.observability.emit(JobEvent::Deferred { job_id, until, at: now });
                    trace!(%until, "Job not due yet, parked again");
                }
                Err(e) => {
                    report.lost += 1;
                    error!(job_id = %job_id, error = %e, "Failed to park job that is not due; job lost");
                }
            }
            return;
        }

        match self.transport.send(&job.content()).await {
            Ok(delivery) => {
                report.sent += 1;
                self.observability.metrics().increment_sent(job.category);
                self.observability.emit(JobEvent::Sent {
                    job_id: job.id.clone(),
                    attempts: job.attempts + 1,
                    at: Utc::now(),
                });
                info!(message_id = ?delivery.message_id, "Email delivered");
            }
            Err(send_error) => {
                let error_text = send_error.to_string();
                self.handle_failure(job, error_text, report).await;
            }
        }
    }

    async fn handle_failure(&self, job: EmailJob, error_text: String, report: &mut TickReport) {
        let category = job.category;

        match self.retry.on_failure(job, &error_text, Utc::now()) {
            RetryDecision::Retry(job) => {
                let job_id = job.id.clone();
                let attempts = job.attempts;
                let priority = job.priority;
                let retry_at = job.scheduled_at.unwrap_or_else(Utc::now);

                match self.store.schedule(job).await {
                    Ok(()) => {
                        report.retried += 1;
                        self.observability.metrics().increment_retried(category);
                        self.observability.emit(JobEvent::Retrying {
                            job_id,
                            attempts,
                            priority,
                            retry_at,
                            error: error_text.clone(),
                            at: Utc::now(),
                        });
                        warn!(attempts, %priority, %retry_at, error = %error_text, "Email send failed, will retry");
                    }
                    Err(e) => {
                        report.lost += 1;
                        error!(
                            job_id = %job_id,
                            attempts,
                            error = %e,
                            "Failed to re-insert email job; retry schedule lost"
                        );
                    }
                }
            }
            RetryDecision::Exhausted(job) => {
                report.exhausted += 1;
                self.observability.metrics().increment_exhausted(category);
                error!(
                    attempts = job.attempts,
                    recipient = %job.recipient,
                    data = ?job.data,
                    error = %error_text,
                    "Email delivery attempts exhausted, dropping job"
                );
                self.observability.emit(JobEvent::Exhausted {
                    job: Box::new(job),
                    error: error_text,
                    at: Utc::now(),
                });
            }
        }
    }
}

/// Clears the liveness flag however the poll loop ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodic driver around a [`Dispatcher`]
pub(crate) struct Poller {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) poll_interval: Duration,
    pub(crate) jitter: Duration,
}

impl Poller {
    /// Calculate the sleep duration with random jitter applied.
    fn sleep_duration_with_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.poll_interval;
        }

        let jitter_millis = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let random_jitter = rand::thread_rng().gen_range(0..=jitter_millis);
        self.poll_interval + Duration::from_millis(random_jitter)
    }

    /// Tick until shutdown is requested
    pub(crate) async fn run(self, running: Arc<AtomicBool>, mut shutdown_rx: oneshot::Receiver<()>) {
        let _guard = RunningGuard(running);
        info!(interval = ?self.poll_interval, "Mail queue poller started");

        loop {
            let report = self.dispatcher.tick().await;
            if !report.is_idle() {
                debug!(?report, "Mail queue tick finished");
            }

            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Mail queue poller shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.sleep_duration_with_jitter()) => {}
            }
        }

        info!("Mail queue poller stopped");
    }
}
