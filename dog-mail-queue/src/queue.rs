use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{
    dispatcher::{Dispatcher, Poller, TickReport},
    observability::{BoxStream, LiveMetrics, ObservabilityLayer, QueueStats},
    store::OrderedStore,
    transport::{MailTransport, TransportAdapter},
    EmailJob, EmailMessage, JobEvent, JobId, MailQueueConfig, QueueError, QueueResult,
};

/// Handle for the background poller task
struct PollerHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

/// Mail delivery queue
///
/// `enqueue` persists a message in the ordered store and returns at once.
/// When the store is down the message is sent directly instead. A poller
/// started with [`MailQueue::start`] claims ready jobs in priority order and
/// retries failures with backoff until their attempt budget runs out.
///
/// Any number of instances, in any number of processes, can share one store.
pub struct MailQueue {
    store: Arc<dyn OrderedStore>,
    transport: TransportAdapter,
    config: MailQueueConfig,
    observability: ObservabilityLayer,
    dispatcher: Arc<Dispatcher>,
    poller: Mutex<Option<PollerHandle>>,
    running: Arc<AtomicBool>,
}

impl MailQueue {
    /// Create a queue with default configuration
    pub fn new(store: Arc<dyn OrderedStore>, transport: Arc<dyn MailTransport>) -> Self {
        Self::build(store, transport, MailQueueConfig::default())
    }

    /// Create a queue with custom configuration
    pub fn with_config(
        store: Arc<dyn OrderedStore>,
        transport: Arc<dyn MailTransport>,
        config: MailQueueConfig,
    ) -> QueueResult<Self> {
        config.validate()?;
        Ok(Self::build(store, transport, config))
    }

    fn build(
        store: Arc<dyn OrderedStore>,
        transport: Arc<dyn MailTransport>,
        config: MailQueueConfig,
    ) -> Self {
        let transport = TransportAdapter::new(transport, config.send_timeout);
        let observability = ObservabilityLayer::new();
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            transport.clone(),
            observability.clone(),
            &config,
        ));

        Self {
            store,
            transport,
            config,
            observability,
            dispatcher,
            poller: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Accept a message for delivery
    ///
    /// Returns once the job is stored, or once the direct-send fallback has
    /// delivered it. Fails only when both paths fail.
    #[instrument(skip(self, message), fields(category = %message.category, to = %message.content.to))]
    pub async fn enqueue(&self, message: EmailMessage) -> QueueResult<JobId> {
        validate_message(&message)?;

        let job = EmailJob::from_message(
            message,
            self.config.default_priority,
            self.config.default_max_attempts,
        );
        let job_id = job.id.clone();
        let category = job.category;
        let priority = job.priority;

        let stored = if job.is_due(Utc::now()) {
            let score = job.priority.value();
            self.store.insert(job.clone(), score).await
        } else {
            self.store.schedule(job.clone()).await
        };

        let store_error = match stored {
            Ok(()) => {
                self.observability.metrics().increment_enqueued(category);
                self.observability.emit(JobEvent::Enqueued {
                    job_id: job_id.clone(),
                    category,
                    priority,
                    at: Utc::now(),
                });
                debug!(job_id = %job_id, %priority, "Email job enqueued");
                return Ok(job_id);
            }
            Err(e) => e,
        };

        self.observability.metrics().increment_store_errors();
        warn!(
            store = self.store.name(),
            error = %store_error,
            "Store rejected email job, sending directly"
        );

        // Direct send ignores scheduled_at.
        match self.transport.send(&job.content()).await {
            Ok(_) => {
                self.observability.metrics().increment_fallback_sent(category);
                self.observability.emit(JobEvent::FallbackSent {
                    job_id: job_id.clone(),
                    category,
                    at: Utc::now(),
                });
                info!(job_id = %job_id, "Email sent directly after store failure");
                Ok(job_id)
            }
            Err(transport_error) => Err(QueueError::QueueUnavailable {
                store: store_error,
                transport: transport_error,
            }),
        }
    }

    /// Start the background poller
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> QueueResult<()> {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return Err(QueueError::PollerAlreadyRunning);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| QueueError::Internal(format!("No tokio runtime: {e}")))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = Poller {
            dispatcher: self.dispatcher.clone(),
            poll_interval: self.config.poll_interval,
            jitter: self.config.poll_jitter,
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let join_handle = runtime.spawn(task.run(running, shutdown_rx));

        *poller = Some(PollerHandle {
            shutdown_tx,
            join_handle,
        });
        info!(
            store = self.store.name(),
            store_features = ?self.store.capabilities().supported_features(),
            transport = self.transport.name(),
            "Mail queue started"
        );
        Ok(())
    }

    /// Stop the poller and wait for the current tick to finish
    ///
    /// A no-op when the poller is not running.
    pub async fn stop(&self) -> QueueResult<()> {
        let handle = self.poller.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let _ = handle.shutdown_tx.send(());
        handle
            .join_handle
            .await
            .map_err(|e| QueueError::Internal(format!("Poller join error: {e}")))?;

        info!("Mail queue stopped");
        Ok(())
    }

    /// Run a single poll cycle on the caller's task
    pub async fn tick(&self) -> TickReport {
        self.dispatcher.tick().await
    }

    /// Check if the poller is live
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Pending job counts and counters
    ///
    /// Never fails: an unreachable store reports zero pending jobs.
    pub async fn stats(&self) -> QueueStats {
        let counts = async {
            let ready = self.store.count().await?;
            let delayed = self.store.count_delayed().await?;
            Ok::<_, crate::StoreError>((ready, delayed))
        };

        let (ready, delayed, store_reachable) = match counts.await {
            Ok((ready, delayed)) => (ready, delayed, true),
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Could not read queue length");
                (0, 0, false)
            }
        };

        QueueStats {
            pending: ready + delayed,
            ready,
            delayed,
            poller_running: self.is_running(),
            store_reachable,
            counters: self.observability.metrics().snapshot(),
        }
    }

    /// Subscribe to job lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.observability.subscribe()
    }

    /// Job lifecycle events as a stream
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        self.observability.event_stream()
    }

    /// Get live counters
    pub fn metrics(&self) -> &LiveMetrics {
        self.observability.metrics()
    }

    /// Get configuration
    pub fn config(&self) -> &MailQueueConfig {
        &self.config
    }

    /// Get the ordered store
    pub fn store(&self) -> &Arc<dyn OrderedStore> {
        &self.store
    }
}

impl Drop for MailQueue {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            handle.join_handle.abort();
        }
    }
}

fn validate_message(message: &EmailMessage) -> QueueResult<()> {
    if message.content.to.trim().is_empty() {
        return Err(QueueError::InvalidMessage("recipient is empty".to_string()));
    }
    if message.max_attempts == Some(0) {
        return Err(QueueError::InvalidMessage(
            "max_attempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}
