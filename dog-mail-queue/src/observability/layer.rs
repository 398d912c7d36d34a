use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use super::{BoxStream, LiveMetrics};
use crate::JobEvent;

/// Event fan-out plus counters shared by the enqueuer and the dispatcher
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<JobEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a layer whose event channel buffers `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (event_broadcaster, _) = broadcast::channel(capacity);

        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    /// Publish an event; dropped silently when nobody listens
    pub fn emit(&self, event: JobEvent) {
        let _ = self.event_broadcaster.send(event);
    }

    /// Subscribe to raw events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_broadcaster.subscribe()
    }

    /// Events as a stream; lagged receivers skip what they missed
    pub fn event_stream(&self) -> BoxStream<JobEvent> {
        let stream = BroadcastStream::new(self.event_broadcaster.subscribe())
            .filter_map(|result| result.ok());
        Box::pin(stream)
    }

    /// Get live counters
    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}
