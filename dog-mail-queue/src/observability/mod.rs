pub mod metrics;
pub mod layer;
pub mod stats;

#[cfg(feature = "tracing-basic")]
pub mod logging;

use futures_core::Stream;
use std::pin::Pin;

pub use metrics::{CategoryMetrics, LiveMetrics, MetricsSnapshot};
pub use layer::ObservabilityLayer;
pub use stats::QueueStats;

#[cfg(feature = "tracing-basic")]
pub use logging::{init_tracing, LogFormat};

/// Type alias for boxed streams (stable Rust compatible)
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;
