use tracing_subscriber::{fmt, EnvFilter};

use crate::{QueueError, QueueResult};

/// Output format for [`init_tracing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> QueueResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| QueueError::Internal(format!("Failed to install tracing subscriber: {e}")))
}
