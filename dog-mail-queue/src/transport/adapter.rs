use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use super::{Delivery, MailTransport};
use crate::{EmailContent, TransportError, TransportResult};

/// Uniform send contract over any [`MailTransport`]
///
/// Applies the send timeout and turns panics into `TransportError::Panicked`,
/// so callers only ever handle one failure shape.
#[derive(Clone)]
pub struct TransportAdapter {
    inner: Arc<dyn MailTransport>,
    timeout: Duration,
}

impl TransportAdapter {
    pub fn new(inner: Arc<dyn MailTransport>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Name of the wrapped transport
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Attempt one delivery
    pub async fn send(&self, email: &EmailContent) -> TransportResult<Delivery> {
        debug!(transport = self.inner.name(), to = %email.to, "Sending email");

        let attempt = AssertUnwindSafe(self.inner.send(email)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, attempt).await {
            Err(_) => Err(TransportError::Timeout(self.timeout)),
            Ok(Err(panic)) => Err(TransportError::Panicked(panic_message(&*panic))),
            Ok(Ok(result)) => result,
        };

        if let Err(ref e) = result {
            warn!(transport = self.inner.name(), to = %email.to, error = %e, "Email send failed");
        }
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
