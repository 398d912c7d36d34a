//! Outbound mail transports.
//!
//! A transport does the actual send. Connection pooling, authentication and
//! rate limiting are its own business; the queue only sees success or a
//! [`TransportError`](crate::TransportError), normalised by [`TransportAdapter`].

mod adapter;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "smtp")]
pub mod smtp;

pub use adapter::TransportAdapter;

use async_trait::async_trait;

use crate::{EmailContent, TransportResult};

/// Receipt for an accepted message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Transport-specific message id, when the server returns one
    pub message_id: Option<String>,
}

/// Trait for mail sending mechanisms
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send one message
    async fn send(&self, email: &EmailContent) -> TransportResult<Delivery>;

    /// Transport name for logging
    fn name(&self) -> &'static str;
}
