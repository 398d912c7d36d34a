use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EmailCategory, Priority};

/// Rendered email ready for a transport
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmailContent {
    /// Recipient address
    pub to: String,

    /// Subject line
    pub subject: String,

    /// HTML body
    pub html: String,

    /// Plain text body
    pub text: String,
}

impl EmailContent {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            text: text.into(),
        }
    }
}

/// A composed message handed to the queue by business logic
///
/// Unset options fall back to the queue configuration defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    /// What to deliver
    pub content: EmailContent,

    /// Observability tag
    pub category: EmailCategory,

    /// Delivery priority (queue default when `None`)
    pub priority: Option<Priority>,

    /// Attempt budget (queue default when `None`)
    pub max_attempts: Option<u32>,

    /// Earliest delivery time
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Correlation data for logs, e.g. the related entity id
    pub data: Option<Value>,
}

impl EmailMessage {
    /// Create a new message
    pub fn new(content: EmailContent, category: EmailCategory) -> Self {
        Self {
            content,
            category,
            priority: None,
            max_attempts: None,
            scheduled_at: None,
            data: None,
        }
    }

    /// Set the delivery priority
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Set the maximum delivery attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay delivery until the given time
    pub fn with_scheduled_at(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(scheduled_at);
        self
    }

    /// Attach correlation data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
