use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EmailCategory, EmailContent, EmailMessage, JobId, Priority};

/// Email job - the durable record kept in the ordered store
///
/// Never mutated in place inside a store: updates are pop, change, re-insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailJob {
    /// Unique job identifier
    pub id: JobId,

    /// Recipient address
    #[serde(rename = "to")]
    pub recipient: String,

    pub subject: String,

    #[serde(rename = "html")]
    pub html_body: String,

    #[serde(rename = "text")]
    pub text_body: String,

    pub category: EmailCategory,

    /// Current score; lowered on each failed attempt
    pub priority: Priority,

    /// Failed delivery attempts so far
    pub attempts: u32,

    /// Attempt ceiling
    pub max_attempts: u32,

    pub created_at: DateTime<Utc>,

    /// Not eligible for dispatch before this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Opaque correlation bag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Last transport failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl EmailJob {
    /// Build a fresh job from a message, resolving unset options
    pub fn from_message(
        message: EmailMessage,
        default_priority: Priority,
        default_max_attempts: u32,
    ) -> Self {
        let EmailMessage {
            content,
            category,
            priority,
            max_attempts,
            scheduled_at,
            data,
        } = message;

        Self {
            id: JobId::new(),
            recipient: content.to,
            subject: content.subject,
            html_body: content.html,
            text_body: content.text,
            category,
            priority: priority.unwrap_or(default_priority),
            attempts: 0,
            max_attempts: max_attempts.unwrap_or(default_max_attempts),
            created_at: Utc::now(),
            scheduled_at,
            data,
            last_error: None,
        }
    }

    /// Check if the job may be sent at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.map_or(true, |at| at <= now)
    }

    /// Check if the attempt budget is used up
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Attempts left before the job is dropped
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    /// The payload a transport needs
    pub fn content(&self) -> EmailContent {
        EmailContent {
            to: self.recipient.clone(),
            subject: self.subject.clone(),
            html: self.html_body.clone(),
            text: self.text_body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> EmailMessage {
        EmailMessage::new(
            EmailContent::new("ada@example.com", "Verify your account", "<p>hi</p>", "hi"),
            EmailCategory::Verification,
        )
    }

    #[test]
    fn from_message_applies_defaults() {
        let job = EmailJob::from_message(message(), Priority::NORMAL, 3);
        assert_eq!(job.priority, Priority::NORMAL);
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.attempts, 0);
        assert!(job.scheduled_at.is_none());
        assert_eq!(job.content(), message().content);
    }

    #[test]
    fn explicit_options_win_over_defaults() {
        let job = EmailJob::from_message(
            message().with_priority(Priority::CRITICAL).with_max_attempts(5),
            Priority::NORMAL,
            3,
        );
        assert_eq!(job.priority, Priority::CRITICAL);
        assert_eq!(job.max_attempts, 5);
        assert_eq!(job.remaining_attempts(), 5);
    }

    #[test]
    fn due_only_after_scheduled_time() {
        let now = Utc::now();
        let job = EmailJob::from_message(
            message().with_scheduled_at(now + chrono::Duration::seconds(30)),
            Priority::NORMAL,
            3,
        );
        assert!(!job.is_due(now));
        assert!(job.is_due(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn wire_shape_uses_documented_names() {
        let job = EmailJob::from_message(
            message().with_data(json!({ "userId": 7 })),
            Priority::HIGH,
            3,
        );
        let value = serde_json::to_value(&job).unwrap();

        for key in [
            "id", "to", "subject", "html", "text", "category", "priority", "attempts",
            "maxAttempts", "createdAt", "data",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value.get("scheduledAt").is_none());
        assert_eq!(value["category"], "verification");
        assert_eq!(value["priority"], 7);

        let back: EmailJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }
}
