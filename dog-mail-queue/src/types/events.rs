use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EmailCategory, EmailJob, JobId, Priority};

/// Lifecycle events published by the queue
///
/// `Exhausted` carries the whole job so a subscriber can keep a dead-letter copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// Job was accepted by the ordered store
    Enqueued {
        job_id: JobId,
        category: EmailCategory,
        priority: Priority,
        at: DateTime<Utc>,
    },

    /// Store was unreachable and the message went straight to the transport
    FallbackSent {
        job_id: JobId,
        category: EmailCategory,
        at: DateTime<Utc>,
    },

    /// Job was claimed before it was due and parked again
    Deferred {
        job_id: JobId,
        until: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// Job was delivered
    Sent {
        job_id: JobId,
        attempts: u32,
        at: DateTime<Utc>,
    },

    /// Delivery failed and the job was re-inserted
    Retrying {
        job_id: JobId,
        attempts: u32,
        priority: Priority,
        retry_at: DateTime<Utc>,
        error: String,
        at: DateTime<Utc>,
    },

    /// Delivery failed for the last time and the job was dropped
    Exhausted {
        job: Box<EmailJob>,
        error: String,
        at: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::FallbackSent { .. } => "fallback_sent",
            Self::Deferred { .. } => "deferred",
            Self::Sent { .. } => "sent",
            Self::Retrying { .. } => "retrying",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    /// Get the job ID from any event
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Enqueued { job_id, .. } => job_id,
            Self::FallbackSent { job_id, .. } => job_id,
            Self::Deferred { job_id, .. } => job_id,
            Self::Sent { job_id, .. } => job_id,
            Self::Retrying { job_id, .. } => job_id,
            Self::Exhausted { job, .. } => &job.id,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::Enqueued { at, .. } => at,
            Self::FallbackSent { at, .. } => at,
            Self::Deferred { at, .. } => at,
            Self::Sent { at, .. } => at,
            Self::Retrying { at, .. } => at,
            Self::Exhausted { at, .. } => at,
        }
    }
}
