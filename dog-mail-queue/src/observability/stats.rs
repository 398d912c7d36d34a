use serde::Serialize;

use super::MetricsSnapshot;

/// Operational view of one queue instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Jobs waiting in the store, ready plus delayed (0 when the store is unreachable)
    pub pending: u64,

    /// Jobs eligible for the next claim
    pub ready: u64,

    /// Jobs parked until their scheduled time
    pub delayed: u64,

    /// Whether this process's poller is live
    pub poller_running: bool,

    /// Whether the counts above came from the store
    pub store_reachable: bool,

    /// Counters since this process started
    pub counters: MetricsSnapshot,
}
