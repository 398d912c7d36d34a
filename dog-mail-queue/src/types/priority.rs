use serde::{Deserialize, Serialize};

/// Delivery priority score (higher values are delivered sooner)
///
/// Callers pick a level from their business rules; the retry policy lowers it
/// by one on every failed attempt so a failing recipient cannot starve fresh mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i64);

impl Priority {
    /// Security-sensitive mail: verification, password reset
    pub const CRITICAL: Priority = Priority(10);

    /// Confirmations and status changes
    pub const HIGH: Priority = Priority(7);

    /// Mid-range default
    pub const NORMAL: Priority = Priority(5);

    /// Reminders and digests
    pub const LOW: Priority = Priority(1);

    /// Get the numeric score used by the ordered store
    pub fn value(self) -> i64 {
        self.0
    }

    /// One step lower, saturating at the bottom of the range
    pub fn decremented(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Human-readable name of a named level, if this is one
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::CRITICAL => Some("critical"),
            Self::HIGH => Some("high"),
            Self::NORMAL => Some("normal"),
            Self::LOW => Some("low"),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::CRITICAL),
            "high" => Ok(Self::HIGH),
            "normal" => Ok(Self::NORMAL),
            "low" => Ok(Self::LOW),
            other => other
                .parse::<i64>()
                .map(Self)
                .map_err(|_| format!("Invalid priority: {}", s)),
        }
    }
}
