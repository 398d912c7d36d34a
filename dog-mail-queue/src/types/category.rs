use serde::{Deserialize, Serialize};

/// What kind of notification a job carries. Used for logs and counters only;
/// routing never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailCategory {
    Verification,
    PasswordReset,
    StatusUpdate,
    PaymentStatus,
    ReviewAssignment,
    Reminder,
    Other,
}

impl Default for EmailCategory {
    fn default() -> Self {
        Self::Other
    }
}

impl EmailCategory {
    /// Get all categories
    pub fn all() -> &'static [EmailCategory] {
        &[
            Self::Verification,
            Self::PasswordReset,
            Self::StatusUpdate,
            Self::PaymentStatus,
            Self::ReviewAssignment,
            Self::Reminder,
            Self::Other,
        ]
    }

    /// Get the wire name
    pub fn name(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::PasswordReset => "password-reset",
            Self::StatusUpdate => "status-update",
            Self::PaymentStatus => "payment-status",
            Self::ReviewAssignment => "review-assignment",
            Self::Reminder => "reminder",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for EmailCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::all()
            .iter()
            .copied()
            .find(|category| category.name() == normalized)
            .ok_or_else(|| format!("Invalid email category: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_display() {
        for category in EmailCategory::all() {
            let json = serde_json::to_string(category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }

    #[test]
    fn parses_snake_and_kebab_case() {
        assert_eq!(
            "password_reset".parse::<EmailCategory>().unwrap(),
            EmailCategory::PasswordReset
        );
        assert_eq!(
            "review-assignment".parse::<EmailCategory>().unwrap(),
            EmailCategory::ReviewAssignment
        );
        assert!("newsletter".parse::<EmailCategory>().is_err());
    }
}
