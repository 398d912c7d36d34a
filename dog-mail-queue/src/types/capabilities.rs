use serde::{Deserialize, Serialize};

/// Store capabilities - explicit feature detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCapabilities {
    /// Future-dated jobs are parked outside the ready set until due
    pub delayed_segment: bool,

    /// Several processes can poll the same store
    pub shared: bool,

    /// Jobs survive a process restart
    pub durable: bool,
}

impl Default for StoreCapabilities {
    fn default() -> Self {
        Self::minimal()
    }
}

impl StoreCapabilities {
    /// Insert, pop-highest and count only
    pub fn minimal() -> Self {
        Self {
            delayed_segment: false,
            shared: false,
            durable: false,
        }
    }

    /// Get list of supported features
    pub fn supported_features(&self) -> Vec<&'static str> {
        let mut features = Vec::new();

        if self.delayed_segment { features.push("delayed_segment"); }
        if self.shared { features.push("shared"); }
        if self.durable { features.push("durable"); }

        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_features() {
        assert!(StoreCapabilities::minimal().supported_features().is_empty());

        let caps = StoreCapabilities {
            delayed_segment: true,
            shared: false,
            durable: true,
        };
        assert_eq!(caps.supported_features(), vec!["delayed_segment", "durable"]);
    }
}
