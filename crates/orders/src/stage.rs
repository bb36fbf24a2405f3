//! Order creation stages.

use serde::Serialize;

/// Where an order creation attempt stands.
///
/// Stage transitions:
/// ```text
/// Validating ──► Pricing ──► Persisted ──► Confirmed
///     │             │
///     └──────┬──────┘
///            ├──► Rejected   (bad input, unknown user or product, no stock)
///            └──► Failed     (dependency or storage unavailable)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStage {
    /// Checking the user and the stock of every line.
    Validating,

    /// Fetching product names and prices.
    Pricing,

    /// Stored as PENDING, ORDER_CREATED handed to the publisher.
    Persisted,

    /// Stored as CONFIRMED (terminal state).
    Confirmed,

    /// Refused because of the request's content (terminal state).
    Rejected,

    /// Aborted because a dependency or the store failed (terminal state).
    Failed,
}

impl CreationStage {
    /// Returns true if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CreationStage::Confirmed | CreationStage::Rejected | CreationStage::Failed
        )
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationStage::Validating => "validating",
            CreationStage::Pricing => "pricing",
            CreationStage::Persisted => "persisted",
            CreationStage::Confirmed => "confirmed",
            CreationStage::Rejected => "rejected",
            CreationStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CreationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_stages() {
        assert!(CreationStage::Confirmed.is_terminal());
        assert!(CreationStage::Rejected.is_terminal());
        assert!(CreationStage::Failed.is_terminal());
        assert!(!CreationStage::Validating.is_terminal());
        assert!(!CreationStage::Persisted.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(CreationStage::Pricing.to_string(), "pricing");
    }
}
