//! Automation errors

use hub_core::StatusError;
use thiserror::Error;

/// Automation errors
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Invalid condition configuration: {0}")]
    InvalidCondition(String),

    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule already registered: {0}")]
    DuplicateRule(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Action failed: {0}")]
    Action(String),

    #[error(transparent)]
    Status(#[from] StatusError),
}

impl AutomationError {
    /// True when a write lost an optimistic check
    pub fn is_conflict(&self) -> bool {
        matches!(self, AutomationError::Status(err) if err.is_conflict())
    }
}

/// Result type for automation operations
pub type AutomationResult<T> = Result<T, AutomationError>;
