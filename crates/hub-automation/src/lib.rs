//! Rules for the status hub
//!
//! Rules sit entirely on top of the status tree: they never touch its lock,
//! they only register watches and call the public write operations.
//!
//! ```text
//! RULE = CONDITION (watches) → ACTIONS (writes)
//! ```
//!
//! # Key Types
//!
//! - [`Condition`] - Boolean view over one or more watched patterns
//! - [`ConditionWatch`] - Fan-in event loop evaluating a condition
//! - [`Action`] - What a rule does when it fires
//! - [`RuleEngine`] - Runs all rules

pub mod action;
pub mod condition;
pub mod engine;
mod error;
pub mod rule;
pub mod watcher;

pub use action::{Action, ActionConfig};
pub use condition::{Condition, ValueTest, WatchCondition};
pub use engine::RuleEngine;
pub use error::{AutomationError, AutomationResult};
pub use rule::{Rule, RuleConfig};
pub use watcher::ConditionWatch;
