//! Condition types
//!
//! Conditions are boolean views over the status tree. Leaf conditions watch
//! a pattern and test every matched value; combinators fold their children.

use hub_core::{Entry, Matches};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AutomationError, AutomationResult};

/// Condition definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Test the values matched by a pattern
    Watch(WatchCondition),

    /// All conditions must be true (AND)
    And(AndCondition),

    /// Any condition must be true (OR)
    Or(OrCondition),

    /// No condition may be true (NOT)
    Not(NotCondition),
}

impl Condition {
    /// Create a watch condition
    pub fn watch(url: impl Into<String>, test: ValueTest) -> Self {
        Condition::Watch(WatchCondition {
            url: url.into(),
            test,
        })
    }

    /// Create an AND condition
    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(AndCondition { conditions })
    }

    /// Create an OR condition
    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(OrCondition { conditions })
    }

    /// Create a NOT condition
    pub fn not(condition: Condition) -> Self {
        Condition::Not(NotCondition {
            conditions: vec![condition],
        })
    }

    /// Leaf conditions in depth-first order
    pub(crate) fn leaves(&self) -> Vec<&WatchCondition> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a WatchCondition>) {
        match self {
            Condition::Watch(leaf) => leaves.push(leaf),
            Condition::And(AndCondition { conditions })
            | Condition::Or(OrCondition { conditions })
            | Condition::Not(NotCondition { conditions }) => {
                for condition in conditions {
                    condition.collect_leaves(leaves);
                }
            }
        }
    }

    /// Reject combinators that cannot be evaluated meaningfully
    pub(crate) fn validate(&self) -> AutomationResult<()> {
        match self {
            Condition::Watch(_) => Ok(()),
            Condition::And(AndCondition { conditions })
            | Condition::Or(OrCondition { conditions })
            | Condition::Not(NotCondition { conditions }) => {
                if conditions.is_empty() {
                    return Err(AutomationError::InvalidCondition(
                        "and/or/not require at least one condition".to_string(),
                    ));
                }
                conditions.iter().try_for_each(Condition::validate)
            }
        }
    }

    /// Evaluate against per-leaf results given in depth-first order
    ///
    /// Every child is visited so `leaf` ends past this subtree.
    pub(crate) fn evaluate(&self, results: &[bool], leaf: &mut usize) -> bool {
        match self {
            Condition::Watch(_) => {
                let result = results.get(*leaf).copied().unwrap_or(false);
                *leaf += 1;
                result
            }
            Condition::And(AndCondition { conditions }) => conditions
                .iter()
                .map(|c| c.evaluate(results, leaf))
                .fold(true, |acc, r| acc && r),
            Condition::Or(OrCondition { conditions }) => conditions
                .iter()
                .map(|c| c.evaluate(results, leaf))
                .fold(false, |acc, r| acc || r),
            Condition::Not(NotCondition { conditions }) => !conditions
                .iter()
                .map(|c| c.evaluate(results, leaf))
                .fold(false, |acc, r| acc || r),
        }
    }
}

/// Watch condition - test the values matched by a pattern
///
/// True when the pattern matches at least one node and every matched value
/// passes the test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchCondition {
    /// Pattern to watch; may contain `*` segments
    pub url: String,

    /// Test applied to each matched value
    #[serde(default)]
    pub test: ValueTest,
}

/// AND condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndCondition {
    pub conditions: Vec<Condition>,
}

/// OR condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrCondition {
    pub conditions: Vec<Condition>,
}

/// NOT condition - true when none of the conditions is true
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotCondition {
    pub conditions: Vec<Condition>,
}

/// Test applied to a matched value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum ValueTest {
    /// The node exists
    #[default]
    Exists,

    /// The value equals the given one
    Equals { value: Value },

    /// Numeric value (or numeric string) strictly above a threshold
    Above { value: f64 },

    /// Numeric value (or numeric string) strictly below a threshold
    Below { value: f64 },

    /// String value matches a regular expression
    Matches { pattern: String },
}

/// A [`ValueTest`] with its regex compiled once
#[derive(Debug, Clone)]
pub(crate) enum CompiledTest {
    Exists,
    Equals(Value),
    Above(f64),
    Below(f64),
    Matches(Regex),
}

impl CompiledTest {
    pub(crate) fn compile(test: &ValueTest) -> AutomationResult<Self> {
        Ok(match test {
            ValueTest::Exists => CompiledTest::Exists,
            ValueTest::Equals { value } => CompiledTest::Equals(value.clone()),
            ValueTest::Above { value } => CompiledTest::Above(*value),
            ValueTest::Below { value } => CompiledTest::Below(*value),
            ValueTest::Matches { pattern } => {
                let regex = Regex::new(pattern).map_err(|source| AutomationError::InvalidRegex {
                    pattern: pattern.clone(),
                    source,
                })?;
                CompiledTest::Matches(regex)
            }
        })
    }

    fn check(&self, entry: &Entry) -> bool {
        match self {
            CompiledTest::Exists => true,
            CompiledTest::Equals(expected) => &entry.value == expected,
            CompiledTest::Above(threshold) => numeric(&entry.value).is_some_and(|v| v > *threshold),
            CompiledTest::Below(threshold) => numeric(&entry.value).is_some_and(|v| v < *threshold),
            CompiledTest::Matches(regex) => entry.value.as_str().is_some_and(|s| regex.is_match(s)),
        }
    }

    /// True if at least one entry matched and all of them pass
    pub(crate) fn check_all(&self, matches: &Matches) -> bool {
        !matches.is_empty() && matches.values().all(|entry| self.check(entry))
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
