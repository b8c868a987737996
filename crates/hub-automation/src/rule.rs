//! Rule definitions

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::action::{Action, ActionConfig};
use crate::condition::Condition;

/// Rule configuration as it appears in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique rule name
    pub name: String,

    /// Condition whose false to true transitions fire the rule
    pub condition: Condition,

    /// Actions executed in order
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

/// A condition and the actions it fires
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub condition: Condition,
    pub actions: Vec<Arc<dyn Action>>,
}

impl Rule {
    /// Create a rule without actions
    pub fn new(name: impl Into<String>, condition: Condition) -> Self {
        Self {
            name: name.into(),
            condition,
            actions: Vec::new(),
        }
    }

    /// Append an action
    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }
}

impl From<RuleConfig> for Rule {
    fn from(config: RuleConfig) -> Self {
        Self {
            name: config.name,
            condition: config.condition,
            actions: config
                .actions
                .into_iter()
                .map(|action| Arc::new(action) as Arc<dyn Action>)
                .collect(),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let actions: Vec<String> = self.actions.iter().map(|a| a.describe()).collect();
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("condition", &self.condition)
            .field("actions", &actions)
            .finish()
    }
}
