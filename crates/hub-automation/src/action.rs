//! Actions executed when a rule fires
//!
//! Only status-tree actions live here. Integrations with external services
//! implement [`Action`] themselves.

use async_trait::async_trait;
use hub_core::Revision;
use hub_status::Status;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::AutomationResult;

/// Something a rule can do
#[async_trait]
pub trait Action: Send + Sync {
    /// Perform the action against the status tree
    async fn run(&self, status: &Status) -> AutomationResult<()>;

    /// Short human readable description for logs
    fn describe(&self) -> String;
}

/// Built-in actions, as they appear in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Write a value
    Set {
        url: String,
        value: serde_json::Value,
        #[serde(default)]
        revision: Revision,
    },

    /// Remove a node
    Remove {
        url: String,
        #[serde(default)]
        revision: Revision,
    },

    /// Wait before the next action
    Delay {
        #[serde(with = "millis")]
        delay: Duration,
    },
}

#[async_trait]
impl Action for ActionConfig {
    async fn run(&self, status: &Status) -> AutomationResult<()> {
        match self {
            ActionConfig::Set {
                url,
                value,
                revision,
            } => {
                let new_revision = status.set(url, value.clone(), *revision)?;
                debug!(url = %url, revision = new_revision, "Action set value");
            }
            ActionConfig::Remove { url, revision } => {
                let new_revision = status.remove(url, *revision)?;
                debug!(url = %url, revision = new_revision, "Action removed node");
            }
            ActionConfig::Delay { delay } => tokio::time::sleep(*delay).await,
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self {
            ActionConfig::Set { url, .. } => format!("set {}", url),
            ActionConfig::Remove { url, .. } => format!("remove {}", url),
            ActionConfig::Delay { delay } => format!("delay {}ms", delay.as_millis()),
        }
    }
}

/// Durations as integer milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_actions() {
        let actions: Vec<ActionConfig> = serde_json::from_value(json!([
            {"action": "set", "url": "status://light", "value": true},
            {"action": "remove", "url": "status://cmd", "revision": 4},
            {"action": "delay", "delay": 250}
        ]))
        .unwrap();

        assert_eq!(
            actions[0],
            ActionConfig::Set {
                url: "status://light".to_string(),
                value: json!(true),
                revision: Revision::Unchecked,
            }
        );
        assert_eq!(
            actions[1],
            ActionConfig::Remove {
                url: "status://cmd".to_string(),
                revision: Revision::Exact(4),
            }
        );
        assert_eq!(actions[2].describe(), "delay 250ms");
    }

    #[tokio::test]
    async fn test_set_and_remove() {
        let status = Status::new();
        let set = ActionConfig::Set {
            url: "status://siren".to_string(),
            value: json!("on"),
            revision: Revision::MustNotExist,
        };
        set.run(&status).await.unwrap();
        assert_eq!(status.get("status://siren").unwrap().value, json!("on"));

        // Create-only write conflicts the second time
        let err = set.run(&status).await.unwrap_err();
        assert!(err.is_conflict());

        let remove = ActionConfig::Remove {
            url: "status://siren".to_string(),
            revision: Revision::Unchecked,
        };
        remove.run(&status).await.unwrap();
        assert!(status.get("status://siren").unwrap_err().is_not_found());
    }
}
