//! Top-level hub configuration
//!
//! ```yaml
//! status:
//!   scheme: status
//!   initial:
//!     lights: {porch: off}
//! http:
//!   bind: 0.0.0.0:8080
//!   long_poll_timeout_secs: 60
//! rules:
//!   - name: porch_light
//!     condition: {condition: watch, url: "status://door/front"}
//!     actions:
//!       - {action: set, url: "status://lights/porch", value: on}
//! ```

use hub_automation::RuleConfig;
use hub_core::DEFAULT_SCHEME;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{load_yaml, load_yaml_string};

/// Status tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Scheme of every address served by the tree
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Value written at the root on startup
    #[serde(default)]
    pub initial: Option<serde_json::Value>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            initial: None,
        }
    }
}

/// HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Upper bound for long-poll requests
    #[serde(default = "default_long_poll_timeout_secs")]
    pub long_poll_timeout_secs: u64,
}

impl HttpConfig {
    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            long_poll_timeout_secs: default_long_poll_timeout_secs(),
        }
    }
}

/// Complete hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_long_poll_timeout_secs() -> u64 {
    60
}

impl HubConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_yaml(&load_yaml(path)?)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        Self::from_yaml(&load_yaml_string(content, Path::new("<string>"))?)
    }

    /// Parse configuration from an already loaded YAML value
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        // An empty file parses as null
        if yaml.is_null() {
            return Ok(Self::default());
        }

        let config: HubConfig =
            serde_yaml::from_value(yaml.clone()).map_err(|e| ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        let scheme = &self.status.scheme;
        if scheme.is_empty() || scheme.contains(['/', ':']) {
            return Err(ConfigError::InvalidValue {
                key: "status.scheme".to_string(),
                reason: format!("'{}' is not a valid scheme", scheme),
            });
        }

        let mut names = std::collections::HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "rules".to_string(),
                    reason: format!("duplicate rule name '{}'", rule.name),
                });
            }
        }
        Ok(())
    }
}
