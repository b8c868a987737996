//! YAML configuration loading for the status hub
//!
//! Configuration files may use `!env_var NAME [fallback]` anywhere a scalar
//! is expected.
//!
//! # Example
//!
//! ```ignore
//! use hub_config::HubConfig;
//!
//! let config = HubConfig::load("/etc/status-hub/hub.yaml")?;
//! println!("listening on {}", config.http.bind);
//! ```

mod error;
mod hub_config;
mod loader;

pub use error::{ConfigError, ConfigResult};
pub use hub_config::{HttpConfig, HubConfig, StatusConfig};
pub use loader::{load_yaml, load_yaml_string};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
