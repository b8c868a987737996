//! YAML loader with `!env_var` substitution
//!
//! `!env_var NAME` is replaced by the variable's value; `!env_var NAME
//! fallback` uses `fallback` when the variable is unset. Substituted values
//! are re-parsed as YAML scalars so numbers and booleans keep their type.

use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};

const ENV_VAR_TAG: &str = "!env_var";

/// Load and process a YAML file
pub fn load_yaml(path: impl AsRef<Path>) -> ConfigResult<Value> {
    let path = path.as_ref();
    debug!("Loading YAML file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_yaml_string(&content, path)
}

/// Load and process YAML from a string; `source_path` is used for errors
pub fn load_yaml_string(content: &str, source_path: &Path) -> ConfigResult<Value> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: source_path.to_path_buf(),
        source: e,
    })?;

    process_value(value, source_path)
}

fn process_value(value: Value, source_path: &Path) -> ConfigResult<Value> {
    match value {
        Value::Tagged(tagged) => process_tagged(*tagged, source_path),
        Value::Mapping(map) => {
            let mut result = serde_yaml::Mapping::new();
            for (k, v) in map {
                result.insert(k, process_value(v, source_path)?);
            }
            Ok(Value::Mapping(result))
        }
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|v| process_value(v, source_path))
            .collect::<ConfigResult<Vec<_>>>()
            .map(Value::Sequence),
        _ => Ok(value),
    }
}

fn process_tagged(tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
    let tag = tagged.tag.to_string();
    if tag != ENV_VAR_TAG {
        // Unknown tag, keep it as-is but process the inner value
        let value = process_value(tagged.value, source_path)?;
        return Ok(Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag,
            value,
        })));
    }

    let spec = tagged
        .value
        .as_str()
        .ok_or_else(|| ConfigError::InvalidValue {
            key: ENV_VAR_TAG.to_string(),
            reason: "expected a variable name".to_string(),
        })?
        .trim()
        .to_string();

    let (var, fallback) = match spec.split_once(char::is_whitespace) {
        Some((var, fallback)) => (var, Some(fallback.trim())),
        None => (spec.as_str(), None),
    };
    trace!("Resolving environment variable '{}'", var);

    let raw = match std::env::var(var) {
        Ok(value) => value,
        Err(_) => fallback
            .map(str::to_string)
            .ok_or_else(|| ConfigError::EnvVarNotFound {
                var: var.to_string(),
            })?,
    };

    Ok(serde_yaml::from_str(&raw).unwrap_or(Value::String(raw)))
}
