//! Environment-scoped configuration entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Staging,
    Dev,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Staging => "staging",
            Environment::Dev => "dev",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prod" => Ok(Environment::Prod),
            "staging" => Ok(Environment::Staging),
            "dev" => Ok(Environment::Dev),
            other => Err(Error::invalid_request(format!(
                "unknown environment '{}' (expected prod, staging or dev)",
                other
            ))),
        }
    }
}

/// Typed config value. The type of a key is fixed at write time so clients
/// can rely on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ConfigValue {
    String(String),
    Number(Number),
    Boolean(bool),
    Json(Map<String, Value>),
}

impl ConfigValue {
    /// Validate an incoming JSON value. `null` and arrays have no variant.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(ConfigValue::String(s)),
            Value::Number(n) => Ok(ConfigValue::Number(n)),
            Value::Bool(b) => Ok(ConfigValue::Boolean(b)),
            Value::Object(map) => Ok(ConfigValue::Json(map)),
            Value::Null => Err(Error::InvalidConfigValue(
                "null is not a valid config value".to_string(),
            )),
            Value::Array(_) => Err(Error::InvalidConfigValue(
                "arrays must be wrapped in an object".to_string(),
            )),
        }
    }

    /// Plain JSON rendering used in client responses.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Number(n) => Value::Number(n.clone()),
            ConfigValue::Boolean(b) => Value::Bool(*b),
            ConfigValue::Json(map) => Value::Object(map.clone()),
        }
    }
}

/// One entry, unique on (project, environment, key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub project_id: String,
    pub environment: Environment,
    pub key: String,
    pub value: ConfigValue,
    pub is_enabled: bool,
}

impl ConfigEntry {
    pub fn new(
        project_id: impl Into<String>,
        environment: Environment,
        key: impl Into<String>,
        value: Value,
        is_enabled: bool,
    ) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidConfigValue(
                "config key cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            project_id: project_id.into(),
            environment,
            key,
            value: ConfigValue::from_json(value)?,
            is_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("production".parse::<Environment>().is_err());
        assert_eq!(Environment::default(), Environment::Prod);
    }

    #[test]
    fn test_config_value_rejects_null_and_arrays() {
        assert!(matches!(
            ConfigValue::from_json(Value::Null),
            Err(Error::InvalidConfigValue(_))
        ));
        assert!(matches!(
            ConfigValue::from_json(json!([1, 2])),
            Err(Error::InvalidConfigValue(_))
        ));
    }

    #[test]
    fn test_config_value_renders_plain_json() {
        let value = ConfigValue::from_json(json!({"color": "blue", "size": 3})).unwrap();
        assert_eq!(value.to_json(), json!({"color": "blue", "size": 3}));

        let flag = ConfigValue::from_json(json!(true)).unwrap();
        assert_eq!(flag, ConfigValue::Boolean(true));
    }

    #[test]
    fn test_config_value_storage_form_is_tagged() {
        let value = ConfigValue::from_json(json!(42)).unwrap();
        let stored = serde_json::to_value(&value).unwrap();
        assert_eq!(stored, json!({"type": "number", "value": 42}));
    }

    #[test]
    fn test_config_entry_requires_key() {
        let err = ConfigEntry::new("p1", Environment::Prod, "  ", json!("x"), true);
        assert!(err.is_err());

        let entry = ConfigEntry::new("p1", Environment::Dev, "theme", json!("dark"), true).unwrap();
        assert_eq!(entry.value, ConfigValue::String("dark".to_string()));
    }
}
