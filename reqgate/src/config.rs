//! Registry configuration record.
//!
//! Built in code, parsed from a JSON record, or read from the environment:
//! - `REQGATE_QUEUE` enables the shared admission queue
//! - `REQGATE_QUEUE_LOGS` raises admission events from trace to info
//! - `REQGATE_DEFAULT_PARALLEL` sets the default parallel policy
//! - `REQGATE_TURN_TIMEOUT_MS` bounds how long a call waits for its key

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigurationError;
use crate::transport::Transport;

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryOptions {
    /// Not representable in JSON; set in code.
    #[serde(skip)]
    pub client: Option<Arc<dyn Transport>>,
    #[serde(alias = "queue")]
    pub queue_enabled: bool,
    #[serde(alias = "queueLogs")]
    pub queue_debug_logging: bool,
    /// `None` leaves the registry's current default untouched.
    pub default_parallel_status: Option<bool>,
    /// `None` leaves the registry's current bound untouched; `reset` clears it.
    pub turn_timeout_ms: Option<u64>,
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn Transport>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_queue(mut self, enabled: bool) -> Self {
        self.queue_enabled = enabled;
        self
    }

    pub fn with_queue_logs(mut self, enabled: bool) -> Self {
        self.queue_debug_logging = enabled;
        self
    }

    pub fn with_default_parallel(mut self, parallel: bool) -> Self {
        self.default_parallel_status = Some(parallel);
        self
    }

    pub fn with_turn_timeout(mut self, limit: Duration) -> Self {
        self.turn_timeout_ms = Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a configuration record. Anything but a JSON object, or an object
    /// with wrongly-typed fields, is a `ConfigurationError`.
    pub fn from_value(value: &Value) -> Result<Self, ConfigurationError> {
        let kind = match value {
            Value::Object(_) => {
                return serde_json::from_value(value.clone())
                    .map_err(|e| ConfigurationError::Malformed(e.to_string()));
            }
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
        };
        Err(ConfigurationError::NotARecord(kind))
    }

    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read options through `lookup`; unset variables keep their defaults.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut options = Self::default();

        if let Some(value) = lookup("REQGATE_QUEUE") {
            options.queue_enabled = parse_flag("REQGATE_QUEUE", &value)?;
        }
        if let Some(value) = lookup("REQGATE_QUEUE_LOGS") {
            options.queue_debug_logging = parse_flag("REQGATE_QUEUE_LOGS", &value)?;
        }
        if let Some(value) = lookup("REQGATE_DEFAULT_PARALLEL") {
            options.default_parallel_status = Some(parse_flag("REQGATE_DEFAULT_PARALLEL", &value)?);
        }
        if let Some(value) = lookup("REQGATE_TURN_TIMEOUT_MS") {
            let ms = value.trim().parse::<u64>().map_err(|_| ConfigurationError::Env {
                var: "REQGATE_TURN_TIMEOUT_MS".to_string(),
                value: value.clone(),
            })?;
            options.turn_timeout_ms = Some(ms);
        }

        Ok(options)
    }
}

fn parse_flag(var: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::Env {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

impl std::fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("client", &self.client.as_ref().map(|_| ".."))
            .field("queue_enabled", &self.queue_enabled)
            .field("queue_debug_logging", &self.queue_debug_logging)
            .field("default_parallel_status", &self.default_parallel_status)
            .field("turn_timeout_ms", &self.turn_timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let options = RegistryOptions::default();
        assert!(options.client.is_none());
        assert!(!options.queue_enabled);
        assert!(!options.queue_debug_logging);
        assert!(options.default_parallel_status.is_none());
        assert!(options.turn_timeout().is_none());
    }

    #[test]
    fn huge_turn_timeout_saturates() {
        let options = RegistryOptions::new().with_turn_timeout(Duration::MAX);
        assert_eq!(options.turn_timeout_ms, Some(u64::MAX));

        let options = RegistryOptions::new().with_turn_timeout(Duration::from_secs(3));
        assert_eq!(options.turn_timeout_ms, Some(3000));
    }

    #[test]
    fn parses_camel_case_record() {
        let options = RegistryOptions::from_value(&json!({
            "queueEnabled": true,
            "queueDebugLogging": true,
            "defaultParallelStatus": false,
            "turnTimeoutMs": 250,
        }))
        .unwrap();
        assert!(options.queue_enabled);
        assert!(options.queue_debug_logging);
        assert_eq!(options.default_parallel_status, Some(false));
        assert_eq!(options.turn_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn accepts_short_field_names() {
        let options = RegistryOptions::from_value(&json!({
            "queue": true,
            "queueLogs": true,
        }))
        .unwrap();
        assert!(options.queue_enabled);
        assert!(options.queue_debug_logging);
    }

    #[test]
    fn empty_record_is_valid() {
        let options = RegistryOptions::from_value(&json!({})).unwrap();
        assert!(!options.queue_enabled);
    }

    #[test]
    fn rejects_non_records() {
        for (value, kind) in [
            (json!(null), "null"),
            (json!(true), "a boolean"),
            (json!(3), "a number"),
            (json!("queue"), "a string"),
            (json!([1, 2]), "an array"),
        ] {
            assert_eq!(
                RegistryOptions::from_value(&value).unwrap_err(),
                ConfigurationError::NotARecord(kind)
            );
        }
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let err = RegistryOptions::from_value(&json!({ "queueEnabled": "maybe" })).unwrap_err();
        assert!(matches!(err, ConfigurationError::Malformed(_)));
    }

    #[test]
    fn reads_environment_lookup() {
        let vars: HashMap<&str, &str> = [
            ("REQGATE_QUEUE", "1"),
            ("REQGATE_QUEUE_LOGS", "no"),
            ("REQGATE_DEFAULT_PARALLEL", "False"),
            ("REQGATE_TURN_TIMEOUT_MS", "1500"),
        ]
        .into_iter()
        .collect();
        let options =
            RegistryOptions::from_lookup(|var| vars.get(var).map(|v| v.to_string())).unwrap();
        assert!(options.queue_enabled);
        assert!(!options.queue_debug_logging);
        assert_eq!(options.default_parallel_status, Some(false));
        assert_eq!(options.turn_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn rejects_bad_environment_values() {
        let err = RegistryOptions::from_lookup(|var| {
            (var == "REQGATE_QUEUE").then(|| "sometimes".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::Env {
                var: "REQGATE_QUEUE".to_string(),
                value: "sometimes".to_string(),
            }
        );

        let err = RegistryOptions::from_lookup(|var| {
            (var == "REQGATE_TURN_TIMEOUT_MS").then(|| "-5".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Env { .. }));
    }
}
