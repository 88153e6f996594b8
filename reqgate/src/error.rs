//! Error taxonomy for configuration, registration, and fired calls.

use std::time::Duration;

use crate::hooks::HookName;
use crate::key::Key;

/// Malformed setup options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid options passed: expected a configuration record, got {0}")]
    NotARecord(&'static str),

    #[error("invalid options passed: {0}")]
    Malformed(String),

    #[error("invalid value {value:?} for {var}")]
    Env { var: String, value: String },
}

/// Rejected hook or validator registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid argument: {found} callback cannot be registered as {expected}")]
    InvalidArgument { expected: HookName, found: HookName },
}

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    detail: Option<serde_json::Value>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a structured payload (e.g. a partial response body).
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&serde_json::Value> {
        self.detail.as_ref()
    }

    pub(crate) fn from_panic(panic: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("transport panicked: {message}"))
    }
}

/// What the fail hooks see and what a rejection carries.
///
/// `Invalid` holds a transport result the validator refused; `Transport`
/// holds the error the transport raised instead of returning a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Failure {
    #[error("result rejected by validator")]
    Invalid(serde_json::Value),

    #[error("transport failed: {0}")]
    Transport(TransportError),
}

impl Failure {
    pub fn is_transport(&self) -> bool {
        matches!(self, Failure::Transport(_))
    }

    /// The refused result, if this is a validation failure.
    pub fn result(&self) -> Option<&serde_json::Value> {
        match self {
            Failure::Invalid(v) => Some(v),
            Failure::Transport(_) => None,
        }
    }
}

/// Error raised by a user-supplied hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Admission queue outcomes other than being granted the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("removed from the queue before being granted")]
    Cancelled,

    #[error("not granted within {0:?}")]
    TimedOut(Duration),
}

/// How a fired call can fail to resolve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FireError {
    /// Transport failure or validator refusal, after `before.reject`.
    #[error("request rejected: {0}")]
    Rejected(Failure),

    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: HookName,
        #[source]
        source: HookError,
    },

    #[error("cancelled while waiting for key {key}")]
    Cancelled { key: Key },

    #[error("gave up after {waited:?} waiting for key {key}")]
    TurnTimeout { key: Key, waited: Duration },
}

impl FireError {
    /// The rejection payload, if the call settled through `before.reject`.
    pub fn rejection(&self) -> Option<&Failure> {
        match self {
            FireError::Rejected(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_from_panic_payloads() {
        let err = TransportError::from_panic(Box::new("boom"));
        assert_eq!(err.message(), "transport panicked: boom");

        let err = TransportError::from_panic(Box::new("kaput".to_string()));
        assert_eq!(err.message(), "transport panicked: kaput");

        let err = TransportError::from_panic(Box::new(17u8));
        assert_eq!(err.message(), "transport panicked: non-string panic payload");
    }

    #[test]
    fn failure_exposes_refused_result() {
        let failure = Failure::Invalid(serde_json::json!({"errorCode": 3}));
        assert!(!failure.is_transport());
        assert_eq!(failure.result(), Some(&serde_json::json!({"errorCode": 3})));

        let failure = Failure::Transport(TransportError::new("reset"));
        assert!(failure.is_transport());
        assert!(failure.result().is_none());
    }

    #[test]
    fn fire_error_display() {
        let err = FireError::Hook {
            hook: HookName::BeforeResolve,
            source: HookError::new("bad shape"),
        };
        assert_eq!(format!("{}", err), "before.resolve hook failed: bad shape");

        let err = FireError::Rejected(Failure::Transport(TransportError::new("refused")));
        assert_eq!(
            format!("{}", err),
            "request rejected: transport failed: refused"
        );

        let err = FireError::Cancelled {
            key: Key::from("orders"),
        };
        assert_eq!(format!("{}", err), "cancelled while waiting for key orders");
    }

    #[test]
    fn registration_error_display() {
        let err = RegistrationError::InvalidArgument {
            expected: HookName::BeforeFire,
            found: HookName::AfterFail,
        };
        assert_eq!(
            format!("{}", err),
            "invalid argument: after.fail callback cannot be registered as before.fire"
        );
    }
}
