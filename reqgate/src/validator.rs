//! Success/failure validation of transport results.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub type ValidatorFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Decides whether a transport result counts as success.
#[derive(Clone)]
pub struct Validator(Arc<ValidatorFn>);

impl Validator {
    pub fn new(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, result: &Value) -> bool {
        (self.0)(result)
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Which validator the registry will consult.
///
/// `Bootstrap` and `Cleared` are deliberately different: a fresh registry
/// accepts every result, while one whose validator was explicitly cleared
/// refuses every result until a new one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorState {
    /// Initial always-succeed validator.
    Bootstrap,
    /// Installed by the host application.
    Custom,
    /// Explicitly removed; fail-closed.
    Cleared,
}

#[derive(Debug, Clone)]
pub(crate) enum ValidatorSlot {
    Bootstrap,
    Custom(Validator),
    Cleared,
}

impl ValidatorSlot {
    pub(crate) fn state(&self) -> ValidatorState {
        match self {
            Self::Bootstrap => ValidatorState::Bootstrap,
            Self::Custom(_) => ValidatorState::Custom,
            Self::Cleared => ValidatorState::Cleared,
        }
    }

    pub(crate) fn validator(&self) -> Option<Validator> {
        match self {
            Self::Bootstrap => Some(Validator::new(|_| true)),
            Self::Custom(v) => Some(v.clone()),
            Self::Cleared => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validator_checks_result() {
        let no_error_code = Validator::new(|r| r.get("errorCode").is_none());
        assert!(no_error_code.check(&json!({"data": 1})));
        assert!(!no_error_code.check(&json!({"errorCode": 500})));
    }

    #[test]
    fn slot_states() {
        assert_eq!(ValidatorSlot::Bootstrap.state(), ValidatorState::Bootstrap);
        assert!(ValidatorSlot::Bootstrap.validator().unwrap().check(&json!(null)));

        let custom = ValidatorSlot::Custom(Validator::new(|_| false));
        assert_eq!(custom.state(), ValidatorState::Custom);
        assert!(!custom.validator().unwrap().check(&json!(null)));

        assert_eq!(ValidatorSlot::Cleared.state(), ValidatorState::Cleared);
        assert!(ValidatorSlot::Cleared.validator().is_none());
    }
}
