//! Session lifecycle states.

use serde::Serialize;

/// Where a session is in its current `fire`.
///
/// Progress is linear: `Created → Queued → AwaitingTurn → Executing →
/// Validating → Settling → Released`, then one terminal outcome. Failures
/// before the transport runs skip straight to `Released`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    #[default]
    Created,
    Queued,
    AwaitingTurn,
    Executing,
    Validating,
    Settling,
    Released,
    Resolved,
    Rejected,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::AwaitingTurn => "awaiting_turn",
            Self::Executing => "executing",
            Self::Validating => "validating",
            Self::Settling => "settling",
            Self::Released => "released",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_created() {
        assert_eq!(SessionState::default(), SessionState::Created);
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionState::Created.is_terminal());
        assert!(!SessionState::AwaitingTurn.is_terminal());
        assert!(!SessionState::Released.is_terminal());
        assert!(SessionState::Resolved.is_terminal());
        assert!(SessionState::Rejected.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }

    #[test]
    fn session_state_serializes_screaming_snake_case() {
        insta::assert_json_snapshot!(
            "session_state_all_variants",
            [
                SessionState::Created,
                SessionState::Queued,
                SessionState::AwaitingTurn,
                SessionState::Executing,
                SessionState::Validating,
                SessionState::Settling,
                SessionState::Released,
                SessionState::Resolved,
                SessionState::Rejected,
                SessionState::Cancelled,
            ]
        );
    }
}
