//! Supervisor state and legal transitions.

use serde::{Deserialize, Serialize};

/// Supervisor state of the interlock.
///
/// ```text
/// Initial ──► StartupTest ──► NormalOperation
///    │             │                │
///    │ critical    │ tests failed   │ critical fault
///    ▼             ▼                ▼
///            SafeState (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsiState {
    /// Boot state.
    Initial,
    /// Startup test sequence running.
    StartupTest,
    /// Mediating traffic.
    NormalOperation,
    /// Terminal safe state; only CM-bound traffic is generated.
    SafeState,
}

impl AsiState {
    /// Stable storage code.
    pub fn code(self) -> u8 {
        match self {
            AsiState::Initial => 0,
            AsiState::StartupTest => 1,
            AsiState::NormalOperation => 2,
            AsiState::SafeState => 3,
        }
    }

    /// Decode a storage code; unknown codes fall back to `SafeState`,
    /// the only state that is safe to assume.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AsiState::Initial,
            1 => AsiState::StartupTest,
            2 => AsiState::NormalOperation,
            _ => AsiState::SafeState,
        }
    }

    /// Whether `from → to` is a declared transition.
    ///
    /// Self-transitions are legal everywhere (a tick that changes
    /// nothing); everything else follows the table.
    pub fn transition_allowed(from: AsiState, to: AsiState) -> bool {
        if from == to {
            return true;
        }
        matches!(
            (from, to),
            (AsiState::Initial, AsiState::StartupTest)
                | (AsiState::Initial, AsiState::SafeState)
                | (AsiState::StartupTest, AsiState::NormalOperation)
                | (AsiState::StartupTest, AsiState::SafeState)
                | (AsiState::NormalOperation, AsiState::SafeState)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_transitions_allowed() {
        use AsiState::*;
        assert!(AsiState::transition_allowed(Initial, StartupTest));
        assert!(AsiState::transition_allowed(Initial, SafeState));
        assert!(AsiState::transition_allowed(StartupTest, NormalOperation));
        assert!(AsiState::transition_allowed(StartupTest, SafeState));
        assert!(AsiState::transition_allowed(NormalOperation, SafeState));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        use AsiState::*;
        assert!(!AsiState::transition_allowed(SafeState, NormalOperation));
        assert!(!AsiState::transition_allowed(SafeState, Initial));
        assert!(!AsiState::transition_allowed(SafeState, StartupTest));
        assert!(!AsiState::transition_allowed(NormalOperation, StartupTest));
        assert!(!AsiState::transition_allowed(NormalOperation, Initial));
        assert!(!AsiState::transition_allowed(StartupTest, Initial));
        assert!(!AsiState::transition_allowed(Initial, NormalOperation));
    }

    #[test]
    fn test_safe_state_is_terminal_except_self() {
        use AsiState::*;
        assert!(AsiState::transition_allowed(SafeState, SafeState));
        for to in [Initial, StartupTest, NormalOperation] {
            assert!(!AsiState::transition_allowed(SafeState, to));
        }
    }

    #[test]
    fn test_codes_round_trip() {
        use AsiState::*;
        for state in [Initial, StartupTest, NormalOperation, SafeState] {
            assert_eq!(AsiState::from_code(state.code()), state);
        }
        assert_eq!(AsiState::from_code(200), SafeState);
    }
}
