//! State machine trait for status enums.
//!
//! Provides a consistent interface for validating and performing state
//! transitions across entity lifecycle statuses.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for SubscriptionStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!(
///             (self, target),
///             (PendingPayment, Active) |
///             (Active, Suspended) |
///             // ... etc
///         )
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             PendingPayment => vec![Active, Expired],
///             // ... etc
///         }
///     }
/// }
///
/// // Usage:
/// let new_status = current_status.transition_to(SubscriptionStatus::Active)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    ///
    /// This is the preferred way to change state, as it ensures
    /// the transition is valid according to the state machine rules.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small sample machine mirroring a payout batch lifecycle
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum BatchStatus {
        Draft,
        Submitted,
        Settled,
        Void,
    }

    impl StateMachine for BatchStatus {
        fn can_transition_to(&self, target: &Self) -> bool {
            use BatchStatus::*;
            matches!(
                (self, target),
                (Draft, Submitted) | (Submitted, Settled) | (Submitted, Void) | (Draft, Void)
            )
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use BatchStatus::*;
            match self {
                Draft => vec![Submitted, Void],
                Submitted => vec![Settled, Void],
                Settled => vec![],
                Void => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        let status = BatchStatus::Draft;
        let result = status.transition_to(BatchStatus::Submitted);
        assert_eq!(result, Ok(BatchStatus::Submitted));
    }

    #[test]
    fn transition_to_fails_for_invalid_transition() {
        let status = BatchStatus::Draft;
        let result = status.transition_to(BatchStatus::Settled);
        assert!(result.is_err());
    }

    #[test]
    fn is_terminal_returns_true_for_settled_and_void() {
        assert!(BatchStatus::Settled.is_terminal());
        assert!(BatchStatus::Void.is_terminal());
    }

    #[test]
    fn is_terminal_returns_false_for_non_terminal() {
        assert!(!BatchStatus::Draft.is_terminal());
        assert!(!BatchStatus::Submitted.is_terminal());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [
            BatchStatus::Draft,
            BatchStatus::Submitted,
            BatchStatus::Settled,
            BatchStatus::Void,
        ] {
            for valid_target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&valid_target),
                    "can_transition_to should return true for {:?} -> {:?}",
                    status,
                    valid_target
                );
            }
        }
    }
}
