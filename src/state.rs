//! Combined license × machine activation state.
//!
//! Transitions are driven only by the outcome of explicit calls:
//!
//! ```text
//! Unvalidated      --validate(ok)--------------> ValidActivated
//! Unvalidated      --validate(NotActivated)----> ValidUnactivated
//! ValidUnactivated --activate(ok)--------------> ValidActivated
//! ValidActivated   --deactivate(ok)------------> ValidUnactivated
//! any              --validate(Expired)---------> Expired
//! any              --network/server error------> (unchanged)
//! ```
//!
//! Other rejections (suspended, invalid, heartbeat dead, ...) return to
//! `Unvalidated`.

use crate::license::License;
use crate::machine::Machine;
use crate::TollgateError;

/// Where an application stands with its license on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    /// No successful validation yet, or the last one was rejected.
    #[default]
    Unvalidated,
    /// License valid, this fingerprint not activated.
    ValidUnactivated,
    /// License valid and activated for this fingerprint.
    ValidActivated,
    /// License expired. Terminal until the next validation.
    Expired,
}

impl ActivationState {
    /// State after a `validate` call.
    pub fn on_validate(self, outcome: &Result<License, TollgateError>) -> Self {
        match outcome {
            Ok(_) => ActivationState::ValidActivated,
            Err(TollgateError::NotActivated(_)) => ActivationState::ValidUnactivated,
            Err(TollgateError::Expired(_)) => ActivationState::Expired,
            Err(e) if e.is_transient() => self,
            Err(_) => ActivationState::Unvalidated,
        }
    }

    /// State after an `activate` call.
    pub fn on_activate(self, outcome: &Result<Machine, TollgateError>) -> Self {
        match (self, outcome) {
            (ActivationState::ValidUnactivated, Ok(_)) => ActivationState::ValidActivated,
            _ => self,
        }
    }

    /// State after a `deactivate` call.
    pub fn on_deactivate(self, outcome: &Result<(), TollgateError>) -> Self {
        match (self, outcome) {
            (ActivationState::ValidActivated, Ok(())) => ActivationState::ValidUnactivated,
            // Already gone on the authority.
            (ActivationState::ValidActivated, Err(TollgateError::NotFound)) => {
                ActivationState::ValidUnactivated
            }
            _ => self,
        }
    }

    /// Whether the licensed features may be used.
    pub fn is_usable(&self) -> bool {
        matches!(self, ActivationState::ValidActivated)
    }
}
