//! Error types for petriflow-engine

use petriflow_core::TransitionId;
use thiserror::Error;

/// Result type for petriflow-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a net
#[derive(Debug, Error)]
pub enum Error {
    /// Zero-time steps kept repeating past the configured limit
    ///
    /// `transitions` lists every transition that fired during the streak, in
    /// first-fired order.
    #[error(
        "livelock detected at t={time}: {steps} consecutive zero-time steps involving {}",
        join_ids(.transitions)
    )]
    LivelockDetected {
        steps: usize,
        time: f64,
        transitions: Vec<TransitionId>,
    },

    /// A continuous rate evaluated negative under the halting policy
    #[error("negative rate {rate} for continuous transition {transition} at t={time}")]
    NegativeRate {
        transition: TransitionId,
        rate: f64,
        time: f64,
    },

    /// The controller stopped after an earlier fatal error; reset to continue
    #[error("controller is halted: {reason}")]
    Halted { reason: String },

    /// Step sizes must be positive and finite
    #[error("invalid step size {0}")]
    InvalidStep(f64),

    /// A firing the controller had already cleared was refused
    #[error("internal error: {0}")]
    Internal(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] petriflow_core::Error),
}

impl Error {
    /// Whether this error ends the run until the next reset
    pub fn halts_run(&self) -> bool {
        match self {
            Error::LivelockDetected { .. }
            | Error::NegativeRate { .. }
            | Error::Halted { .. }
            | Error::Internal(_) => true,
            Error::Core(petriflow_core::Error::DanglingReference { .. }) => true,
            Error::Core(_) | Error::InvalidStep(_) => false,
        }
    }
}

fn join_ids(ids: &[TransitionId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// Error must stay Send + Sync
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_livelock_message_names_transitions() {
        let err = Error::LivelockDetected {
            steps: 1001,
            time: 0.0,
            transitions: vec![TransitionId::new("T1"), TransitionId::new("T2")],
        };
        let message = err.to_string();
        assert!(message.contains("1001"));
        assert!(message.contains("T1, T2"));
        assert!(err.halts_run());
    }

    #[test]
    fn test_rate_errors_do_not_halt() {
        let err: Error = petriflow_core::Error::rate("k * S", "unknown identifier 'k'").into();
        assert!(!err.halts_run());

        let err: Error = petriflow_core::Error::DanglingReference {
            arc: "A1".to_string(),
            endpoint: "target",
            id: "P9".to_string(),
        }
        .into();
        assert!(err.halts_run());
    }
}
