//! Non-fatal findings collected during a run

use petriflow_core::TransitionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A modeling inconsistency surfaced without stopping the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A continuous rate evaluated negative and was treated as zero flow
    NegativeRate {
        transition: TransitionId,
        rate: f64,
        time: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NegativeRate {
                transition,
                rate,
                time,
            } => write!(
                f,
                "t={}: continuous transition {} has negative rate {}, no flow applied",
                time, transition, rate
            ),
        }
    }
}
