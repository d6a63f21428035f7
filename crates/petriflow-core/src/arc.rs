//! Arc semantics: enablement and consumption rules per arc kind
//!
//! Every check here is pure. Callers pass the token amount of the connected
//! place, so the same rules apply to the live net and to intermediate
//! integrator states.

use crate::net::TOKEN_EPSILON;
use crate::{ArcKind, Place, ResolvedArc};

/// Outcome of an enablement check with a human-readable explanation
#[derive(Debug, Clone, PartialEq)]
pub struct Enablement {
    pub enabled: bool,
    pub reason: String,
}

impl Enablement {
    fn enabled(reason: impl Into<String>) -> Self {
        Self {
            enabled: true,
            reason: reason.into(),
        }
    }

    fn blocked(reason: String) -> Self {
        Self {
            enabled: false,
            reason,
        }
    }

    /// Split into the `(enabled, reason)` pair reported to callers
    pub fn into_pair(self) -> (bool, String) {
        (self.enabled, self.reason)
    }
}

/// Whether an input arc is satisfied by the connected place
pub fn is_input_satisfied(arc: &ResolvedArc, place: &Place) -> bool {
    check_input(arc, place.tokens).0
}

/// Whether firing moves tokens through this arc
pub fn consumes_tokens(arc: &ResolvedArc) -> bool {
    arc.kind.consumes_tokens()
}

/// Check an input arc for a discrete transition
pub fn check_input(arc: &ResolvedArc, tokens: f64) -> (bool, String) {
    match arc.kind {
        ArcKind::Normal => {
            let required = arc.effective_threshold();
            if tokens + TOKEN_EPSILON >= required {
                (true, String::new())
            } else {
                (
                    false,
                    format!("{} has {} < {} tokens required", arc.place, tokens, required),
                )
            }
        }
        ArcKind::Inhibitor => {
            if tokens + TOKEN_EPSILON < arc.weight {
                (true, String::new())
            } else {
                (
                    false,
                    format!(
                        "{} has {} >= {} tokens (inhibitor {})",
                        arc.place, tokens, arc.weight, arc.arc
                    ),
                )
            }
        }
        ArcKind::Test => {
            if tokens + TOKEN_EPSILON >= arc.weight {
                (true, String::new())
            } else {
                (
                    false,
                    format!(
                        "{} has {} < {} tokens required (test arc {})",
                        arc.place, tokens, arc.weight, arc.arc
                    ),
                )
            }
        }
    }
}

/// Check an input arc for a continuous transition
///
/// Flow is proportional, so a normal arc only needs a positive amount unless
/// an explicit threshold is set. Guard arcs keep their discrete meaning.
pub fn check_flow_input(arc: &ResolvedArc, tokens: f64) -> (bool, String) {
    match (arc.kind, arc.threshold) {
        (ArcKind::Normal, None) => {
            if tokens > TOKEN_EPSILON {
                (true, String::new())
            } else {
                (false, format!("{} is empty", arc.place))
            }
        }
        _ => check_input(arc, tokens),
    }
}

/// Evaluate all input arcs of a transition against a marking vector (AND semantics)
pub fn enablement(inputs: &[ResolvedArc], marking: &[f64], flow: bool) -> Enablement {
    if inputs.is_empty() {
        return Enablement::enabled("source transition");
    }
    for arc in inputs {
        let tokens = marking.get(arc.place_index).copied().unwrap_or(0.0);
        let (ok, reason) = if flow {
            check_flow_input(arc, tokens)
        } else {
            check_input(arc, tokens)
        };
        if !ok {
            return Enablement::blocked(reason);
        }
    }
    if !flow {
        if let Some(reason) = check_combined_demand(inputs, marking) {
            return Enablement::blocked(reason);
        }
    }
    Enablement::enabled("all input arcs satisfied")
}

/// Parallel normal arcs from one place consume their summed weight on firing,
/// so the place must hold the total and not just each arc's share.
fn check_combined_demand(inputs: &[ResolvedArc], marking: &[f64]) -> Option<String> {
    let mut demand: Vec<(usize, f64)> = Vec::new();
    for arc in inputs.iter().filter(|a| consumes_tokens(a)) {
        match demand.iter_mut().find(|(index, _)| *index == arc.place_index) {
            Some((_, total)) => *total += arc.weight,
            None => demand.push((arc.place_index, arc.weight)),
        }
    }
    demand.into_iter().find_map(|(index, total)| {
        let tokens = marking.get(index).copied().unwrap_or(0.0);
        if tokens + TOKEN_EPSILON >= total {
            return None;
        }
        let place = inputs
            .iter()
            .find(|a| a.place_index == index)
            .map(|a| a.place.to_string())
            .unwrap_or_default();
        Some(format!(
            "{} has {} < {} tokens required across parallel arcs",
            place, tokens, total
        ))
    })
}
