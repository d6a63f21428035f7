//! Transition behaviors
//!
//! Each transition kind gets its own behavior type. The controller owns one
//! behavior per transition and drives it through enablement changes:
//!
//! ```text
//! on_enabled(t0) ──► can_fire(now)? ──► fire(..) ──► on_fired(now)
//!        ▲                                                │
//!        └────────────── on_disabled() ◄──────────────────┘
//! ```
//!
//! Arc checks are done by the controller before a behavior is asked; a
//! behavior only answers whether its timing allows firing. Every kind answers
//! `false` until `on_enabled` arms it, so nothing is fireable before the
//! controller's first sync.

mod continuous;
mod immediate;
mod stochastic;
mod timed;

pub use continuous::ContinuousBehavior;
pub use immediate::ImmediateBehavior;
pub use stochastic::StochasticBehavior;
pub use timed::TimedBehavior;

use petriflow_core::arc::consumes_tokens;
use petriflow_core::{
    CompiledRate, EvalContext, NetView, NoiseBank, PlaceId, ResolvedArc, Result, SimRng,
    Transition, TransitionId, TransitionKind, TOKEN_EPSILON,
};
use std::fmt;

/// Snapshot of a behavior's scheduling state
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleState {
    /// Not enabled, nothing scheduled
    Idle,
    /// Enabled immediate transition
    Ready { enabled_at: f64 },
    /// Timed transition waiting for its window
    Armed {
        enabled_at: f64,
        due_at: f64,
        window_end: Option<f64>,
    },
    /// Stochastic transition with a sampled firing time
    Sampled {
        enabled_at: f64,
        fire_at: f64,
        burst: u32,
    },
    /// Continuous transition flowing since `enabled_at`
    Flowing { enabled_at: f64 },
}

/// What a firing did
#[derive(Debug, Clone, PartialEq)]
pub struct FireOutcome {
    pub fired: bool,
    pub details: String,
    pub consumed: Vec<(PlaceId, f64)>,
    pub produced: Vec<(PlaceId, f64)>,
}

impl FireOutcome {
    /// A firing that did not happen
    pub fn refused(details: impl Into<String>) -> Self {
        Self {
            fired: false,
            details: details.into(),
            consumed: Vec::new(),
            produced: Vec::new(),
        }
    }

    /// Split into the `(fired, details)` pair reported to callers
    pub fn into_pair(self) -> (bool, String) {
        (self.fired, self.details)
    }
}

/// Everything a behavior may read when it (re)arms
pub struct BehaviorEnv<'a> {
    pub transition: &'a TransitionId,
    pub rate: &'a CompiledRate,
    pub marking: &'a [f64],
    pub rng: &'a mut SimRng,
    pub noise: &'a mut NoiseBank,
}

impl BehaviorEnv<'_> {
    /// Evaluate the transition's rate at `time`
    pub fn eval_rate(&mut self, time: f64) -> Result<f64> {
        let mut ctx =
            EvalContext::new(self.marking, time).with_noise(&mut *self.noise, self.transition);
        self.rate.eval(&mut ctx)
    }
}

/// Per-kind firing rules and scheduling state
pub trait TransitionBehavior: Send + fmt::Debug {
    /// Transition kind this behavior implements
    fn kind(&self) -> TransitionKind;

    /// Whether timing allows firing at `now`, with a reason either way
    fn can_fire(&self, now: f64) -> (bool, String);

    /// Move tokens along the given arcs
    fn fire(
        &mut self,
        net: &mut dyn NetView,
        inputs: &[ResolvedArc],
        outputs: &[ResolvedArc],
    ) -> Result<FireOutcome>;

    /// The transition's input arcs became satisfied at `now`
    fn on_enabled(&mut self, now: f64, env: &mut BehaviorEnv<'_>) -> Result<()>;

    /// The transition's input arcs stopped being satisfied
    fn on_disabled(&mut self);

    /// The transition fired at `now`; re-arm from the firing time
    fn on_fired(&mut self, now: f64, env: &mut BehaviorEnv<'_>) -> Result<()>;

    /// Earliest time at which the behavior expects to fire
    fn next_due(&self) -> Option<f64>;

    /// Current scheduling state
    fn schedule(&self) -> ScheduleState;

    /// Return to the post-construction state
    fn reset(&mut self);
}

/// Build the behavior for a transition's kind
pub fn behavior_for(transition: &Transition) -> Box<dyn TransitionBehavior> {
    match transition.kind {
        TransitionKind::Immediate => Box::new(ImmediateBehavior::new()),
        TransitionKind::Timed => Box::new(TimedBehavior::new(
            transition.earliest_delay,
            transition.latest_delay,
        )),
        TransitionKind::Stochastic => Box::new(StochasticBehavior::new(
            transition.is_source,
            transition.max_burst,
        )),
        TransitionKind::Continuous => Box::new(ContinuousBehavior::new()),
    }
}

/// Discrete token transfer: consume on normal input arcs, produce `multiplier × weight`
///
/// Nothing is written unless every consuming arc can be satisfied.
pub(crate) fn transfer(
    net: &mut dyn NetView,
    inputs: &[ResolvedArc],
    outputs: &[ResolvedArc],
    multiplier: f64,
) -> Result<FireOutcome> {
    let mut consumed: Vec<(PlaceId, f64)> = Vec::new();
    for arc in inputs.iter().filter(|a| consumes_tokens(a)) {
        match consumed.iter_mut().find(|(place, _)| *place == arc.place) {
            Some((_, amount)) => *amount += arc.weight,
            None => consumed.push((arc.place.clone(), arc.weight)),
        }
    }
    for (place, amount) in &consumed {
        let tokens = net.place_tokens(place)?;
        if tokens + TOKEN_EPSILON < *amount {
            return Ok(FireOutcome::refused(format!(
                "{} has {} < {} tokens to consume",
                place, tokens, amount
            )));
        }
    }

    for (place, amount) in &consumed {
        let tokens = net.place_tokens(place)?;
        net.set_tokens(place, (tokens - amount).max(0.0))?;
    }
    let mut produced = Vec::with_capacity(outputs.len());
    for arc in outputs {
        let amount = arc.weight * multiplier;
        let tokens = net.place_tokens(&arc.place)?;
        net.set_tokens(&arc.place, tokens + amount)?;
        produced.push((arc.place.clone(), amount));
    }

    let details = format!(
        "consumed [{}] produced [{}]",
        describe(&consumed),
        describe(&produced)
    );
    Ok(FireOutcome {
        fired: true,
        details,
        consumed,
        produced,
    })
}

fn describe(moves: &[(PlaceId, f64)]) -> String {
    moves
        .iter()
        .map(|(place, amount)| format!("{}:{}", place, amount))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::BehaviorEnv;
    use petriflow_core::{
        Arc, CompiledRate, Net, NetView, NoiseBank, Place, ResolvedArc, SimRng, Transition,
        TransitionId,
    };

    /// Owned pieces of a [`BehaviorEnv`]
    pub struct EnvParts {
        pub id: TransitionId,
        pub rate: CompiledRate,
        pub marking: Vec<f64>,
        pub rng: SimRng,
        pub noise: NoiseBank,
    }

    impl EnvParts {
        pub fn new(rate: f64, seed: u64) -> Self {
            Self {
                id: TransitionId::new("T1"),
                rate: CompiledRate::Constant(rate),
                marking: Vec::new(),
                rng: SimRng::new(seed),
                noise: NoiseBank::new(seed),
            }
        }

        pub fn env(&mut self) -> BehaviorEnv<'_> {
            BehaviorEnv {
                transition: &self.id,
                rate: &self.rate,
                marking: &self.marking,
                rng: &mut self.rng,
                noise: &mut self.noise,
            }
        }
    }

    /// `P1(tokens) -> T1 -> P2(0)` with the given transition as T1
    pub fn chain(
        transition: Transition,
        tokens: f64,
    ) -> (Net, Vec<ResolvedArc>, Vec<ResolvedArc>) {
        let mut net = Net::new();
        net.add_place(Place::new("P1", tokens)).unwrap();
        net.add_place(Place::new("P2", 0.0)).unwrap();
        net.add_transition(transition).unwrap();
        net.add_arc(Arc::new("A1", "P1", "T1")).unwrap();
        net.add_arc(Arc::new("A2", "T1", "P2")).unwrap();
        let t1 = TransitionId::new("T1");
        let inputs = net.input_arcs(&t1).unwrap();
        let outputs = net.output_arcs(&t1).unwrap();
        (net, inputs, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::chain;
    use super::*;
    use petriflow_core::{Arc, Net, Place, Transition};

    #[test]
    fn test_transfer_conserves_tokens() {
        let (mut net, inputs, outputs) = chain(Transition::immediate("T1"), 3.0);
        let outcome = transfer(&mut net, &inputs, &outputs, 1.0).unwrap();
        assert!(outcome.fired);
        assert_eq!(net.marking(), vec![2.0, 1.0]);
        assert_eq!(outcome.details, "consumed [P1:1] produced [P2:1]");
    }

    #[test]
    fn test_transfer_refuses_without_writing() {
        let (mut net, inputs, outputs) = chain(Transition::immediate("T1"), 0.0);
        let outcome = transfer(&mut net, &inputs, &outputs, 1.0).unwrap();
        assert!(!outcome.fired);
        assert_eq!(net.marking(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_guard_arcs_are_not_consumed() {
        let mut net = Net::new();
        net.add_place(Place::new("P1", 1.0)).unwrap();
        net.add_place(Place::new("G", 2.0)).unwrap();
        net.add_place(Place::new("P2", 0.0)).unwrap();
        net.add_transition(Transition::immediate("T1")).unwrap();
        net.add_arc(Arc::new("A1", "P1", "T1")).unwrap();
        net.add_arc(
            Arc::new("A2", "G", "T1")
                .with_kind(petriflow_core::ArcKind::Test)
                .with_weight(2.0),
        )
        .unwrap();
        net.add_arc(Arc::new("A3", "T1", "P2")).unwrap();
        let t1 = TransitionId::new("T1");
        let inputs = net.input_arcs(&t1).unwrap();
        let outputs = net.output_arcs(&t1).unwrap();

        transfer(&mut net, &inputs, &outputs, 1.0).unwrap();
        assert_eq!(net.marking(), vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_factory_follows_kind() {
        let kinds = [
            Transition::immediate("T1"),
            Transition::timed("T2", 1.0, None),
            Transition::stochastic("T3", 2.0),
            Transition::continuous("T4", 0.5),
        ];
        for transition in &kinds {
            let behavior = behavior_for(transition);
            assert_eq!(behavior.kind(), transition.kind);
            assert_eq!(behavior.schedule(), ScheduleState::Idle);
        }
    }
}
