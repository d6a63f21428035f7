//! Simulation controller
//!
//! The controller owns a net and drives it one synchronous step at a time.
//! A step:
//!
//! 1. re-resolves every transition's arcs and recomputes enablement, calling
//!    `on_enabled` / `on_disabled` on behaviors whose state changed
//! 2. asks the conflict resolver for one discrete winner among the
//!    transitions whose behavior can fire, fires it and re-synchronizes
//! 3. integrates all enabled continuous transitions over the step interval
//! 4. advances time, records token traces and checks for livelock
//!
//! A step whose winner is immediate takes zero time. Too many zero-time steps
//! in a row means the net is cycling through immediate transitions, which is
//! reported as livelock.

use crate::behavior::{BehaviorEnv, ScheduleState, TransitionBehavior};
use crate::conflict::{Candidate, ConflictResolver};
use crate::integrator::{Flow, FlowField};
use crate::trace::{TokenTrace, TraceRecorder};
use crate::{behavior_for, Diagnostic, EngineConfig, Error, Result, TimeMode};
use indexmap::IndexMap;
use petriflow_core::arc::enablement;
use petriflow_core::{
    check_token_value, hash_str, mix_seed, CompiledRate, Net, NetView, NoiseBank, PlaceId,
    PlaceKind, ResolvedArc, SimRng, TransitionId, TransitionKind, TOKEN_EPSILON,
};
use tracing::{debug, info, warn};

/// Lifecycle of a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Constructed or reset, not stepped yet
    Idle,
    /// At least one step has run and more may follow
    Running,
    /// The last step found no enabled transition
    Completed,
    /// A fatal error stopped the run; only `reset` continues
    Halted { reason: String },
}

/// Per-transition runtime state
#[derive(Debug)]
struct Slot {
    behavior: Box<dyn TransitionBehavior>,
    rate: CompiledRate,
    priority: i32,
    inputs: Vec<ResolvedArc>,
    outputs: Vec<ResolvedArc>,
    enabled: bool,
}

/// Steps a hybrid net through time
#[derive(Debug)]
pub struct Controller {
    net: Net,
    config: EngineConfig,
    place_kinds: Vec<PlaceKind>,
    slots: IndexMap<TransitionId, Slot>,
    resolver: Box<dyn ConflictResolver>,
    rng: SimRng,
    noise: NoiseBank,
    time: f64,
    state: RunState,
    zero_time_steps: usize,
    /// Transitions fired during the current zero-time streak
    streak: Vec<TransitionId>,
    last_fired: Option<TransitionId>,
    fired: IndexMap<TransitionId, u64>,
    diagnostics: Vec<Diagnostic>,
    traces: TraceRecorder,
}

impl Controller {
    /// Validate the net and prepare a run at `t = 0`
    pub fn new(net: Net, config: EngineConfig) -> Result<Self> {
        net.validate()?;

        let mut slots = IndexMap::new();
        for transition in net.transitions() {
            // a transition without input arcs is a source even when not flagged
            let mut shape = transition.clone();
            shape.is_source |= net.input_arcs(&transition.id)?.is_empty();
            let slot = Slot {
                behavior: behavior_for(&shape),
                rate: transition.rate.compile(&net)?,
                priority: transition.priority,
                inputs: Vec::new(),
                outputs: Vec::new(),
                enabled: false,
            };
            slots.insert(transition.id.clone(), slot);
        }

        let mut traces = TraceRecorder::new(config.trace.clone());
        traces.restart(&net, 0.0);

        info!(
            places = net.place_count(),
            transitions = net.transition_count(),
            policy = config.conflict_policy.resolver().name(),
            seed = config.seed,
            "controller ready"
        );

        Ok(Self {
            place_kinds: net.place_kinds(),
            resolver: config.conflict_policy.resolver(),
            rng: SimRng::new(config.seed),
            noise: NoiseBank::new(noise_seed(config.seed)),
            time: 0.0,
            state: RunState::Idle,
            zero_time_steps: 0,
            streak: Vec::new(),
            last_fired: None,
            fired: IndexMap::new(),
            diagnostics: Vec::new(),
            traces,
            slots,
            net,
            config,
        })
    }

    /// Restore the initial marking and every piece of run state
    pub fn reset(&mut self) {
        self.net.reset_tokens();
        for slot in self.slots.values_mut() {
            slot.behavior.reset();
            slot.inputs.clear();
            slot.outputs.clear();
            slot.enabled = false;
        }
        self.resolver.reset();
        self.rng = SimRng::new(self.config.seed);
        self.noise.reset_all();
        self.time = 0.0;
        self.state = RunState::Idle;
        self.zero_time_steps = 0;
        self.streak.clear();
        self.last_fired = None;
        self.fired.clear();
        self.diagnostics.clear();
        self.traces.restart(&self.net, 0.0);
        info!(seed = self.config.seed, "controller reset");
    }

    /// Run one step of at most `dt`
    ///
    /// Returns `Ok(false)` when no transition is enabled. A completed run can
    /// be stepped again, for example after `set_tokens`; a halted run cannot.
    pub fn step(&mut self, dt: f64) -> Result<bool> {
        if let RunState::Halted { reason } = &self.state {
            return Err(Error::Halted {
                reason: reason.clone(),
            });
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::InvalidStep(dt));
        }

        self.state = RunState::Running;
        let result = self.advance(dt);
        match &result {
            Ok(true) => {}
            Ok(false) => {
                debug!(time = self.time, "no transition enabled");
                self.state = RunState::Completed;
            }
            Err(err) if err.halts_run() => {
                warn!(time = self.time, error = %err, "run halted");
                self.state = RunState::Halted {
                    reason: err.to_string(),
                };
            }
            Err(_) => {}
        }
        result
    }

    /// Step until `t_end` or until nothing is enabled; returns the number of steps taken
    pub fn run_until(&mut self, t_end: f64, dt: f64) -> Result<usize> {
        let mut steps = 0;
        while self.time + TOKEN_EPSILON < t_end {
            let remaining = t_end - self.time;
            if !self.step(dt.min(remaining))? {
                break;
            }
            steps += 1;
        }
        Ok(steps)
    }

    /// Whether a transition could fire right now, with the reason
    ///
    /// Read-only: unknown ids and unresolvable arcs are reported as `false`.
    pub fn can_fire(&self, id: &TransitionId) -> (bool, String) {
        let slot = match self.slots.get(id) {
            Some(slot) => slot,
            None => return (false, format!("unknown transition {}", id)),
        };
        if let RunState::Halted { reason } = &self.state {
            return (false, format!("controller is halted: {}", reason));
        }
        let inputs = match self.net.input_arcs(id) {
            Ok(inputs) => inputs,
            Err(err) => return (false, err.to_string()),
        };
        let flow = slot.behavior.kind() == TransitionKind::Continuous;
        let check = enablement(&inputs, &self.net.marking(), flow);
        if !check.enabled {
            return (false, check.reason);
        }
        slot.behavior.can_fire(self.time)
    }

    /// Overwrite a place's tokens between steps
    pub fn set_tokens(&mut self, place: &PlaceId, value: f64) -> Result<()> {
        check_token_value(place, value)?;
        let index = self
            .net
            .place_index(place)
            .ok_or_else(|| petriflow_core::Error::PlaceNotFound(place.to_string()))?;
        if self.place_kinds.get(index) == Some(&PlaceKind::Discrete) && value.fract() != 0.0 {
            return Err(petriflow_core::Error::InvalidTokens {
                place: place.to_string(),
                value,
                reason: "discrete places hold whole tokens".to_string(),
            }
            .into());
        }
        self.net.set_tokens(place, value)?;
        Ok(())
    }

    /// Current simulated time
    pub fn get_time(&self) -> f64 {
        self.time
    }

    /// `(time, tokens)` samples of a place; empty for unknown places or with tracing off
    pub fn get_token_trace(&self, place: &PlaceId) -> Vec<(f64, f64)> {
        self.traces
            .get(place)
            .map(TokenTrace::to_vec)
            .unwrap_or_default()
    }

    /// Trace of a place
    pub fn token_trace(&self, place: &PlaceId) -> Option<&TokenTrace> {
        self.traces.get(place)
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Non-fatal findings since the last reset
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// How often a transition has fired since the last reset
    pub fn fired_count(&self, id: &TransitionId) -> u64 {
        self.fired.get(id).copied().unwrap_or(0)
    }

    /// Transition fired by the most recent step
    pub fn last_fired(&self) -> Option<&TransitionId> {
        self.last_fired.as_ref()
    }

    /// Scheduling state of a transition's behavior
    pub fn behavior_schedule(&self, id: &TransitionId) -> Option<ScheduleState> {
        self.slots.get(id).map(|slot| slot.behavior.schedule())
    }

    /// Transitions whose input arcs were satisfied at the last synchronization
    pub fn enabled_transitions(&self) -> Vec<&TransitionId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.enabled)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn net(&self) -> &Net {
        &self.net
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Discrete or continuous classification of every place
    pub fn place_kinds(&self) -> &[PlaceKind] {
        &self.place_kinds
    }

    fn advance(&mut self, dt: f64) -> Result<bool> {
        self.last_fired = None;
        self.sync()?;
        if !self.slots.values().any(|slot| slot.enabled) {
            return Ok(false);
        }

        let winner = self.select_winner();
        let mut interval = dt;
        if let Some(id) = &winner {
            if self.fire(id)? == TransitionKind::Immediate {
                interval = 0.0;
            }
            self.sync()?;
        }

        if interval > 0.0 && self.config.time_mode == TimeMode::NextEvent {
            if let Some(due) = self.next_due() {
                interval = interval.min(due - self.time);
            }
        }

        if interval > 0.0 {
            self.integrate(interval)?;
            self.time += interval;
        }
        self.traces.record(&self.net, self.time);
        self.track_livelock(interval, winner)?;
        Ok(true)
    }

    /// Recompute enablement and notify behaviors of changes
    fn sync(&mut self) -> Result<()> {
        let marking = self.net.marking();
        let time = self.time;
        for (id, slot) in self.slots.iter_mut() {
            slot.inputs = self.net.input_arcs(id)?;
            slot.outputs = self.net.output_arcs(id)?;
            let flow = slot.behavior.kind() == TransitionKind::Continuous;
            let check = enablement(&slot.inputs, &marking, flow);
            match (check.enabled, slot.enabled) {
                (true, false) => {
                    let mut env = BehaviorEnv {
                        transition: id,
                        rate: &slot.rate,
                        marking: &marking,
                        rng: &mut self.rng,
                        noise: &mut self.noise,
                    };
                    slot.behavior.on_enabled(time, &mut env)?;
                    debug!(transition = %id, time, schedule = ?slot.behavior.schedule(), "enabled");
                }
                (false, true) => {
                    slot.behavior.on_disabled();
                    debug!(transition = %id, time, reason = %check.reason, "disabled");
                }
                _ => {}
            }
            slot.enabled = check.enabled;
        }
        Ok(())
    }

    fn select_winner(&mut self) -> Option<TransitionId> {
        let time = self.time;
        let candidates: Vec<Candidate<'_>> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, (_, slot))| {
                slot.enabled
                    && slot.behavior.kind().is_discrete()
                    && slot.behavior.can_fire(time).0
            })
            .map(|(order, (id, slot))| Candidate {
                id,
                kind: slot.behavior.kind(),
                priority: slot.priority,
                order,
            })
            .collect();
        let index = self.resolver.select(&candidates, &mut self.rng)?;
        if candidates.len() > 1 {
            debug!(
                policy = self.resolver.name(),
                candidates = candidates.len(),
                winner = %candidates[index].id,
                "conflict resolved"
            );
        }
        candidates.get(index).map(|c| c.id.clone())
    }

    /// Fire the conflict winner and re-arm its behavior
    fn fire(&mut self, id: &TransitionId) -> Result<TransitionKind> {
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| Error::Internal(format!("winner {} has no behavior", id)))?;
        let outcome = slot
            .behavior
            .fire(&mut self.net, &slot.inputs, &slot.outputs)?;
        if !outcome.fired {
            debug_assert!(
                outcome.fired,
                "winner {} refused to fire: {}",
                id, outcome.details
            );
            return Err(Error::Internal(format!(
                "winner {} refused to fire: {}",
                id, outcome.details
            )));
        }
        debug!(transition = %id, time = self.time, details = %outcome.details, "fired");

        *self.fired.entry(id.clone()).or_insert(0) += 1;
        self.last_fired = Some(id.clone());

        let marking = self.net.marking();
        let mut env = BehaviorEnv {
            transition: id,
            rate: &slot.rate,
            marking: &marking,
            rng: &mut self.rng,
            noise: &mut self.noise,
        };
        slot.behavior.on_fired(self.time, &mut env)?;
        Ok(slot.behavior.kind())
    }

    /// Earliest future time a behavior expects to fire
    fn next_due(&self) -> Option<f64> {
        self.slots
            .values()
            .filter(|slot| slot.enabled)
            .filter_map(|slot| slot.behavior.next_due())
            .filter(|&due| due > self.time + TOKEN_EPSILON)
            .reduce(f64::min)
    }

    /// Integrate all enabled continuous transitions over `dt`
    fn integrate(&mut self, dt: f64) -> Result<()> {
        let flows: Vec<Flow<'_>> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.enabled && slot.behavior.kind() == TransitionKind::Continuous)
            .map(|(id, slot)| Flow {
                id,
                rate: &slot.rate,
                inputs: &slot.inputs,
                outputs: &slot.outputs,
            })
            .collect();
        if flows.is_empty() {
            return Ok(());
        }

        let mut marking = self.net.marking();
        let mut field = FlowField {
            flows,
            noise: &mut self.noise,
            policy: self.config.negative_rate_policy,
            diagnostics: &mut self.diagnostics,
            warned: Vec::new(),
        };
        self.config
            .integrator
            .advance(&mut field, &mut marking, self.time, dt)?;

        for (index, value) in marking.iter_mut().enumerate() {
            if *value < 0.0 {
                let place = self.net.place_at(index).map(|p| p.id.as_str()).unwrap_or("?");
                debug!(place, value = *value, time = self.time, "clamped numerical undershoot");
                *value = 0.0;
            }
        }
        self.net.set_marking(&marking)?;
        Ok(())
    }

    fn track_livelock(&mut self, interval: f64, winner: Option<TransitionId>) -> Result<()> {
        if interval > 0.0 {
            self.zero_time_steps = 0;
            self.streak.clear();
            return Ok(());
        }

        self.zero_time_steps += 1;
        if let Some(id) = winner {
            if !self.streak.contains(&id) {
                self.streak.push(id);
            }
        }
        if self.zero_time_steps > self.config.livelock_limit {
            warn!(
                time = self.time,
                steps = self.zero_time_steps,
                transitions = self.streak.len(),
                "livelock detected"
            );
            return Err(Error::LivelockDetected {
                steps: self.zero_time_steps,
                time: self.time,
                transitions: self.streak.clone(),
            });
        }
        Ok(())
    }
}

/// Noise processes draw from their own stream so adding a `wiener` term
/// does not shift sojourn samples
fn noise_seed(seed: u64) -> u64 {
    mix_seed(seed, hash_str("wiener"), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConflictPolicy, IntegratorKind, NegativeRatePolicy};
    use petriflow_core::{Arc, ArcKind, Place, Transition};

    fn id(name: &str) -> TransitionId {
        TransitionId::new(name)
    }

    fn pid(name: &str) -> PlaceId {
        PlaceId::new(name)
    }

    fn tokens(controller: &Controller, place: &str) -> f64 {
        controller.net().place_tokens(&pid(place)).unwrap()
    }

    /// P1(1) -> T1 -> P2(0)
    fn chain(transition: Transition) -> Net {
        let mut net = Net::new();
        net.add_place(Place::new("P1", 1.0)).unwrap();
        net.add_place(Place::new("P2", 0.0)).unwrap();
        net.add_transition(transition).unwrap();
        net.add_arc(Arc::new("A1", "P1", "T1")).unwrap();
        net.add_arc(Arc::new("A2", "T1", "P2")).unwrap();
        net
    }

    /// P1(1) -> T1 -> P2 -> T2 -> P1 with immediate transitions
    fn immediate_cycle() -> Net {
        let mut net = chain(Transition::immediate("T1"));
        net.add_transition(Transition::immediate("T2")).unwrap();
        net.add_arc(Arc::new("A3", "P2", "T2")).unwrap();
        net.add_arc(Arc::new("A4", "T2", "P1")).unwrap();
        net
    }

    #[test]
    fn test_immediate_chain_fires_once_then_completes() {
        let mut controller =
            Controller::new(chain(Transition::immediate("T1")), EngineConfig::default()).unwrap();
        // armed by the first sync, like every other kind
        assert_eq!(
            controller.can_fire(&id("T1")),
            (false, "immediate transition is not armed".to_string())
        );

        assert!(controller.step(1.0).unwrap());
        assert_eq!(tokens(&controller, "P1"), 0.0);
        assert_eq!(tokens(&controller, "P2"), 1.0);
        assert_eq!(controller.get_time(), 0.0);
        assert_eq!(controller.last_fired(), Some(&id("T1")));

        assert!(!controller.step(1.0).unwrap());
        assert_eq!(controller.state(), &RunState::Completed);

        let (ok, reason) = controller.can_fire(&id("T1"));
        assert!(!ok);
        assert_eq!(reason, "P1 has 0 < 1 tokens required");
    }

    #[test]
    fn test_token_trace_records_each_step() {
        let mut controller =
            Controller::new(chain(Transition::immediate("T1")), EngineConfig::default()).unwrap();
        controller.step(1.0).unwrap();
        assert_eq!(
            controller.get_token_trace(&pid("P2")),
            vec![(0.0, 0.0), (0.0, 1.0)]
        );
        assert!(controller.get_token_trace(&pid("P9")).is_empty());
    }

    #[test]
    fn test_immediate_cycle_is_livelock() {
        let config = EngineConfig::default().with_livelock_limit(50);
        let mut controller = Controller::new(immediate_cycle(), config).unwrap();

        let mut result = Ok(true);
        for _ in 0..5000 {
            result = controller.step(1.0);
            if result.is_err() {
                break;
            }
        }
        match result {
            Err(Error::LivelockDetected {
                steps, transitions, ..
            }) => {
                assert_eq!(steps, 51);
                assert_eq!(transitions, vec![id("T1"), id("T2")]);
            }
            other => panic!("Expected LivelockDetected, got {:?}", other),
        }
        assert!(matches!(controller.state(), RunState::Halted { .. }));
        assert!(matches!(controller.step(1.0), Err(Error::Halted { .. })));
        assert!(!controller.can_fire(&id("T1")).0);

        controller.reset();
        assert_eq!(controller.state(), &RunState::Idle);
        assert!(controller.step(1.0).unwrap());
    }

    #[test]
    fn test_default_livelock_limit_halts_within_a_few_thousand_steps() {
        let mut controller = Controller::new(immediate_cycle(), EngineConfig::default()).unwrap();
        let halted_at = (1..=5000).find(|_| controller.step(1.0).is_err());
        assert_eq!(halted_at, Some(1001));
    }

    #[test]
    fn test_timed_transition_fires_when_due() {
        let mut controller = Controller::new(
            chain(Transition::timed("T1", 2.0, None)),
            EngineConfig::default(),
        )
        .unwrap();

        for _ in 0..4 {
            assert!(controller.step(0.5).unwrap());
        }
        assert_eq!(controller.get_time(), 2.0);
        assert_eq!(tokens(&controller, "P2"), 0.0);
        assert_eq!(
            controller.behavior_schedule(&id("T1")),
            Some(ScheduleState::Armed {
                enabled_at: 0.0,
                due_at: 2.0,
                window_end: None
            })
        );

        assert!(controller.step(0.5).unwrap());
        assert_eq!(tokens(&controller, "P2"), 1.0);
        assert_eq!(controller.behavior_schedule(&id("T1")), Some(ScheduleState::Idle));
    }

    #[test]
    fn test_next_event_mode_jumps_to_due_time() {
        let config = EngineConfig::default().with_time_mode(TimeMode::NextEvent);
        let mut controller =
            Controller::new(chain(Transition::timed("T1", 2.0, None)), config).unwrap();

        assert!(controller.step(10.0).unwrap());
        assert_eq!(controller.get_time(), 2.0);
        assert!(controller.step(10.0).unwrap());
        assert_eq!(tokens(&controller, "P2"), 1.0);
        assert_eq!(controller.fired_count(&id("T1")), 1);
    }

    #[test]
    fn test_stochastic_source_produces_tokens() {
        let mut net = Net::new();
        net.add_place(Place::new("P1", 0.0)).unwrap();
        net.add_transition(Transition::stochastic("T1", 1.0).as_source())
            .unwrap();
        net.add_arc(Arc::new("A1", "T1", "P1")).unwrap();
        let config = EngineConfig::default()
            .with_seed(42)
            .with_time_mode(TimeMode::NextEvent);
        let mut controller = Controller::new(net, config).unwrap();

        controller.run_until(10.0, 1.0).unwrap();
        assert!(tokens(&controller, "P1") >= 1.0);
        assert_eq!(
            tokens(&controller, "P1"),
            controller.fired_count(&id("T1")) as f64
        );
    }

    #[test]
    fn test_transition_without_inputs_bursts_like_a_source() {
        let mut net = Net::new();
        net.add_place(Place::new("P1", 0.0)).unwrap();
        net.add_transition(Transition::stochastic("T1", 2.0).with_max_burst(3))
            .unwrap();
        net.add_arc(Arc::new("A1", "T1", "P1")).unwrap();
        let config = EngineConfig::default().with_time_mode(TimeMode::NextEvent);
        let mut controller = Controller::new(net, config).unwrap();

        controller.run_until(20.0, 1.0).unwrap();
        let fired = controller.fired_count(&id("T1")) as f64;
        let produced = tokens(&controller, "P1");
        assert!(fired > 0.0);
        assert!(produced >= fired && produced <= 3.0 * fired);
        match controller.behavior_schedule(&id("T1")) {
            Some(ScheduleState::Sampled { burst, .. }) => assert!((1..=3).contains(&burst)),
            other => panic!("Expected a sample, got {:?}", other),
        }
    }

    #[test]
    fn test_priority_policy_is_deterministic() {
        let mut net = Net::new();
        net.add_place(Place::new("P", 1.0)).unwrap();
        for (name, priority) in [("T1", 1), ("T2", 5), ("T3", 5)] {
            net.add_transition(Transition::immediate(name).with_priority(priority))
                .unwrap();
            net.add_place(Place::new(format!("out_{}", name), 0.0))
                .unwrap();
            net.add_arc(Arc::new(format!("in_{}", name), "P", name))
                .unwrap();
            net.add_arc(Arc::new(format!("a_{}", name), name, format!("out_{}", name)))
                .unwrap();
        }
        let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::Priority);

        for _ in 0..5 {
            let mut controller = Controller::new(net.clone(), config.clone()).unwrap();
            controller.step(1.0).unwrap();
            assert_eq!(controller.last_fired(), Some(&id("T2")));
            assert_eq!(tokens(&controller, "out_T2"), 1.0);
        }
    }

    #[test]
    fn test_type_based_policy_prefers_immediate() {
        let mut net = Net::new();
        net.add_place(Place::new("P", 1.0)).unwrap();
        net.add_place(Place::new("Q", 0.0)).unwrap();
        net.add_transition(Transition::timed("T1", 0.0, None)).unwrap();
        net.add_transition(Transition::immediate("T2")).unwrap();
        for t in ["T1", "T2"] {
            net.add_arc(Arc::new(format!("in_{}", t), "P", t)).unwrap();
            net.add_arc(Arc::new(format!("out_{}", t), t, "Q")).unwrap();
        }
        let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::TypeBased);
        let mut controller = Controller::new(net, config).unwrap();
        controller.step(1.0).unwrap();
        assert_eq!(controller.last_fired(), Some(&id("T2")));
    }

    #[test]
    fn test_round_robin_visits_every_transition() {
        // three transitions guarded by a test arc stay enabled forever
        let mut net = Net::new();
        net.add_place(Place::new("P", 1.0)).unwrap();
        for t in ["T1", "T2", "T3"] {
            net.add_transition(Transition::immediate(t)).unwrap();
            net.add_arc(Arc::new(format!("g_{}", t), "P", t).with_kind(ArcKind::Test))
                .unwrap();
        }
        let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::RoundRobin);
        let mut controller = Controller::new(net, config).unwrap();

        let mut order = Vec::new();
        for _ in 0..6 {
            controller.step(1.0).unwrap();
            order.push(controller.last_fired().unwrap().to_string());
        }
        assert_eq!(order, vec!["T1", "T2", "T3", "T1", "T2", "T3"]);
        assert_eq!(tokens(&controller, "P"), 1.0);
    }

    #[test]
    fn test_inhibitor_blocks_and_test_arc_does_not_consume() {
        let mut net = chain(Transition::immediate("T1"));
        net.add_place(Place::new("I", 1.0)).unwrap();
        net.add_arc(Arc::new("A3", "I", "T1").with_kind(ArcKind::Inhibitor))
            .unwrap();
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();

        let (ok, reason) = controller.can_fire(&id("T1"));
        assert!(!ok);
        assert!(reason.contains("inhibitor"));
        assert!(!controller.step(1.0).unwrap());

        controller.set_tokens(&pid("I"), 0.0).unwrap();
        assert!(controller.step(1.0).unwrap());
        assert_eq!(tokens(&controller, "P2"), 1.0);
    }

    #[test]
    fn test_parallel_input_arcs_consume_their_sum() {
        // P1(1) has two weight-1 arcs into T1
        let mut net = chain(Transition::immediate("T1"));
        net.add_arc(Arc::new("A3", "P1", "T1")).unwrap();
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();

        assert!(!controller.step(1.0).unwrap());
        assert_eq!(controller.state(), &RunState::Completed);
        let (ok, reason) = controller.can_fire(&id("T1"));
        assert!(!ok);
        assert_eq!(reason, "P1 has 1 < 2 tokens required across parallel arcs");
        assert!(controller.enabled_transitions().is_empty());

        controller.set_tokens(&pid("P1"), 2.0).unwrap();
        assert!(controller.step(1.0).unwrap());
        assert_eq!(tokens(&controller, "P1"), 0.0);
        assert_eq!(tokens(&controller, "P2"), 1.0);
    }

    #[test]
    fn test_tokens_are_conserved() {
        // P1(5) -> T1 (immediate) -> P2 -> T2 (timed 1.0) -> P1
        let mut net = Net::new();
        net.add_place(Place::new("P1", 5.0)).unwrap();
        net.add_place(Place::new("P2", 0.0)).unwrap();
        net.add_transition(Transition::immediate("T1")).unwrap();
        net.add_transition(Transition::timed("T2", 1.0, None)).unwrap();
        net.add_arc(Arc::new("A1", "P1", "T1")).unwrap();
        net.add_arc(Arc::new("A2", "T1", "P2")).unwrap();
        net.add_arc(Arc::new("A3", "P2", "T2")).unwrap();
        net.add_arc(Arc::new("A4", "T2", "P1")).unwrap();
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();

        for _ in 0..200 {
            controller.step(0.25).unwrap();
            let marking = controller.net().marking();
            assert!(marking.iter().all(|&m| m >= 0.0));
            assert_eq!(marking.iter().sum::<f64>(), 5.0);
        }
        assert!(controller.fired_count(&id("T2")) > 0);
    }

    #[test]
    fn test_continuous_decay_matches_exponential() {
        let mut net = Net::new();
        net.add_place(Place::new("A", 1.0)).unwrap();
        net.add_place(Place::new("B", 0.0)).unwrap();
        net.add_transition(Transition::continuous("T1", "0.5 * A"))
            .unwrap();
        net.add_arc(Arc::new("A1", "A", "T1")).unwrap();
        net.add_arc(Arc::new("A2", "T1", "B")).unwrap();
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();
        assert_eq!(
            controller.place_kinds(),
            &[PlaceKind::Continuous, PlaceKind::Continuous]
        );

        controller.run_until(2.0, 0.01).unwrap();
        let t = controller.get_time();
        assert!((t - 2.0).abs() < 1e-9);
        let a = tokens(&controller, "A");
        let b = tokens(&controller, "B");
        assert!((a - (-0.5 * t).exp()).abs() < 1e-6, "A was {}", a);
        assert!((a + b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_euler_integrator_is_selectable() {
        let mut net = Net::new();
        net.add_place(Place::new("A", 1.0)).unwrap();
        net.add_transition(Transition::continuous("T1", "A")).unwrap();
        net.add_arc(Arc::new("A1", "A", "T1")).unwrap();
        let config = EngineConfig::default().with_integrator(IntegratorKind::Euler);
        let mut controller = Controller::new(net, config).unwrap();
        controller.step(0.5).unwrap();
        assert_eq!(tokens(&controller, "A"), 0.5);
    }

    #[test]
    fn test_constant_flow_undershoot_is_clamped() {
        let mut net = Net::new();
        net.add_place(Place::new("A", 1.0)).unwrap();
        net.add_transition(Transition::continuous("T1", 3.0)).unwrap();
        net.add_arc(Arc::new("A1", "A", "T1")).unwrap();
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();

        controller.step(0.5).unwrap();
        assert_eq!(tokens(&controller, "A"), 0.0);
        // the empty place disables the flow
        assert!(!controller.step(0.5).unwrap());
    }

    #[test]
    fn test_negative_rate_warns_by_default() {
        let net = chain(Transition::continuous("T1", -1.0));
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();

        controller.step(0.1).unwrap();
        controller.step(0.1).unwrap();
        assert_eq!(tokens(&controller, "P1"), 1.0);
        assert_eq!(tokens(&controller, "P2"), 0.0);
        assert_eq!(controller.diagnostics().len(), 2);
        assert!(matches!(
            &controller.diagnostics()[0],
            Diagnostic::NegativeRate { rate, .. } if *rate == -1.0
        ));
    }

    #[test]
    fn test_negative_rate_can_halt() {
        let net = chain(Transition::continuous("T1", "0 - P1"));
        let config = EngineConfig::default().with_negative_rate_policy(NegativeRatePolicy::Halt);
        let mut controller = Controller::new(net, config).unwrap();

        match controller.step(0.1) {
            Err(Error::NegativeRate {
                transition, rate, ..
            }) => {
                assert_eq!(transition, id("T1"));
                assert_eq!(rate, -1.0);
            }
            other => panic!("Expected NegativeRate, got {:?}", other),
        }
        assert!(matches!(controller.state(), RunState::Halted { .. }));
    }

    #[test]
    fn test_reset_restores_post_construction_state() {
        let mut net = chain(Transition::stochastic("T1", 2.0));
        net.add_transition(Transition::timed("T2", 1.0, Some(3.0)))
            .unwrap();
        net.add_arc(Arc::new("A3", "P2", "T2")).unwrap();
        net.add_arc(Arc::new("A4", "T2", "P1")).unwrap();
        let config = EngineConfig::default().with_seed(5);

        let mut controller = Controller::new(net.clone(), config.clone()).unwrap();
        let fresh = Controller::new(net, config).unwrap();
        controller.run_until(5.0, 0.25).unwrap();
        let first_run = controller.get_token_trace(&pid("P1"));

        controller.reset();
        assert_eq!(controller.get_time(), 0.0);
        assert_eq!(controller.net().marking(), fresh.net().marking());
        for t in ["T1", "T2"] {
            assert_eq!(controller.behavior_schedule(&id(t)), Some(ScheduleState::Idle));
            assert_eq!(controller.fired_count(&id(t)), 0);
        }
        assert_eq!(controller.get_token_trace(&pid("P1")), vec![(0.0, 1.0)]);

        // same seed, same trajectory
        controller.run_until(5.0, 0.25).unwrap();
        assert_eq!(controller.get_token_trace(&pid("P1")), first_run);
    }

    #[test]
    fn test_disabling_discards_stochastic_sample() {
        // T1 is inhibited by I; a constant flow C -> Tc -> D keeps time moving
        // while T1 is disabled
        let mut net = chain(Transition::stochastic("T1", 0.5));
        net.add_place(Place::new("I", 0.0)).unwrap();
        net.add_place(Place::new("C", 100.0)).unwrap();
        net.add_place(Place::new("D", 0.0)).unwrap();
        net.add_transition(Transition::continuous("Tc", 0.1)).unwrap();
        net.add_arc(Arc::new("A3", "I", "T1").with_kind(ArcKind::Inhibitor))
            .unwrap();
        net.add_arc(Arc::new("A4", "C", "Tc")).unwrap();
        net.add_arc(Arc::new("A5", "Tc", "D")).unwrap();
        let mut controller = Controller::new(net, EngineConfig::default()).unwrap();

        controller.step(0.1).unwrap();
        let stale_fire_at = match controller.behavior_schedule(&id("T1")) {
            Some(ScheduleState::Sampled {
                enabled_at, fire_at, ..
            }) => {
                assert_eq!(enabled_at, 0.0);
                fire_at
            }
            other => panic!("Expected a sample, got {:?}", other),
        };

        controller.set_tokens(&pid("I"), 1.0).unwrap();
        while controller.get_time() <= stale_fire_at + 0.5 {
            controller.step(0.5).unwrap();
        }
        assert_eq!(controller.behavior_schedule(&id("T1")), Some(ScheduleState::Idle));
        assert_eq!(controller.fired_count(&id("T1")), 0);

        // re-enabled after the old firing time: the old sample is gone
        let reenabled_at = controller.get_time();
        controller.set_tokens(&pid("I"), 0.0).unwrap();
        controller.step(0.5).unwrap();
        assert_eq!(controller.fired_count(&id("T1")), 0);
        assert_eq!(tokens(&controller, "P1"), 1.0);
        match controller.behavior_schedule(&id("T1")) {
            Some(ScheduleState::Sampled {
                enabled_at, fire_at, ..
            }) => {
                assert_eq!(enabled_at, reenabled_at);
                assert!(fire_at > reenabled_at);
            }
            other => panic!("Expected a fresh sample, got {:?}", other),
        }
    }

    #[test]
    fn test_set_tokens_validates() {
        let mut controller =
            Controller::new(chain(Transition::immediate("T1")), EngineConfig::default()).unwrap();
        assert!(controller.set_tokens(&pid("P1"), -1.0).is_err());
        assert!(controller.set_tokens(&pid("P1"), 0.5).is_err());
        assert!(controller.set_tokens(&pid("P9"), 1.0).is_err());
        controller.set_tokens(&pid("P1"), 3.0).unwrap();
        assert_eq!(tokens(&controller, "P1"), 3.0);
    }

    #[test]
    fn test_invalid_step_and_unknown_transition() {
        let mut controller =
            Controller::new(chain(Transition::immediate("T1")), EngineConfig::default()).unwrap();
        assert!(matches!(controller.step(0.0), Err(Error::InvalidStep(_))));
        assert!(matches!(controller.step(f64::NAN), Err(Error::InvalidStep(_))));
        let (ok, reason) = controller.can_fire(&id("T9"));
        assert!(!ok);
        assert!(reason.contains("unknown"));
    }

    #[test]
    fn test_invalid_net_is_rejected() {
        let mut net = chain(Transition::continuous("T1", "k * P1"));
        assert!(matches!(
            Controller::new(net.clone(), EngineConfig::default()),
            Err(Error::Core(petriflow_core::Error::RateExpression { .. }))
        ));
        net.add_arc(Arc::new("A9", "T1", "P9")).unwrap();
        assert!(Controller::new(net, EngineConfig::default()).is_err());
    }

    #[test]
    fn test_enabled_transitions() {
        let mut controller = Controller::new(immediate_cycle(), EngineConfig::default()).unwrap();
        assert!(controller.enabled_transitions().is_empty());
        controller.step(1.0).unwrap();
        // after T1 fired, only T2 is enabled
        assert_eq!(controller.enabled_transitions(), vec![&id("T2")]);
    }
}
