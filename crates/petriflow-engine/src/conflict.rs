//! Conflict resolution between simultaneously fireable transitions
//!
//! At most one discrete transition fires per step. When several can fire, a
//! [`ConflictResolver`] picks the winner from the candidate list.
//!
//! # Policies
//!
//! - **Random**: uniform choice, driven by the run's seeded RNG
//! - **Priority**: highest `priority` wins
//! - **TypeBased**: `immediate > timed > stochastic`
//! - **RoundRobin**: cycles through transitions in registration order
//!
//! Candidates are always passed in registration order, and every
//! deterministic policy breaks ties by taking the earliest registered one.
//! Continuous transitions never appear here; they flow every step.

use petriflow_core::{SimRng, TransitionId, TransitionKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transition that can fire in the current step
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub id: &'a TransitionId,
    pub kind: TransitionKind,
    pub priority: i32,
    /// Registration index of the transition
    pub order: usize,
}

/// Strategy that selects which candidate fires
pub trait ConflictResolver: Send + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Index into `candidates` of the winner, `None` if there are no candidates
    fn select(&mut self, candidates: &[Candidate<'_>], rng: &mut SimRng) -> Option<usize>;

    /// Forget any state carried between steps
    fn reset(&mut self) {}
}

/// Uniform random choice
#[derive(Debug, Default)]
pub struct RandomResolver;

impl ConflictResolver for RandomResolver {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(&mut self, candidates: &[Candidate<'_>], rng: &mut SimRng) -> Option<usize> {
        match candidates.len() {
            0 => None,
            // a lone candidate does not consume randomness
            1 => Some(0),
            n => rng.index(n),
        }
    }
}

/// Highest priority first
#[derive(Debug, Default)]
pub struct PriorityResolver;

impl ConflictResolver for PriorityResolver {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn select(&mut self, candidates: &[Candidate<'_>], _rng: &mut SimRng) -> Option<usize> {
        best_by(candidates, |c| c.priority)
    }
}

/// Fixed precedence by transition kind
#[derive(Debug, Default)]
pub struct TypeBasedResolver;

impl ConflictResolver for TypeBasedResolver {
    fn name(&self) -> &'static str {
        "type_based"
    }

    fn select(&mut self, candidates: &[Candidate<'_>], _rng: &mut SimRng) -> Option<usize> {
        best_by(candidates, |c| c.kind.rank())
    }
}

/// Cyclic fairness over registration order
#[derive(Debug, Default)]
pub struct RoundRobinResolver {
    /// Registration index of the last winner
    last: Option<usize>,
}

impl ConflictResolver for RoundRobinResolver {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&mut self, candidates: &[Candidate<'_>], _rng: &mut SimRng) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let next = match self.last {
            Some(last) => candidates.iter().position(|c| c.order > last).unwrap_or(0),
            None => 0,
        };
        self.last = Some(candidates[next].order);
        Some(next)
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// First candidate with the strictly greatest key
fn best_by<K: PartialOrd>(candidates: &[Candidate<'_>], key: impl Fn(&Candidate<'_>) -> K) -> Option<usize> {
    let mut best: Option<(usize, K)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let k = key(candidate);
        let better = match &best {
            Some((_, current)) => k > *current,
            None => true,
        };
        if better {
            best = Some((index, k));
        }
    }
    best.map(|(index, _)| index)
}

/// Named policy as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Random,
    Priority,
    TypeBased,
    RoundRobin,
}

impl ConflictPolicy {
    /// Build a fresh resolver for this policy
    pub fn resolver(self) -> Box<dyn ConflictResolver> {
        match self {
            ConflictPolicy::Random => Box::new(RandomResolver),
            ConflictPolicy::Priority => Box::new(PriorityResolver),
            ConflictPolicy::TypeBased => Box::new(TypeBasedResolver),
            ConflictPolicy::RoundRobin => Box::new(RoundRobinResolver::default()),
        }
    }
}
