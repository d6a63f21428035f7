//! Wiener noise processes for stochastic rate expressions
//!
//! Each `wiener(...)` call site of each transition owns one process. A process
//! accumulates `sqrt(dt)·N(0,1)` increments as it is evaluated at later times
//! and returns the same value for repeated evaluations at the same time.

use crate::rng::{hash_str, mix_seed};
use crate::{SimRng, TransitionId};
use indexmap::IndexMap;

/// Identifies one noise process: a transition and a call site in its rate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoiseKey {
    pub transition: TransitionId,
    pub site: usize,
}

impl NoiseKey {
    pub fn new(transition: TransitionId, site: usize) -> Self {
        Self { transition, site }
    }
}

/// A discretized Wiener path
#[derive(Debug, Clone)]
pub struct WienerProcess {
    seed: u64,
    rng: SimRng,
    value: f64,
    last_time: Option<f64>,
}

impl WienerProcess {
    /// Create a process starting at W(t0) = 0
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: SimRng::new(seed),
            value: 0.0,
            last_time: None,
        }
    }

    /// Value of the path at `time`, advancing it if `time` is later than the last sample
    pub fn sample(&mut self, time: f64) -> f64 {
        match self.last_time {
            None => {
                self.last_time = Some(time);
            }
            Some(last) if time > last => {
                let dt = time - last;
                self.value += dt.sqrt() * self.rng.standard_normal();
                self.last_time = Some(time);
            }
            Some(_) => {}
        }
        self.value
    }

    /// Current accumulated value without advancing
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Restart the path from zero with the original seed
    pub fn reset(&mut self) {
        *self = Self::new(self.seed);
    }
}

/// All noise processes of a run
#[derive(Debug, Clone)]
pub struct NoiseBank {
    seed: u64,
    processes: IndexMap<NoiseKey, WienerProcess>,
}

impl NoiseBank {
    /// Create an empty bank; process seeds derive from `seed` and their key
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            processes: IndexMap::new(),
        }
    }

    /// Sample the process for `key` at `time`, creating it on first use
    pub fn sample(&mut self, key: &NoiseKey, time: f64) -> f64 {
        if !self.processes.contains_key(key) {
            let seed = mix_seed(self.seed, hash_str(key.transition.as_str()), key.site as u64);
            self.processes.insert(key.clone(), WienerProcess::new(seed));
        }
        match self.processes.get_mut(key) {
            Some(process) => process.sample(time),
            None => 0.0,
        }
    }

    /// Get a process by key
    pub fn process(&self, key: &NoiseKey) -> Option<&WienerProcess> {
        self.processes.get(key)
    }

    /// Reset a single process; returns false if it has never been sampled
    pub fn reset_process(&mut self, key: &NoiseKey) -> bool {
        match self.processes.get_mut(key) {
            Some(process) => {
                process.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every process of one transition
    pub fn reset_transition(&mut self, transition: &TransitionId) {
        for (key, process) in self.processes.iter_mut() {
            if &key.transition == transition {
                process.reset();
            }
        }
    }

    /// Reset every process
    pub fn reset_all(&mut self) {
        self.processes.clear();
    }

    /// Number of live processes
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Check if no process has been sampled yet
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
