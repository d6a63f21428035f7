//! Engine configuration
//!
//! Everything a run needs besides the net itself: how time advances, how
//! conflicts are resolved, how continuous flow is integrated and how much
//! history is kept. The whole struct round-trips through RON so it can live
//! next to the net in a document.

use crate::ConflictPolicy;
use serde::{Deserialize, Serialize};

/// How a step chooses its time increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    /// Every non-zero-time step advances by exactly `dt`
    #[default]
    FixedStep,
    /// Advance by `dt` or up to the next scheduled firing, whichever is sooner
    NextEvent,
}

/// Numerical scheme for continuous flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    /// Classic 4th-order Runge-Kutta
    #[default]
    RungeKutta4,
    /// Forward Euler
    Euler,
}

/// What to do when a continuous rate evaluates negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NegativeRatePolicy {
    /// Record a diagnostic and contribute zero flow for that evaluation
    #[default]
    Warn,
    /// Stop the run with an error
    Halt,
}

/// Token trace settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Record a sample per place after every step
    pub enabled: bool,
    /// Keep at most this many samples per place, dropping the oldest
    pub max_samples: Option<usize>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_samples: None,
        }
    }
}

/// Configuration for a simulation run
///
/// # Example
///
/// ```
/// use petriflow_engine::{ConflictPolicy, EngineConfig, TimeMode};
///
/// let config = EngineConfig::default()
///     .with_time_mode(TimeMode::NextEvent)
///     .with_conflict_policy(ConflictPolicy::Priority)
///     .with_seed(7);
/// assert_eq!(config.livelock_limit, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub time_mode: TimeMode,
    pub conflict_policy: ConflictPolicy,
    /// Consecutive zero-time steps tolerated before reporting livelock
    pub livelock_limit: usize,
    /// Seed for sojourn sampling, random conflict choice and noise
    pub seed: u64,
    pub negative_rate_policy: NegativeRatePolicy,
    pub integrator: IntegratorKind,
    pub trace: TraceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_mode: TimeMode::default(),
            conflict_policy: ConflictPolicy::default(),
            livelock_limit: 1000,
            seed: 12345,
            negative_rate_policy: NegativeRatePolicy::default(),
            integrator: IntegratorKind::default(),
            trace: TraceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_time_mode(mut self, time_mode: TimeMode) -> Self {
        self.time_mode = time_mode;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_livelock_limit(mut self, limit: usize) -> Self {
        self.livelock_limit = limit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_negative_rate_policy(mut self, policy: NegativeRatePolicy) -> Self {
        self.negative_rate_policy = policy;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    /// Bound the per-place trace length
    pub fn with_trace_limit(mut self, max_samples: usize) -> Self {
        self.trace.max_samples = Some(max_samples);
        self
    }

    /// Turn token tracing off
    pub fn without_trace(mut self) -> Self {
        self.trace.enabled = false;
        self
    }
}
