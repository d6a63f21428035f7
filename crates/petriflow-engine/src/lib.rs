//! Petriflow Engine - Hybrid execution for Petri nets
//!
//! The engine steps a [`petriflow_core::Net`] through time:
//! - per-kind transition behaviors track enablement and firing schedules
//! - a pluggable conflict resolver picks one discrete winner per step
//! - continuous transitions are integrated with RK4 (or Euler) between events
//! - livelock in zero-time immediate cycles is detected and halts the run
//!
//! ## Example
//!
//! ```
//! use petriflow_core::{Arc, Net, NetView, Place, PlaceId, Transition};
//! use petriflow_engine::{Controller, EngineConfig};
//!
//! let mut net = Net::new();
//! net.add_place(Place::new("P1", 1.0)).unwrap();
//! net.add_place(Place::new("P2", 0.0)).unwrap();
//! net.add_transition(Transition::immediate("T1")).unwrap();
//! net.add_arc(Arc::new("A1", "P1", "T1")).unwrap();
//! net.add_arc(Arc::new("A2", "T1", "P2")).unwrap();
//!
//! let mut controller = Controller::new(net, EngineConfig::default()).unwrap();
//! assert!(controller.step(1.0).unwrap());
//! assert_eq!(controller.net().place_tokens(&PlaceId::new("P2")).unwrap(), 1.0);
//! assert!(!controller.step(1.0).unwrap());
//! ```

pub mod behavior;
mod config;
pub mod conflict;
mod controller;
mod diagnostic;
mod error;
pub mod integrator;
mod trace;

pub use behavior::{behavior_for, BehaviorEnv, FireOutcome, ScheduleState, TransitionBehavior};
pub use config::{EngineConfig, IntegratorKind, NegativeRatePolicy, TimeMode, TraceConfig};
pub use conflict::{Candidate, ConflictPolicy, ConflictResolver};
pub use controller::{Controller, RunState};
pub use diagnostic::Diagnostic;
pub use error::{Error, Result};
pub use trace::{TokenTrace, TraceRecorder};
