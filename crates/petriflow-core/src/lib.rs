//! Petriflow Core - Net model and evaluation primitives for hybrid Petri nets
//!
//! This crate provides the building blocks the execution engine runs on:
//! - Place, transition and arc records plus an ordered in-memory `Net` store
//! - `NetView`, the read/mutate adapter the engine uses to reach the net
//! - Arc semantics for normal, inhibitor and test arcs
//! - A whitelisted rate-expression compiler with kinetic helper functions
//! - Deterministic RNG and resettable Wiener noise processes
//!
//! ## Hybrid nets
//!
//! Transitions come in four kinds:
//! - `Immediate` - fires as soon as its input arcs are satisfied
//! - `Timed` - fires inside a `[earliest, latest]` window after enablement
//! - `Stochastic` - fires after an exponentially distributed sojourn
//! - `Continuous` - moves tokens as a flow integrated over time
//!
//! Places linked to continuous transitions hold real-valued tokens; all other
//! places hold integral token counts.

mod adapter;
pub mod arc;
mod catalog;
mod error;
pub mod expr;
mod identity;
mod net;
mod noise;
mod rng;

pub use adapter::{ArcDirection, NetView, ResolvedArc};
pub use arc::Enablement;
pub use catalog::{Arity, Function};
pub use error::{Error, Result};
pub use expr::{CompiledRate, EvalContext, Rate, RateExpr, Symbols};
pub use identity::{ArcId, PlaceId, TransitionId};
pub use net::{
    check_token_value, Arc, ArcKind, Net, Place, PlaceKind, Transition, TransitionKind,
    TOKEN_EPSILON,
};
pub use noise::{NoiseBank, NoiseKey, WienerProcess};
pub use rng::{hash_str, mix_seed, SimRng};
