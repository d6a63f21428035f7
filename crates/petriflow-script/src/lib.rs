//! Petriflow Script - RON and JSON net documents
//!
//! A [`NetDocument`] holds places, transitions, arcs and optional engine
//! settings. Documents are read and written as RON or JSON, with the format
//! picked from the file extension:
//!
//! ```ron
//! (
//!     name: "decay",
//!     places: [(id: "A", initial_marking: 1.0), (id: "B")],
//!     transitions: [(id: "T", transition_type: continuous, rate: "0.5 * A")],
//!     arcs: [
//!         (id: "a1", source_id: "A", target_id: "T"),
//!         (id: "a2", source_id: "T", target_id: "B"),
//!     ],
//!     simulation: Some((time_mode: fixed_step, seed: 7)),
//! )
//! ```

mod error;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use loader::Format;
pub use schema::{NetDocument, PlaceDef};
