//! Net model: places, transitions, arcs and the in-memory store
//!
//! The store keeps registration order so place indices, iteration order and
//! tie-breaking in conflict policies are stable for the lifetime of a net.

use crate::{ArcId, Error, PlaceId, Rate, Result, TransitionId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used when comparing token amounts
pub const TOKEN_EPSILON: f64 = 1e-9;

/// A token holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Unique identifier
    pub id: PlaceId,
    /// Display label, also usable as a name in rate expressions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Current token amount
    #[serde(default)]
    pub tokens: f64,
    /// Token amount restored on reset
    #[serde(default)]
    pub initial_marking: f64,
}

impl Place {
    /// Create a place whose current tokens equal its initial marking
    pub fn new(id: impl Into<PlaceId>, initial_marking: f64) -> Self {
        Self {
            id: id.into(),
            label: None,
            tokens: initial_marking,
            initial_marking,
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Whether a place holds quantized or real-valued tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceKind {
    Discrete,
    Continuous,
}

/// The four transition kinds of a hybrid net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    Immediate,
    Timed,
    Stochastic,
    Continuous,
}

impl TransitionKind {
    /// Whether this kind fires discretely (and takes part in conflict resolution)
    pub fn is_discrete(self) -> bool {
        !matches!(self, TransitionKind::Continuous)
    }

    /// Precedence used by the type-based conflict policy (higher wins)
    pub fn rank(self) -> u8 {
        match self {
            TransitionKind::Immediate => 3,
            TransitionKind::Timed => 2,
            TransitionKind::Stochastic => 1,
            TransitionKind::Continuous => 0,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionKind::Immediate => "immediate",
            TransitionKind::Timed => "timed",
            TransitionKind::Stochastic => "stochastic",
            TransitionKind::Continuous => "continuous",
        };
        f.write_str(name)
    }
}

/// A token transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Unique identifier
    pub id: TransitionId,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Transition kind
    #[serde(rename = "transition_type", default)]
    pub kind: TransitionKind,
    /// Firing rate (stochastic) or flow rate (continuous)
    #[serde(default)]
    pub rate: Rate,
    /// Priority used by the priority conflict policy (higher wins)
    #[serde(default)]
    pub priority: i32,
    /// Earliest firing delay after enablement (timed)
    #[serde(default)]
    pub earliest_delay: f64,
    /// Latest firing delay after enablement (timed); `None` means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_delay: Option<f64>,
    /// Upper bound of the pre-sampled burst size (stochastic sources)
    #[serde(default = "default_max_burst")]
    pub max_burst: u32,
    /// Declares a transition without input arcs
    #[serde(default)]
    pub is_source: bool,
}

fn default_max_burst() -> u32 {
    1
}

impl Transition {
    /// Create a transition with default parameters for its kind
    pub fn new(id: impl Into<TransitionId>, kind: TransitionKind) -> Self {
        Self {
            id: id.into(),
            label: None,
            kind,
            rate: Rate::default(),
            priority: 0,
            earliest_delay: 0.0,
            latest_delay: None,
            max_burst: default_max_burst(),
            is_source: false,
        }
    }

    /// Create an immediate transition
    pub fn immediate(id: impl Into<TransitionId>) -> Self {
        Self::new(id, TransitionKind::Immediate)
    }

    /// Create a timed transition with a firing window `[earliest, latest]`
    pub fn timed(id: impl Into<TransitionId>, earliest: f64, latest: Option<f64>) -> Self {
        let mut transition = Self::new(id, TransitionKind::Timed);
        transition.earliest_delay = earliest;
        transition.latest_delay = latest;
        transition
    }

    /// Create a stochastic transition
    pub fn stochastic(id: impl Into<TransitionId>, rate: impl Into<Rate>) -> Self {
        Self::new(id, TransitionKind::Stochastic).with_rate(rate)
    }

    /// Create a continuous transition
    pub fn continuous(id: impl Into<TransitionId>, rate: impl Into<Rate>) -> Self {
        Self::new(id, TransitionKind::Continuous).with_rate(rate)
    }

    /// Set the rate
    pub fn with_rate(mut self, rate: impl Into<Rate>) -> Self {
        self.rate = rate.into();
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark as a source transition
    pub fn as_source(mut self) -> Self {
        self.is_source = true;
        self
    }

    /// Set the maximum burst size
    pub fn with_max_burst(mut self, max_burst: u32) -> Self {
        self.max_burst = max_burst;
        self
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Arc classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArcKind {
    /// Consumes or produces `weight` tokens
    #[default]
    Normal,
    /// Blocks firing while the place holds at least `weight` tokens
    Inhibitor,
    /// Requires the place to hold at least `weight` tokens, never consumes
    Test,
}

impl ArcKind {
    /// Whether firing moves tokens through an arc of this kind
    pub fn consumes_tokens(self) -> bool {
        matches!(self, ArcKind::Normal)
    }

    /// Guard arcs only read the connected place
    pub fn is_guard(self) -> bool {
        !self.consumes_tokens()
    }
}

impl fmt::Display for ArcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArcKind::Normal => "normal",
            ArcKind::Inhibitor => "inhibitor",
            ArcKind::Test => "test",
        };
        f.write_str(name)
    }
}

/// A directed connection between a place and a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    /// Unique identifier
    pub id: ArcId,
    /// Id of the source place or transition
    pub source_id: String,
    /// Id of the target place or transition
    pub target_id: String,
    /// Arc classification
    #[serde(rename = "arc_type", default)]
    pub kind: ArcKind,
    /// Tokens moved (normal) or compared against (guards)
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Enablement threshold for normal input arcs; defaults to the weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl Arc {
    /// Create a normal arc of weight 1
    pub fn new(
        id: impl Into<ArcId>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: ArcKind::Normal,
            weight: default_weight(),
            threshold: None,
        }
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the arc kind
    pub fn with_kind(mut self, kind: ArcKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the enablement threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// In-memory net store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Net {
    places: IndexMap<PlaceId, Place>,
    transitions: IndexMap<TransitionId, Transition>,
    arcs: IndexMap<ArcId, Arc>,
}

impl Net {
    /// Create an empty net
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a place
    pub fn add_place(&mut self, place: Place) -> Result<()> {
        if self.places.contains_key(&place.id) || self.has_transition(place.id.as_str()) {
            return Err(Error::invalid(format!("duplicate id '{}'", place.id)));
        }
        self.places.insert(place.id.clone(), place);
        Ok(())
    }

    /// Register a transition
    pub fn add_transition(&mut self, transition: Transition) -> Result<()> {
        if self.transitions.contains_key(&transition.id) || self.has_place(transition.id.as_str())
        {
            return Err(Error::invalid(format!("duplicate id '{}'", transition.id)));
        }
        self.transitions.insert(transition.id.clone(), transition);
        Ok(())
    }

    /// Register an arc; endpoints are resolved lazily and checked by [`Net::validate`]
    pub fn add_arc(&mut self, arc: Arc) -> Result<()> {
        if self.arcs.contains_key(&arc.id) {
            return Err(Error::invalid(format!("duplicate arc id '{}'", arc.id)));
        }
        self.arcs.insert(arc.id.clone(), arc);
        Ok(())
    }

    /// Replace a place in place, keeping its id and position
    pub fn replace_place(&mut self, place: Place) -> Result<Place> {
        let slot = self
            .places
            .get_mut(&place.id)
            .ok_or_else(|| Error::PlaceNotFound(place.id.to_string()))?;
        Ok(std::mem::replace(slot, place))
    }

    /// Replace a transition in place, keeping its id and position
    pub fn replace_transition(&mut self, transition: Transition) -> Result<Transition> {
        let slot = self
            .transitions
            .get_mut(&transition.id)
            .ok_or_else(|| Error::TransitionNotFound(transition.id.to_string()))?;
        Ok(std::mem::replace(slot, transition))
    }

    /// Remove a place; arcs pointing at it become dangling
    pub fn remove_place(&mut self, id: &PlaceId) -> Option<Place> {
        self.places.shift_remove(id)
    }

    /// Remove an arc
    pub fn remove_arc(&mut self, id: &ArcId) -> Option<Arc> {
        self.arcs.shift_remove(id)
    }

    /// Get a place by id
    pub fn place(&self, id: &PlaceId) -> Option<&Place> {
        self.places.get(id)
    }

    /// Get a transition by id
    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.get(id)
    }

    /// Get an arc by id
    pub fn arc(&self, id: &ArcId) -> Option<&Arc> {
        self.arcs.get(id)
    }

    /// All places in registration order
    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    /// All transitions in registration order
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    /// All arcs in registration order
    pub fn arcs(&self) -> impl Iterator<Item = &Arc> {
        self.arcs.values()
    }

    /// Number of places
    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    /// Number of transitions
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Check if a place id is registered
    pub fn has_place(&self, id: &str) -> bool {
        self.places.contains_key(id)
    }

    /// Check if a transition id is registered
    pub fn has_transition(&self, id: &str) -> bool {
        self.transitions.contains_key(id)
    }

    /// Registration index of a place
    pub fn place_index(&self, id: &PlaceId) -> Option<usize> {
        self.places.get_index_of(id)
    }

    /// Place at a registration index
    pub fn place_at(&self, index: usize) -> Option<&Place> {
        self.places.get_index(index).map(|(_, place)| place)
    }

    /// Resolve a name used in rate expressions: place id first, then label
    pub fn place_index_by_name(&self, name: &str) -> Option<usize> {
        self.places.get_index_of(name).or_else(|| {
            self.places
                .values()
                .position(|p| p.label.as_deref() == Some(name))
        })
    }

    /// Current tokens of every place in registration order
    pub fn marking(&self) -> Vec<f64> {
        self.places.values().map(|p| p.tokens).collect()
    }

    /// Overwrite all token values from a marking vector
    pub fn set_marking(&mut self, marking: &[f64]) -> Result<()> {
        if marking.len() != self.places.len() {
            return Err(Error::invalid(format!(
                "marking has {} entries, net has {} places",
                marking.len(),
                self.places.len()
            )));
        }
        for (place, &value) in self.places.values_mut().zip(marking) {
            check_token_value(&place.id, value)?;
            place.tokens = value;
        }
        Ok(())
    }

    /// Restore every place to its initial marking
    pub fn reset_tokens(&mut self) {
        for place in self.places.values_mut() {
            place.tokens = place.initial_marking;
        }
    }

    /// Sum of all tokens
    pub fn total_tokens(&self) -> f64 {
        self.places.values().map(|p| p.tokens).sum()
    }

    pub(crate) fn place_mut(&mut self, id: &PlaceId) -> Option<&mut Place> {
        self.places.get_mut(id)
    }

    /// Classify every place as discrete or continuous
    ///
    /// A place is continuous when a normal arc links it to a continuous transition.
    pub fn place_kinds(&self) -> Vec<PlaceKind> {
        let mut kinds = vec![PlaceKind::Discrete; self.places.len()];
        for arc in self.arcs.values() {
            if arc.kind != ArcKind::Normal {
                continue;
            }
            let (place, transition) = if self.has_place(&arc.source_id) {
                (arc.source_id.as_str(), arc.target_id.as_str())
            } else {
                (arc.target_id.as_str(), arc.source_id.as_str())
            };
            let continuous = self
                .transitions
                .get(transition)
                .is_some_and(|t| t.kind == TransitionKind::Continuous);
            if let (true, Some(index)) = (continuous, self.places.get_index_of(place)) {
                kinds[index] = PlaceKind::Continuous;
            }
        }
        kinds
    }

    /// Check every structural and kinetic invariant of the net
    pub fn validate(&self) -> Result<()> {
        for arc in self.arcs.values() {
            let resolved = self.resolve_arc(arc)?;
            if !arc.weight.is_finite() || arc.weight <= 0.0 {
                return Err(Error::invalid(format!(
                    "arc {} has non-positive weight {}",
                    arc.id, arc.weight
                )));
            }
            if resolved.direction == crate::ArcDirection::Output && arc.kind.is_guard() {
                return Err(Error::invalid(format!(
                    "{} arc {} cannot leave transition {}",
                    arc.kind, arc.id, resolved.transition
                )));
            }
            match (arc.kind, arc.threshold) {
                (ArcKind::Normal, Some(threshold)) if threshold.is_nan() || threshold < arc.weight => {
                    return Err(Error::invalid(format!(
                        "arc {} threshold {} is below its weight {}",
                        arc.id, threshold, arc.weight
                    )));
                }
                (kind, Some(_)) if kind.is_guard() => {
                    tracing::debug!(arc = %arc.id, %kind, "threshold ignored on guard arc");
                }
                _ => {}
            }
        }

        for transition in self.transitions.values() {
            self.validate_transition(transition)?;
        }

        let kinds = self.place_kinds();
        for (place, kind) in self.places.values().zip(&kinds) {
            check_token_value(&place.id, place.tokens)?;
            check_token_value(&place.id, place.initial_marking)?;
            if *kind == PlaceKind::Discrete
                && (place.tokens.fract() != 0.0 || place.initial_marking.fract() != 0.0)
            {
                return Err(Error::invalid(format!(
                    "discrete place {} holds a fractional marking",
                    place.id
                )));
            }
        }
        for arc in self.arcs.values().filter(|a| a.kind == ArcKind::Normal) {
            let resolved = self.resolve_arc(arc)?;
            if kinds[resolved.place_index] == PlaceKind::Discrete && arc.weight.fract() != 0.0 {
                return Err(Error::invalid(format!(
                    "arc {} moves a fractional weight {} through discrete place {}",
                    arc.id, arc.weight, resolved.place
                )));
            }
        }

        Ok(())
    }

    fn validate_transition(&self, transition: &Transition) -> Result<()> {
        let has_inputs = self
            .arcs
            .values()
            .any(|a| a.target_id == transition.id.as_str());
        if transition.is_source && has_inputs {
            return Err(Error::invalid(format!(
                "source transition {} has input arcs",
                transition.id
            )));
        }
        if let Rate::Constant(value) = transition.rate {
            if !value.is_finite() {
                return Err(Error::invalid(format!(
                    "transition {} has a non-finite rate",
                    transition.id
                )));
            }
        }
        // compiling fails closed on unknown identifiers and functions
        transition.rate.compile(self)?;

        match transition.kind {
            TransitionKind::Timed => {
                let earliest = transition.earliest_delay;
                if !earliest.is_finite() || earliest < 0.0 {
                    return Err(Error::invalid(format!(
                        "timed transition {} has invalid earliest delay {}",
                        transition.id, earliest
                    )));
                }
                if let Some(latest) = transition.latest_delay {
                    if latest.is_nan() || latest < earliest {
                        return Err(Error::invalid(format!(
                            "timed transition {} has latest delay {} before earliest {}",
                            transition.id, latest, earliest
                        )));
                    }
                }
            }
            TransitionKind::Stochastic if transition.max_burst == 0 => {
                return Err(Error::invalid(format!(
                    "stochastic transition {} has max_burst 0",
                    transition.id
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Reject negative or non-finite token amounts
pub fn check_token_value(place: &PlaceId, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidTokens {
            place: place.to_string(),
            value,
            reason: "not finite".to_string(),
        });
    }
    if value < 0.0 {
        return Err(Error::InvalidTokens {
            place: place.to_string(),
            value,
            reason: "negative".to_string(),
        });
    }
    Ok(())
}
