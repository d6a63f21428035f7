//! Uniform read/mutate view over a net
//!
//! The engine never touches the editor's storage directly. It reads token
//! values and resolved arcs through [`NetView`], and arc endpoints are always
//! re-resolved by id so a record swapped in place is picked up and a removed
//! record surfaces as [`Error::DanglingReference`].

use crate::net::check_token_value;
use crate::{Arc, ArcId, ArcKind, Error, Net, PlaceId, Result, TransitionId};

/// Which side of a transition an arc sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// Place to transition
    Input,
    /// Transition to place
    Output,
}

/// An arc whose endpoints have been resolved against a net
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArc {
    pub arc: ArcId,
    pub place: PlaceId,
    /// Registration index of the place
    pub place_index: usize,
    pub transition: TransitionId,
    pub direction: ArcDirection,
    pub kind: ArcKind,
    pub weight: f64,
    pub threshold: Option<f64>,
}

impl ResolvedArc {
    /// Token amount a normal input arc requires before it is satisfied
    pub fn effective_threshold(&self) -> f64 {
        self.threshold.unwrap_or(self.weight)
    }
}

/// Read/mutate interface the engine uses to reach places, transitions and arcs
pub trait NetView {
    /// Current token value of a place
    fn place_tokens(&self, place: &PlaceId) -> Result<f64>;

    /// Overwrite the token value of a place
    fn set_tokens(&mut self, place: &PlaceId, value: f64) -> Result<()>;

    /// Arcs leading from places into the transition
    fn input_arcs(&self, transition: &TransitionId) -> Result<Vec<ResolvedArc>>;

    /// Arcs leading from the transition into places
    fn output_arcs(&self, transition: &TransitionId) -> Result<Vec<ResolvedArc>>;
}

impl Net {
    /// Resolve both endpoints of an arc by id
    pub fn resolve_arc(&self, arc: &Arc) -> Result<ResolvedArc> {
        let source_place = self.place_index_of(&arc.source_id);
        let target_place = self.place_index_of(&arc.target_id);
        let source_transition = self.has_transition(&arc.source_id);
        let target_transition = self.has_transition(&arc.target_id);

        if source_place.is_none() && !source_transition {
            return Err(dangling(arc, "source", &arc.source_id));
        }
        if target_place.is_none() && !target_transition {
            return Err(dangling(arc, "target", &arc.target_id));
        }

        let (place_index, place, transition, direction) =
            match (source_place, target_place) {
                (Some(index), None) => (index, &arc.source_id, &arc.target_id, ArcDirection::Input),
                (None, Some(index)) => {
                    (index, &arc.target_id, &arc.source_id, ArcDirection::Output)
                }
                _ => {
                    return Err(Error::invalid(format!(
                        "arc {} connects '{}' to '{}', which breaks the bipartite rule",
                        arc.id, arc.source_id, arc.target_id
                    )))
                }
            };

        Ok(ResolvedArc {
            arc: arc.id.clone(),
            place: PlaceId::new(place.as_str()),
            place_index,
            transition: TransitionId::new(transition.as_str()),
            direction,
            kind: arc.kind,
            weight: arc.weight,
            threshold: arc.threshold,
        })
    }

    fn place_index_of(&self, id: &str) -> Option<usize> {
        self.place_index(&PlaceId::new(id))
    }

    fn arcs_of(&self, transition: &TransitionId, direction: ArcDirection) -> Result<Vec<ResolvedArc>> {
        if !self.has_transition(transition.as_str()) {
            return Err(Error::TransitionNotFound(transition.to_string()));
        }
        let touches = |arc: &&Arc| match direction {
            ArcDirection::Input => arc.target_id == transition.as_str(),
            ArcDirection::Output => arc.source_id == transition.as_str(),
        };
        self.arcs()
            .filter(touches)
            .map(|arc| self.resolve_arc(arc))
            .collect()
    }
}

fn dangling(arc: &Arc, endpoint: &'static str, id: &str) -> Error {
    Error::DanglingReference {
        arc: arc.id.to_string(),
        endpoint,
        id: id.to_string(),
    }
}

impl NetView for Net {
    fn place_tokens(&self, place: &PlaceId) -> Result<f64> {
        self.place(place)
            .map(|p| p.tokens)
            .ok_or_else(|| Error::PlaceNotFound(place.to_string()))
    }

    fn set_tokens(&mut self, place: &PlaceId, value: f64) -> Result<()> {
        check_token_value(place, value)?;
        let slot = self
            .place_mut(place)
            .ok_or_else(|| Error::PlaceNotFound(place.to_string()))?;
        slot.tokens = value;
        Ok(())
    }

    fn input_arcs(&self, transition: &TransitionId) -> Result<Vec<ResolvedArc>> {
        self.arcs_of(transition, ArcDirection::Input)
    }

    fn output_arcs(&self, transition: &TransitionId) -> Result<Vec<ResolvedArc>> {
        self.arcs_of(transition, ArcDirection::Output)
    }
}
