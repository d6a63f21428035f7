//! Document schema for nets

use crate::error::{Error, Result};
use petriflow_core::{Arc, Net, Place, PlaceId, Transition};
use petriflow_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A place as written in a document
///
/// `tokens` is only present when the current amount differs from the
/// initial marking, which is the case for snapshots of a running net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDef {
    pub id: PlaceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub initial_marking: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<f64>,
}

impl PlaceDef {
    fn to_place(&self) -> Place {
        Place {
            id: self.id.clone(),
            label: self.label.clone(),
            tokens: self.tokens.unwrap_or(self.initial_marking),
            initial_marking: self.initial_marking,
        }
    }
}

impl From<PlaceDef> for Place {
    fn from(def: PlaceDef) -> Self {
        Place {
            tokens: def.tokens.unwrap_or(def.initial_marking),
            initial_marking: def.initial_marking,
            id: def.id,
            label: def.label,
        }
    }
}

impl From<&Place> for PlaceDef {
    fn from(place: &Place) -> Self {
        Self {
            id: place.id.clone(),
            label: place.label.clone(),
            initial_marking: place.initial_marking,
            tokens: (place.tokens != place.initial_marking).then_some(place.tokens),
        }
    }
}

/// A complete net with optional simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NetDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub places: Vec<PlaceDef>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub arcs: Vec<Arc>,
    /// Engine settings to run the net with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<EngineConfig>,
}

impl NetDocument {
    /// Create an empty document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Capture a net, including its current tokens
    pub fn from_net(name: impl Into<String>, net: &Net) -> Self {
        Self {
            name: name.into(),
            places: net.places().map(PlaceDef::from).collect(),
            transitions: net.transitions().cloned().collect(),
            arcs: net.arcs().cloned().collect(),
            simulation: None,
        }
    }

    /// Attach simulation settings
    pub fn with_simulation(mut self, config: EngineConfig) -> Self {
        self.simulation = Some(config);
        self
    }

    /// Simulation settings, falling back to the defaults
    pub fn config(&self) -> EngineConfig {
        self.simulation.clone().unwrap_or_default()
    }

    /// Build and validate the net
    pub fn to_net(&self) -> Result<Net> {
        self.check_duplicates()?;
        build(
            &self.name,
            self.places.iter().map(PlaceDef::to_place),
            self.transitions.iter().cloned(),
            self.arcs.iter().cloned(),
        )
    }

    /// Build and validate the net, moving the definitions out of the document
    pub fn into_net(self) -> Result<Net> {
        self.check_duplicates()?;
        let NetDocument {
            name,
            places,
            transitions,
            arcs,
            ..
        } = self;
        build(&name, places.into_iter().map(Place::from), transitions, arcs)
    }

    fn check_duplicates(&self) -> Result<()> {
        let mut nodes = HashSet::new();
        let node_ids = self
            .places
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.transitions.iter().map(|t| t.id.as_str()));
        for id in node_ids {
            if !nodes.insert(id) {
                return Err(Error::DuplicateDefinition(id.to_string()));
            }
        }

        let mut arcs = HashSet::new();
        for arc in &self.arcs {
            if !arcs.insert(arc.id.as_str()) {
                return Err(Error::DuplicateDefinition(arc.id.to_string()));
            }
        }
        Ok(())
    }
}

fn build(
    name: &str,
    places: impl IntoIterator<Item = Place>,
    transitions: impl IntoIterator<Item = Transition>,
    arcs: impl IntoIterator<Item = Arc>,
) -> Result<Net> {
    let mut net = Net::new();
    for place in places {
        net.add_place(place)?;
    }
    for transition in transitions {
        net.add_transition(transition)?;
    }
    for arc in arcs {
        net.add_arc(arc)?;
    }
    net.validate()?;

    tracing::debug!(
        name = %name,
        places = net.place_count(),
        transitions = net.transition_count(),
        "built net from document"
    );
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petriflow_core::{NetView, TransitionKind};

    fn document() -> NetDocument {
        NetDocument {
            name: "chain".to_string(),
            places: vec![
                PlaceDef {
                    id: PlaceId::new("P1"),
                    label: None,
                    initial_marking: 2.0,
                    tokens: None,
                },
                PlaceDef {
                    id: PlaceId::new("P2"),
                    label: Some("product".to_string()),
                    initial_marking: 0.0,
                    tokens: None,
                },
            ],
            transitions: vec![Transition::immediate("T1")],
            arcs: vec![Arc::new("A1", "P1", "T1"), Arc::new("A2", "T1", "P2")],
            simulation: None,
        }
    }

    #[test]
    fn test_to_net() {
        let net = document().into_net().unwrap();
        assert_eq!(net.marking(), vec![2.0, 0.0]);
        assert_eq!(net.place_index_by_name("product"), Some(1));
        assert_eq!(
            net.transition(&"T1".into()).map(|t| t.kind),
            Some(TransitionKind::Immediate)
        );
    }

    #[test]
    fn test_into_net_matches_to_net() {
        let mut doc = document();
        doc.places[0].tokens = Some(1.0);
        let borrowed = doc.to_net().unwrap();
        let owned = doc.into_net().unwrap();
        assert_eq!(owned, borrowed);
        assert_eq!(owned.place_tokens(&PlaceId::new("P1")).unwrap(), 1.0);
        assert_eq!(owned.place(&PlaceId::new("P1")).map(|p| p.initial_marking), Some(2.0));

        let mut doc = document();
        doc.arcs.push(Arc::new("A2", "P2", "T1"));
        assert!(matches!(doc.into_net(), Err(Error::DuplicateDefinition(_))));
    }

    #[test]
    fn test_from_net_captures_current_tokens() {
        let mut net = document().into_net().unwrap();
        net.set_tokens(&PlaceId::new("P1"), 1.0).unwrap();

        let snapshot = NetDocument::from_net("snapshot", &net);
        assert_eq!(snapshot.places[0].tokens, Some(1.0));
        assert_eq!(snapshot.places[1].tokens, None);

        let restored = snapshot.into_net().unwrap();
        assert_eq!(restored, net);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut doc = document();
        doc.transitions.push(Transition::immediate("P1"));
        assert!(matches!(
            doc.to_net(),
            Err(Error::DuplicateDefinition(id)) if id == "P1"
        ));

        let mut doc = document();
        doc.arcs.push(Arc::new("A1", "P2", "T1"));
        assert!(matches!(doc.to_net(), Err(Error::DuplicateDefinition(_))));
    }

    #[test]
    fn test_dangling_arc_rejected() {
        let mut doc = document();
        doc.arcs.push(Arc::new("A3", "T1", "P9"));
        assert!(matches!(
            doc.to_net(),
            Err(Error::Core(petriflow_core::Error::DanglingReference { .. }))
        ));
    }

    #[test]
    fn test_config_defaults_without_simulation() {
        let doc = document();
        assert_eq!(doc.config(), EngineConfig::default());
        let doc = doc.with_simulation(EngineConfig::default().with_seed(3));
        assert_eq!(doc.config().seed, 3);
    }
}
