//! Per-place token history
//!
//! Each place keeps a `(time, tokens)` sample per step. With a sample limit
//! the history behaves like a ring buffer: old samples are dropped as new
//! ones arrive.

use crate::TraceConfig;
use indexmap::IndexMap;
use petriflow_core::{Net, PlaceId};
use std::collections::VecDeque;

/// Bounded sequence of `(time, tokens)` samples for one place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenTrace {
    samples: VecDeque<(f64, f64)>,
    capacity: Option<usize>,
}

impl TokenTrace {
    /// Create an empty trace, optionally bounded
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, time: f64, tokens: f64) {
        if let Some(capacity) = self.capacity {
            while self.samples.len() >= capacity {
                self.samples.pop_front();
            }
        }
        self.samples.push_back((time, tokens));
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples.iter().copied()
    }

    /// Copy the samples out
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        self.iter().collect()
    }

    /// Most recent sample
    pub fn last(&self) -> Option<(f64, f64)> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Traces for every place of a net
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    config: TraceConfig,
    traces: IndexMap<PlaceId, TokenTrace>,
}

impl TraceRecorder {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config,
            traces: IndexMap::new(),
        }
    }

    /// Drop all history and take the initial sample
    pub fn restart(&mut self, net: &Net, time: f64) {
        self.traces.clear();
        if !self.config.enabled {
            return;
        }
        for place in net.places() {
            self.traces
                .insert(place.id.clone(), TokenTrace::new(self.config.max_samples));
        }
        self.record(net, time);
    }

    /// Sample every place
    pub fn record(&mut self, net: &Net, time: f64) {
        if !self.config.enabled {
            return;
        }
        for place in net.places() {
            let capacity = self.config.max_samples;
            self.traces
                .entry(place.id.clone())
                .or_insert_with(|| TokenTrace::new(capacity))
                .push(time, place.tokens);
        }
    }

    /// Trace of one place
    pub fn get(&self, place: &PlaceId) -> Option<&TokenTrace> {
        self.traces.get(place)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
