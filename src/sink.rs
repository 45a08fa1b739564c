// src/sink.rs

//! Arrangement sinks
//!
//! A sink receives the arranged event stream one event at a time, in order.
//! Downstream installation and diffing logic implements [`ArrangementSink`];
//! this module ships the implementations the library itself needs:
//! - `CollectingSink`: keeps every event, for tests and JSON output
//! - `LogSink`: logs the stream to tracing
//! - `CallbackSink`: forwards each event to a closure
//! - `SilentSink`: counts events and drops them
//!
//! # Example
//!
//! ```ignore
//! use fpack::sink::{ArrangementSink, LogSink};
//!
//! let arrangement = fpack::arrange(&features, &registry)?;
//! let mut sink = LogSink::new("standalone");
//! arrangement.emit(&mut sink);
//! ```

use crate::arrange::ArrangementEvent;
use crate::location::ProducerId;
use crate::spec::{ParamValue, ResolvedFeatureId, SpecId};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Receiver of arrangement events
///
/// Every method has an empty default, so an implementation only overrides
/// the notifications it cares about. `handle` dispatches an event to them.
pub trait ArrangementSink {
    fn branch_start(&mut self, _branch: &str, _batch: bool) {}

    fn batch_start(&mut self) {}

    fn feature_pack(&mut self, _producer: &ProducerId) {}

    fn spec(&mut self, _spec: &SpecId) {}

    fn feature(&mut self, _id: &ResolvedFeatureId, _params: &BTreeMap<String, ParamValue>) {}

    fn batch_end(&mut self) {}

    fn branch_end(&mut self, _branch: &str) {}

    /// Dispatch one event to the matching notification
    fn handle(&mut self, event: &ArrangementEvent) {
        match event {
            ArrangementEvent::BranchStart { branch, batch } => self.branch_start(branch, *batch),
            ArrangementEvent::BatchStart => self.batch_start(),
            ArrangementEvent::FeaturePack { producer } => self.feature_pack(producer),
            ArrangementEvent::Spec { spec } => self.spec(spec),
            ArrangementEvent::Feature { id, params } => self.feature(id, params),
            ArrangementEvent::BatchEnd => self.batch_end(),
            ArrangementEvent::BranchEnd { branch } => self.branch_end(branch),
        }
    }
}

/// Sink that drops events
#[derive(Debug, Default)]
pub struct SilentSink {
    events: usize,
}

impl SilentSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events received
    pub fn count(&self) -> usize {
        self.events
    }
}

impl ArrangementSink for SilentSink {
    fn handle(&mut self, _event: &ArrangementEvent) {
        self.events += 1;
    }
}

/// Sink that stores every event
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Vec<ArrangementEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ArrangementEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ArrangementEvent> {
        self.events
    }

    /// Feature ids in the order they were received
    pub fn feature_ids(&self) -> Vec<&ResolvedFeatureId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ArrangementEvent::Feature { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl ArrangementSink for CollectingSink {
    fn handle(&mut self, event: &ArrangementEvent) {
        self.events.push(event.clone());
    }
}

/// Sink that logs the stream
///
/// Branch boundaries go to info level, everything else to debug.
#[derive(Debug)]
pub struct LogSink {
    name: String,
    features: usize,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: 0,
        }
    }

    /// Number of features logged so far
    pub fn feature_count(&self) -> usize {
        self.features
    }
}

impl ArrangementSink for LogSink {
    fn branch_start(&mut self, branch: &str, batch: bool) {
        if batch {
            info!("{}: branch {} (batch)", self.name, branch);
        } else {
            info!("{}: branch {}", self.name, branch);
        }
    }

    fn feature_pack(&mut self, producer: &ProducerId) {
        debug!("{}: feature-pack {}", self.name, producer);
    }

    fn spec(&mut self, spec: &SpecId) {
        debug!("{}: spec {}", self.name, spec);
    }

    fn feature(&mut self, id: &ResolvedFeatureId, _params: &BTreeMap<String, ParamValue>) {
        self.features += 1;
        debug!("{}: feature {}", self.name, id);
    }

    fn branch_end(&mut self, branch: &str) {
        debug!("{}: end of branch {}", self.name, branch);
    }
}

/// Sink that forwards each event to a closure
pub struct CallbackSink<F>
where
    F: FnMut(&ArrangementEvent),
{
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: FnMut(&ArrangementEvent),
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ArrangementSink for CallbackSink<F>
where
    F: FnMut(&ArrangementEvent),
{
    fn handle(&mut self, event: &ArrangementEvent) {
        (self.callback)(event);
    }
}
