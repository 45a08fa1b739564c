// src/arrange/event.rs

//! Arrangement event stream

use super::Arrangement;
use crate::location::ProducerId;
use crate::spec::{ParamValue, ResolvedFeatureId, SpecId};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::iter::FusedIterator;

/// One notification of the arranged output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ArrangementEvent {
    BranchStart { branch: String, batch: bool },
    BatchStart,
    /// The producer of the following specs changed
    FeaturePack { producer: ProducerId },
    /// The spec of the following features changed
    Spec { spec: SpecId },
    Feature {
        id: ResolvedFeatureId,
        params: BTreeMap<String, ParamValue>,
    },
    BatchEnd,
    BranchEnd { branch: String },
}

/// Lazy single-pass walk over an arrangement
///
/// Holds at most the handful of events produced for one feature.
pub struct EventStream<'a> {
    arrangement: &'a Arrangement,
    /// Position in the branch order
    position: usize,
    /// Next feature within the current branch
    feature: usize,
    in_branch: bool,
    last_producer: Option<&'a ProducerId>,
    last_spec: Option<&'a SpecId>,
    pending: VecDeque<ArrangementEvent>,
}

impl<'a> EventStream<'a> {
    pub(super) fn new(arrangement: &'a Arrangement) -> Self {
        Self {
            arrangement,
            position: 0,
            feature: 0,
            in_branch: false,
            last_producer: None,
            last_spec: None,
            pending: VecDeque::with_capacity(4),
        }
    }
}

impl<'a> Iterator for EventStream<'a> {
    type Item = ArrangementEvent;

    fn next(&mut self) -> Option<ArrangementEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            let arrangement = self.arrangement;
            let branch_index = *arrangement.order.get(self.position)?;
            let branch = &arrangement.branches[branch_index];

            if !self.in_branch {
                self.in_branch = true;
                self.feature = 0;
                self.last_producer = None;
                self.last_spec = None;
                self.pending.push_back(ArrangementEvent::BranchStart {
                    branch: branch.label.clone(),
                    batch: branch.batch,
                });
                if branch.batch {
                    self.pending.push_back(ArrangementEvent::BatchStart);
                }
                continue;
            }

            if let Some(&index) = branch.features.get(self.feature) {
                self.feature += 1;
                let instance = &arrangement.instances[index];
                let spec = &instance.id.spec;
                if self.last_producer != Some(&spec.producer) {
                    self.last_producer = Some(&spec.producer);
                    self.pending.push_back(ArrangementEvent::FeaturePack {
                        producer: spec.producer.clone(),
                    });
                }
                if self.last_spec != Some(spec) {
                    self.last_spec = Some(spec);
                    self.pending
                        .push_back(ArrangementEvent::Spec { spec: spec.clone() });
                }
                self.pending.push_back(ArrangementEvent::Feature {
                    id: instance.id.clone(),
                    params: instance.params.clone(),
                });
                continue;
            }

            if branch.batch {
                self.pending.push_back(ArrangementEvent::BatchEnd);
            }
            self.pending.push_back(ArrangementEvent::BranchEnd {
                branch: branch.label.clone(),
            });
            self.in_branch = false;
            self.position += 1;
        }
    }
}

impl FusedIterator for EventStream<'_> {}
