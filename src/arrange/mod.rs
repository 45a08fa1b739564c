// src/arrange/mod.rs

//! Capability-ordered feature arrangement
//!
//! Takes a flattened, declaration-ordered feature list and produces branches
//! in an order where every feature requiring a capability comes after every
//! feature providing it. The result is consumed as a lazy event stream or
//! pushed into an [`ArrangementSink`].
//!
//! Arrangement is deterministic: ordered maps only, declaration order as the
//! only tie-break.

mod branch;
mod event;
mod instance;
mod schedule;

pub use branch::{Branch, BranchKey};
pub use event::{ArrangementEvent, EventStream};
pub use instance::{FeatureInstance, Requirement};
pub use schedule::ProviderIndex;

use crate::error::ArrangementError;
use crate::model::FeatureConfig;
use crate::sink::ArrangementSink;
use crate::spec::{FeatureSpecRegistry, ResolvedFeatureId};
use serde::Serialize;
use tracing::{debug, info};

/// Scheduled branches of one feature list
#[derive(Debug, Clone, Serialize)]
pub struct Arrangement {
    instances: Vec<FeatureInstance>,
    branches: Vec<Branch>,
    /// Branch indices in execution order
    order: Vec<usize>,
    #[serde(skip)]
    providers: ProviderIndex,
}

impl Arrangement {
    /// Instances in declaration order
    pub fn instances(&self) -> &[FeatureInstance] {
        &self.instances
    }

    /// Branches in index (first declaration) order
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Branches in execution order
    pub fn ordered_branches(&self) -> impl Iterator<Item = &Branch> {
        self.order.iter().map(|&b| &self.branches[b])
    }

    pub fn instance(&self, id: &ResolvedFeatureId) -> Option<&FeatureInstance> {
        self.instances.iter().find(|i| &i.id == id)
    }

    /// Execution position of the branch holding a feature
    pub fn branch_position(&self, id: &ResolvedFeatureId) -> Option<usize> {
        let instance = self.instance(id)?;
        self.order.iter().position(|&b| b == instance.branch)
    }

    /// Instances providing a capability, in declaration order
    pub fn providers_of(&self, capability: &str) -> impl Iterator<Item = &FeatureInstance> {
        self.providers
            .get(capability)
            .into_iter()
            .flatten()
            .map(|&i| &self.instances[i])
    }

    /// Lazy event stream in execution order
    pub fn events(&self) -> EventStream<'_> {
        EventStream::new(self)
    }

    /// Push every event into a sink
    pub fn emit(&self, sink: &mut dyn ArrangementSink) {
        for event in self.events() {
            sink.handle(&event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Arranges feature lists against a spec registry
pub struct Arranger<'r> {
    registry: &'r FeatureSpecRegistry,
}

impl<'r> Arranger<'r> {
    pub fn new(registry: &'r FeatureSpecRegistry) -> Self {
        Self { registry }
    }

    pub fn arrange(&self, features: &[FeatureConfig]) -> Result<Arrangement, ArrangementError> {
        let mut instances = instance::resolve_instances(features, self.registry)?;
        let providers = schedule::index_providers(&instances);
        schedule::check_providers(&instances, &providers)?;

        let branches = branch::partition(&mut instances);
        debug!(
            "Partitioned {} features into {} branches",
            instances.len(),
            branches.len()
        );

        let order = schedule::schedule(&instances, &branches, &providers)?;
        info!("Arranged {} features in {} branches", instances.len(), order.len());

        Ok(Arrangement {
            instances,
            branches,
            order,
            providers,
        })
    }
}

/// Arrange a flattened feature list
pub fn arrange(
    features: &[FeatureConfig],
    registry: &FeatureSpecRegistry,
) -> Result<Arrangement, ArrangementError> {
    Arranger::new(registry).arrange(features)
}
