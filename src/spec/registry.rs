// src/spec/registry.rs

//! Feature spec registry
//!
//! An explicit, caller-owned lookup table of feature specs keyed by producer
//! and spec name. The arranger receives it as an argument; there is no
//! process-wide cache.

use super::{FeatureSpec, SpecId};
use crate::location::ProducerId;
use crate::resolver::ProvisioningLayout;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct FeatureSpecRegistry {
    specs: BTreeMap<SpecId, Arc<FeatureSpec>>,
}

impl FeatureSpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the feature specs of every feature-pack in a layout
    ///
    /// When a patch redefines a spec of its target, the patch version wins.
    pub fn from_layout(layout: &ProvisioningLayout) -> Self {
        let mut registry = Self::new();
        for fp in layout.ordered_feature_packs() {
            let producer = &fp.fpid().producer;
            for spec in &fp.spec().features {
                registry.register(producer.clone(), spec.clone());
            }
            for patch in layout.patches_for(fp.fpid()) {
                for spec in &patch.spec().features {
                    debug!("Patch {} overrides feature spec {}", patch.fpid(), spec.name);
                    registry.register(producer.clone(), spec.clone());
                }
            }
        }
        registry
    }

    /// Register a spec, replacing any previous spec with the same id
    pub fn register(&mut self, producer: ProducerId, spec: FeatureSpec) -> SpecId {
        let id = SpecId::new(producer, spec.name.clone());
        self.specs.insert(id.clone(), Arc::new(spec));
        id
    }

    pub fn get(&self, id: &SpecId) -> Option<&Arc<FeatureSpec>> {
        self.specs.get(id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpecId, &Arc<FeatureSpec>)> {
        self.specs.iter()
    }
}
