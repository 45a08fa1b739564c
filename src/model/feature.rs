// src/model/feature.rs

//! Feature instances declared in a config

use crate::spec::{ParamValue, ResolvedFeatureId, SpecId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A concrete feature: a spec plus parameter values
///
/// The arranger receives these already flattened (feature-group includes and
/// excludes applied), in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub spec: SpecId,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Identity of the parent feature, for nested features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResolvedFeatureId>,
    /// Explicit named branch for this instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl FeatureConfig {
    pub fn new(spec: SpecId) -> Self {
        Self {
            spec,
            params: BTreeMap::new(),
            parent: None,
            branch: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: ResolvedFeatureId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn in_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}
