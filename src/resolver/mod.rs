// src/resolver/mod.rs

//! Feature-pack layout resolution
//!
//! Turns a provisioning config into one ordered list of feature-pack layouts:
//! the transitive closure of the declared dependencies, with repeated
//! producers merged, dependencies placed before their dependents, package
//! sets resolved inside every feature-pack and patches moved into a side
//! table keyed by the FPID they overlay.
//!
//! Resolution is a pure function of the config and the artifact resolver's
//! answers. Every call rebuilds the layout from scratch.

mod diff;
mod graph;
mod layout;
mod merge;
mod packages;

pub use diff::{LayoutChange, LayoutDiff};
pub use graph::DependencyGraph;
pub use layout::LayoutResolver;
pub use merge::PackageOverrides;
pub use packages::PackageKey;

use crate::error::ResolutionError;
use crate::location::{FeaturePackId, ProducerId};
use crate::model::{PackageRef, ProvisioningConfig};
use crate::spec::FeaturePackSpec;
use crate::universe::ArtifactResolver;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumString};

/// Why a feature-pack is part of the layout
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeaturePackRole {
    /// Declared by the user as a direct dependency
    Direct,
    /// Pulled in because something depends on it
    Transitive,
    /// Overlays another feature-pack
    Patch,
}

/// One resolved feature-pack
#[derive(Debug, Clone, Serialize)]
pub struct FeaturePackLayout {
    fpid: FeaturePackId,
    role: FeaturePackRole,
    #[serde(skip)]
    spec: Arc<FeaturePackSpec>,
    inherit_packages: bool,
    inherit_configs: bool,
    included: Vec<PackageRef>,
    excluded: BTreeSet<String>,
    /// Resolved package set, dependencies first
    packages: Vec<String>,
}

impl FeaturePackLayout {
    pub(crate) fn new(
        fpid: FeaturePackId,
        role: FeaturePackRole,
        spec: Arc<FeaturePackSpec>,
    ) -> Self {
        Self {
            fpid,
            role,
            spec,
            inherit_packages: true,
            inherit_configs: true,
            included: Vec::new(),
            excluded: BTreeSet::new(),
            packages: Vec::new(),
        }
    }

    pub fn fpid(&self) -> &FeaturePackId {
        &self.fpid
    }

    pub fn producer(&self) -> &ProducerId {
        &self.fpid.producer
    }

    pub fn role(&self) -> FeaturePackRole {
        self.role
    }

    pub fn spec(&self) -> &Arc<FeaturePackSpec> {
        &self.spec
    }

    pub fn inherit_packages(&self) -> bool {
        self.inherit_packages
    }

    pub fn inherit_configs(&self) -> bool {
        self.inherit_configs
    }

    /// Merged explicitly included packages
    pub fn included_packages(&self) -> &[PackageRef] {
        &self.included
    }

    /// Merged excluded package names
    pub fn excluded_packages(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    /// Resolved package names, dependencies before dependents
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p == name)
    }

    /// Extra parameters given to an included package
    pub fn package_params(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.included
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.params)
    }
}

/// Result of a resolution pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisioningLayout {
    ordered: Vec<FeaturePackLayout>,
    patches: BTreeMap<FeaturePackId, Vec<FeaturePackLayout>>,
}

impl ProvisioningLayout {
    /// All non-patch feature-packs, dependencies first
    pub fn ordered_feature_packs(&self) -> &[FeaturePackLayout] {
        &self.ordered
    }

    /// Patches applied to a feature-pack, in declaration order
    pub fn patches_for(&self, fpid: &FeaturePackId) -> &[FeaturePackLayout] {
        self.patches.get(fpid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The whole patch table
    pub fn patches(&self) -> &BTreeMap<FeaturePackId, Vec<FeaturePackLayout>> {
        &self.patches
    }

    pub fn feature_pack(&self, producer: &ProducerId) -> Option<&FeaturePackLayout> {
        self.ordered.iter().find(|fp| fp.producer() == producer)
    }

    /// Position of a producer in the ordered list
    pub fn position(&self, producer: &ProducerId) -> Option<usize> {
        self.ordered.iter().position(|fp| fp.producer() == producer)
    }

    pub fn fpids(&self) -> impl Iterator<Item = &FeaturePackId> {
        self.ordered.iter().map(FeaturePackLayout::fpid)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Compare against a newer layout
    pub fn diff(&self, newer: &ProvisioningLayout) -> LayoutDiff {
        LayoutDiff::between(self, newer)
    }
}

/// Resolve a provisioning config against an artifact resolver
pub fn resolve<R: ArtifactResolver + ?Sized>(
    artifacts: &R,
    config: &ProvisioningConfig,
) -> Result<ProvisioningLayout, ResolutionError> {
    LayoutResolver::new(artifacts).resolve(config)
}
