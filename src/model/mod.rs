// src/model/mod.rs

//! Provisioning model - what the user asks to install
//!
//! A provisioning config lists the feature-packs to install directly (in
//! declaration order, which is the tie-break for resolution order), optional
//! declarations for feature-packs that should only come in transitively, and
//! the universe bindings used to complete producer names.
//!
//! # Example provisioning.toml
//!
//! ```toml
//! [provisioning]
//! version = 1
//!
//! [universes]
//! default = "maven"
//!
//! [[feature-pack]]
//! location = "server@maven:current#27.0.1"
//! exclude = ["docs"]
//! patches = ["server-patch@maven#27.0.1-p1"]
//!
//! [[transitive]]
//! location = "base#3.1"
//! include = ["logging", { name = "metrics", params = { level = "full" } }]
//! ```

mod feature;
pub mod parser;

pub use feature::FeatureConfig;
pub use parser::{
    parse_features, parse_features_file, parse_provisioning, parse_provisioning_file,
    FeatureListFile, ProvisioningFile, PROVISIONING_VERSION,
};

use crate::error::ResolutionError;
use crate::location::{FeaturePackId, FeaturePackLocation, ProducerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors that can occur when loading provisioning files
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid provisioning version: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// A package selected explicitly, with optional extra parameters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "PackageRefRepr")]
pub struct PackageRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl PackageRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl From<&str> for PackageRef {
    fn from(name: &str) -> Self {
        PackageRef::new(name)
    }
}

/// Accepts `"name"` as well as `{ name = "...", params = { ... } }`
#[derive(Deserialize)]
#[serde(untagged)]
enum PackageRefRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },
}

impl From<PackageRefRepr> for PackageRef {
    fn from(value: PackageRefRepr) -> Self {
        match value {
            PackageRefRepr::Name(name) => PackageRef::new(name),
            PackageRefRepr::Full { name, params } => PackageRef { name, params },
        }
    }
}

fn default_true() -> bool {
    true
}

/// One dependency edge to a feature-pack, with the overrides it applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeaturePackDependencyConfig {
    pub location: FeaturePackLocation,

    /// Alias external package dependencies use to reach this feature-pack
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default = "default_true")]
    pub inherit_configs: bool,

    /// Install the feature-pack's default packages
    #[serde(default = "default_true")]
    pub inherit_packages: bool,

    #[serde(default, rename = "include", skip_serializing_if = "Vec::is_empty")]
    pub included_packages: Vec<PackageRef>,

    #[serde(default, rename = "exclude", skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded_packages: BTreeSet<String>,

    /// Patches to apply on top of the resolved feature-pack, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<FeaturePackId>,

    /// Only install the feature-pack if something else depends on it
    #[serde(default)]
    pub transitive: bool,
}

impl FeaturePackDependencyConfig {
    pub fn new(location: FeaturePackLocation) -> Self {
        Self {
            location,
            origin: None,
            inherit_configs: true,
            inherit_packages: true,
            included_packages: Vec::new(),
            excluded_packages: BTreeSet::new(),
            patches: Vec::new(),
            transitive: false,
        }
    }

    /// A transitive-only declaration
    pub fn transitive(location: FeaturePackLocation) -> Self {
        Self {
            transitive: true,
            ..Self::new(location)
        }
    }

    pub fn producer(&self) -> &ProducerId {
        &self.location.producer
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn inherit_packages(mut self, inherit: bool) -> Self {
        self.inherit_packages = inherit;
        self
    }

    pub fn inherit_configs(mut self, inherit: bool) -> Self {
        self.inherit_configs = inherit;
        self
    }

    pub fn include(self, name: impl Into<String>) -> Self {
        self.include_ref(PackageRef::new(name))
    }

    /// Include a package; a later include of the same name replaces the params
    pub fn include_ref(mut self, package: PackageRef) -> Self {
        self.included_packages.retain(|p| p.name != package.name);
        self.included_packages.push(package);
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded_packages.insert(name.into());
        self
    }

    pub fn with_patch(mut self, patch: FeaturePackId) -> Self {
        if !self.patches.contains(&patch) {
            self.patches.push(patch);
        }
        self
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.included_packages.iter().any(|p| p.name == name)
    }

    /// A package may not be both included and excluded by one config
    pub fn validate(&self) -> Result<(), ResolutionError> {
        match self
            .included_packages
            .iter()
            .find(|p| self.excluded_packages.contains(&p.name))
        {
            Some(package) => Err(ResolutionError::PackageOverrideConflict {
                producer: self.location.producer.clone(),
                package: package.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Universe names used to complete producer ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseBindings {
    /// Universe for producers that name none
    #[serde(default)]
    pub default: Option<String>,
    /// Alias -> universe
    #[serde(default)]
    pub named: BTreeMap<String, String>,
}

impl UniverseBindings {
    /// Complete a producer id: apply the default universe or expand an alias
    pub fn bind(&self, producer: &ProducerId) -> Result<ProducerId, ResolutionError> {
        match &producer.universe {
            Some(universe) => match self.named.get(universe) {
                Some(bound) => Ok(producer.in_universe(bound.clone())),
                None => Ok(producer.clone()),
            },
            None => match &self.default {
                Some(default) => Ok(producer.in_universe(default.clone())),
                None => Err(ResolutionError::UnknownUniverse {
                    producer: producer.name.clone(),
                }),
            },
        }
    }

    pub fn bind_location(
        &self,
        location: &FeaturePackLocation,
    ) -> Result<FeaturePackLocation, ResolutionError> {
        Ok(FeaturePackLocation {
            producer: self.bind(&location.producer)?,
            ..location.clone()
        })
    }

    pub fn bind_fpid(&self, fpid: &FeaturePackId) -> Result<FeaturePackId, ResolutionError> {
        Ok(FeaturePackId {
            producer: self.bind(&fpid.producer)?,
            ..fpid.clone()
        })
    }
}

/// The full provisioning request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Direct dependencies in declaration order
    #[serde(default)]
    pub dependencies: Vec<FeaturePackDependencyConfig>,
    /// Declarations applied only if the producer is reached transitively
    #[serde(default)]
    pub transitive: Vec<FeaturePackDependencyConfig>,
    #[serde(default)]
    pub universes: UniverseBindings,
}

impl ProvisioningConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_universe(mut self, universe: impl Into<String>) -> Self {
        self.universes.default = Some(universe.into());
        self
    }

    pub fn bind_universe(mut self, alias: impl Into<String>, universe: impl Into<String>) -> Self {
        self.universes.named.insert(alias.into(), universe.into());
        self
    }

    pub fn with_dependency(mut self, dependency: FeaturePackDependencyConfig) -> Self {
        self.add_dependency(dependency);
        self
    }

    pub fn with_transitive(mut self, dependency: FeaturePackDependencyConfig) -> Self {
        self.add_transitive(dependency);
        self
    }

    pub fn add_dependency(&mut self, dependency: FeaturePackDependencyConfig) {
        self.dependencies.push(dependency);
    }

    /// Add a transitive declaration, replacing one for the same producer
    pub fn add_transitive(&mut self, mut dependency: FeaturePackDependencyConfig) {
        dependency.transitive = true;
        self.transitive
            .retain(|d| d.location.producer != dependency.location.producer);
        self.transitive.push(dependency);
    }

    /// Position of the direct dependency on a producer
    pub fn dependency_index(&self, producer: &ProducerId) -> Option<usize> {
        self.dependencies
            .iter()
            .position(|d| &d.location.producer == producer)
    }

    /// Position of the transitive declaration for a producer
    pub fn transitive_index(&self, producer: &ProducerId) -> Option<usize> {
        self.transitive
            .iter()
            .position(|d| &d.location.producer == producer)
    }
}
