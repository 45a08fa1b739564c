// src/spec/mod.rs

//! Static feature-pack content
//!
//! A feature-pack spec is what a producer ships: the feature-packs it depends
//! on (each reachable through an origin alias), the packages it defines and
//! the feature specs that configs can instantiate. Patch feature-packs carry
//! the FPID they overlay.

mod capability;
mod feature;
mod registry;

pub use capability::{CapabilityTemplate, TemplateSegment, UnboundParameter};
pub use feature::{
    BranchAnnotation, ParamSpec, ParamValue, FeatureSpec, ResolvedFeatureId, SpecId,
};
pub use registry::FeatureSpecRegistry;

use crate::location::FeaturePackId;
use crate::model::FeaturePackDependencyConfig;
use serde::{Deserialize, Serialize};

/// Producer-declared content of one feature-pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeaturePackSpec {
    pub fpid: FeaturePackId,

    /// Nested feature-pack dependencies, in declaration order
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<FeaturePackDependencyConfig>,

    /// Packages defined by this feature-pack, in declaration order
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageSpec>,

    #[serde(default, rename = "feature")]
    pub features: Vec<FeatureSpec>,

    /// Target of this feature-pack when it is a patch
    #[serde(default)]
    pub patch_for: Option<FeaturePackId>,

    /// Install/diff hook ids this feature-pack needs
    #[serde(default)]
    pub hooks: Vec<String>,
}

impl FeaturePackSpec {
    pub fn new(fpid: FeaturePackId) -> Self {
        Self {
            fpid,
            dependencies: Vec::new(),
            packages: Vec::new(),
            features: Vec::new(),
            patch_for: None,
            hooks: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: FeaturePackDependencyConfig) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_package(mut self, package: PackageSpec) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_feature(mut self, feature: FeatureSpec) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_hook(mut self, id: impl Into<String>) -> Self {
        self.hooks.push(id.into());
        self
    }

    /// Mark this feature-pack as a patch for `target`
    pub fn patching(mut self, target: FeaturePackId) -> Self {
        self.patch_for = Some(target);
        self
    }

    pub fn is_patch(&self) -> bool {
        self.patch_for.is_some()
    }

    /// Look up a package by name
    pub fn package(&self, name: &str) -> Option<&PackageSpec> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Packages installed when the dependency inherits defaults
    pub fn default_packages(&self) -> impl Iterator<Item = &PackageSpec> {
        self.packages.iter().filter(|p| p.default)
    }

    /// Find the nested dependency declared under an origin alias
    pub fn dependency_by_origin(&self, origin: &str) -> Option<&FeaturePackDependencyConfig> {
        self.dependencies
            .iter()
            .find(|d| d.origin.as_deref() == Some(origin))
    }

    pub fn feature_spec(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// A package defined by a feature-pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageSpec {
    pub name: String,
    /// Whether the package is installed when defaults are inherited
    #[serde(default = "default_true")]
    pub default: bool,
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<PackageDependencySpec>,
}

fn default_true() -> bool {
    true
}

impl PackageSpec {
    /// Create a default package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: true,
            dependencies: Vec::new(),
        }
    }

    /// Create a package that is installed only on demand
    pub fn non_default(name: impl Into<String>) -> Self {
        Self {
            default: false,
            ..Self::new(name)
        }
    }

    pub fn with_dependency(mut self, dependency: PackageDependencySpec) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// An edge from one package to another
///
/// Local edges stay inside the feature-pack; external edges name the origin
/// alias of one of the enclosing feature-pack's dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageDependencySpec {
    #[serde(default)]
    pub origin: Option<String>,
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

impl PackageDependencySpec {
    /// Required edge to a package of the same feature-pack
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            origin: None,
            name: name.into(),
            optional: false,
        }
    }

    /// Required edge to a package of the dependency declared as `origin`
    pub fn external(origin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_external(&self) -> bool {
        self.origin.is_some()
    }
}
