// src/spec/feature.rs

//! Feature specs and feature identities

use super::PackageDependencySpec;
use super::capability::CapabilityTemplate;
use crate::location::ProducerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A feature spec name scoped to the producer that ships it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecId {
    pub producer: ProducerId,
    pub name: String,
}

impl SpecId {
    pub fn new(producer: ProducerId, name: impl Into<String>) -> Self {
        Self {
            producer,
            name: name.into(),
        }
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.producer, self.name)
    }
}

/// A parameter value: a single string or a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    /// Iterate the elements; a scalar yields itself once
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            ParamValue::Scalar(value) => std::slice::from_ref(value),
            ParamValue::List(values) => values,
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Scalar(value) => write!(f, "{}", value),
            ParamValue::List(values) => write!(f, "[{}]", values.join(",")),
        }
    }
}

/// Declaration of one feature parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParamSpec {
    pub name: String,
    /// Part of the feature identity
    #[serde(default)]
    pub feature_id: bool,
    /// May be left unset
    #[serde(default)]
    pub nillable: bool,
    #[serde(default)]
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_id: false,
            nillable: false,
            default: None,
        }
    }

    /// Identity parameter
    pub fn id(name: impl Into<String>) -> Self {
        Self {
            feature_id: true,
            ..Self::new(name)
        }
    }

    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Steers which branch the arranger places a feature in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BranchAnnotation {
    /// Features naming the same branch share it
    FeatureBranch {
        name: String,
        #[serde(default)]
        batch: bool,
    },
    /// All instances of the spec share a branch (`per_spec`), or each
    /// contiguous run of instances gets a fresh one
    #[serde(rename_all = "kebab-case")]
    SpecBranch {
        #[serde(default = "default_per_spec")]
        per_spec: bool,
        #[serde(default)]
        batch: bool,
    },
    /// Children of features of this spec join their parent's branch
    ParentChildren,
}

fn default_per_spec() -> bool {
    true
}

/// A typed, parameterized configuration unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureSpec {
    pub name: String,
    #[serde(default, rename = "param")]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub provides: Vec<CapabilityTemplate>,
    #[serde(default)]
    pub requires: Vec<CapabilityTemplate>,
    #[serde(default)]
    pub packages: Vec<PackageDependencySpec>,
    #[serde(default, rename = "annotation")]
    pub annotations: Vec<BranchAnnotation>,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            provides: Vec::new(),
            requires: Vec::new(),
            packages: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Add a provided capability template such as `org.server.$name`
    pub fn provides(mut self, template: &str) -> Self {
        self.provides.push(CapabilityTemplate::parse(template));
        self
    }

    /// Add a required capability template; a leading `?` makes it optional
    pub fn requires(mut self, template: &str) -> Self {
        self.requires.push(CapabilityTemplate::parse(template));
        self
    }

    pub fn with_package(mut self, package: PackageDependencySpec) -> Self {
        self.packages.push(package);
        self
    }

    pub fn annotate(mut self, annotation: BranchAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn id_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.feature_id)
    }

    /// The first feature-branch annotation, if any
    pub fn feature_branch(&self) -> Option<(&str, bool)> {
        self.annotations.iter().find_map(|a| match a {
            BranchAnnotation::FeatureBranch { name, batch } => Some((name.as_str(), *batch)),
            _ => None,
        })
    }

    /// The first spec-branch annotation as `(per_spec, batch)`, if any
    pub fn spec_branch(&self) -> Option<(bool, bool)> {
        self.annotations.iter().find_map(|a| match a {
            BranchAnnotation::SpecBranch { per_spec, batch } => Some((*per_spec, *batch)),
            _ => None,
        })
    }

    pub fn groups_children(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| matches!(a, BranchAnnotation::ParentChildren))
    }
}

/// Identity of a feature instance: its spec plus identity parameter values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedFeatureId {
    pub spec: SpecId,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl ResolvedFeatureId {
    pub fn new(spec: SpecId) -> Self {
        Self {
            spec,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for ResolvedFeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec)?;
        let mut sep = ':';
        for (name, value) in &self.params {
            write!(f, "{}{}={}", sep, name, value)?;
            sep = ',';
        }
        Ok(())
    }
}
