// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use fpack::model::{FeatureConfig, FeaturePackDependencyConfig};
use fpack::spec::{FeatureSpec, FeatureSpecRegistry, ParamSpec, ResolvedFeatureId, SpecId};
use fpack::{FeaturePackId, FeaturePackLocation, ProducerId, ProvisioningLayout};

/// Universe used by every fixture
pub const UNIVERSE: &str = "test";

pub fn fpid(s: &str) -> FeaturePackId {
    FeaturePackId::parse(s).unwrap()
}

pub fn fpl(s: &str) -> FeaturePackLocation {
    FeaturePackLocation::parse(s).unwrap()
}

pub fn dep(s: &str) -> FeaturePackDependencyConfig {
    FeaturePackDependencyConfig::new(fpl(s))
}

pub fn producer(name: &str) -> ProducerId {
    ProducerId::new(name, UNIVERSE)
}

/// FPIDs of a layout in resolution order
pub fn order(layout: &ProvisioningLayout) -> Vec<String> {
    layout.fpids().map(ToString::to_string).collect()
}

/// Spec id in the fixture producer `core`
pub fn spec_id(name: &str) -> SpecId {
    SpecId::new(producer("core"), name)
}

/// Feature of spec `name` identified by parameter `n`
pub fn feature(name: &str, n: &str) -> FeatureConfig {
    FeatureConfig::new(spec_id(name)).with_param("n", n)
}

pub fn feature_id(name: &str, n: &str) -> ResolvedFeatureId {
    ResolvedFeatureId::new(spec_id(name)).with_param("n", n)
}

/// Registry of `core` specs, each given identity parameter `n`
pub fn registry(specs: Vec<FeatureSpec>) -> FeatureSpecRegistry {
    let mut registry = FeatureSpecRegistry::new();
    for spec in specs {
        registry.register(producer("core"), spec.with_param(ParamSpec::id("n")));
    }
    registry
}
