// src/error.rs

//! Error types for layout resolution and feature arrangement
//!
//! Both engines fail fast: the first detected defect aborts the whole call and
//! nothing partial is returned. Every variant carries enough identity
//! (producer, FPID, package, capability, feature id) to render a precise
//! diagnostic.

use crate::location::{FeaturePackId, LocationParseError, ProducerId};
use crate::spec::{ResolvedFeatureId, SpecId};
use std::fmt;
use thiserror::Error;

/// Failure reported by an artifact resolver (universe lookup, fetch)
///
/// The underlying cause is opaque to this crate and is only propagated.
#[derive(Debug)]
pub struct ArtifactError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ArtifactError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Errors produced while resolving a provisioning config into a layout
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Package {package} of {producer} is both included and excluded")]
    PackageOverrideConflict { producer: ProducerId, package: String },

    #[error("Conflicting versions of {producer}: {first} and {second}")]
    ConflictingVersions {
        producer: ProducerId,
        first: String,
        second: String,
    },

    #[error("Package {package} of {feature_pack} references unknown dependency alias '{alias}'")]
    UnknownDependencyAlias {
        feature_pack: FeaturePackId,
        package: String,
        alias: String,
    },

    #[error("Circular package dependency: {}", .cycle.join(" -> "))]
    CircularPackageDependency { cycle: Vec<String> },

    #[error("Package {package} not found in {producer}{}", .required_by.as_ref().map(|r| format!(" (required by {})", r)).unwrap_or_default())]
    PackageNotFound {
        producer: ProducerId,
        package: String,
        required_by: Option<String>,
    },

    #[error("Feature-pack {location} is unavailable: {source}")]
    ArtifactUnavailable {
        location: String,
        #[source]
        source: ArtifactError,
    },

    #[error("No universe bound for producer {producer}")]
    UnknownUniverse { producer: String },

    #[error("Patch {patch} targets {declared:?}, but is attached to {expected}")]
    PatchTargetMismatch {
        patch: FeaturePackId,
        expected: FeaturePackId,
        declared: Option<FeaturePackId>,
    },

    #[error("Patch {patch} targets {target}, which is not part of the installation")]
    PatchTargetNotInstalled {
        patch: FeaturePackId,
        target: FeaturePackId,
    },
}

/// Errors produced while arranging a flattened feature list
#[derive(Debug, Error)]
pub enum ArrangementError {
    #[error("Unknown feature spec {spec}")]
    UnknownFeatureSpec { spec: SpecId },

    #[error("Feature spec {spec} has no parameter '{param}'")]
    UnknownParameter { spec: SpecId, param: String },

    #[error("Feature of spec {spec} is missing identity parameter '{param}'")]
    MissingIdParameter { spec: SpecId, param: String },

    #[error("Feature {feature} is missing required parameter '{param}'")]
    MissingRequiredParameter {
        feature: ResolvedFeatureId,
        param: String,
    },

    #[error("Duplicate feature id {feature}")]
    DuplicateFeatureId { feature: ResolvedFeatureId },

    #[error("Capability {capability} required by {feature} has no provider")]
    MissingCapabilityProvider {
        feature: ResolvedFeatureId,
        capability: String,
    },

    #[error("Capability '{template}' of {feature} references unset parameter '{param}'")]
    UnresolvedCapabilityParameter {
        feature: ResolvedFeatureId,
        template: String,
        param: String,
    },

    #[error("Parent {parent} of {feature} is not declared before it")]
    UnknownParentFeature {
        feature: ResolvedFeatureId,
        parent: ResolvedFeatureId,
    },

    #[error("Cyclic capability dependency between branches: {}", .cycle.join(" -> "))]
    CyclicCapabilityDependency { cycle: Vec<String> },
}

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Arrangement(#[from] ArrangementError),

    #[error(transparent)]
    Location(#[from] LocationParseError),

    #[error(transparent)]
    Model(#[from] crate::model::ModelError),

    #[error(transparent)]
    Session(#[from] crate::session::SessionError),

    #[error(transparent)]
    Hook(#[from] crate::hooks::HookError),
}

/// Result type using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_not_found_message() {
        let err = ResolutionError::PackageNotFound {
            producer: ProducerId::new("core", "u"),
            package: "b".to_string(),
            required_by: Some("core@u/a".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Package b not found in core@u (required by core@u/a)"
        );

        let err = ResolutionError::PackageNotFound {
            producer: ProducerId::new("core", "u"),
            package: "b".to_string(),
            required_by: None,
        };
        assert_eq!(err.to_string(), "Package b not found in core@u");
    }

    #[test]
    fn test_cycle_message() {
        let err = ResolutionError::CircularPackageDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular package dependency: a -> b -> a");
    }

    #[test]
    fn test_artifact_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing archive");
        let err = ResolutionError::ArtifactUnavailable {
            location: "core@u#1".to_string(),
            source: ArtifactError::with_source("fetch failed", io),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "fetch failed");
        assert!(std::error::Error::source(source).is_some());
    }
}
