// src/universe/mod.rs

//! Universe lookup - the artifact side of layout resolution
//!
//! The layout resolver never fetches anything itself. It asks an
//! [`ArtifactResolver`] to turn a location into a concrete FPID (frequency and
//! latest-build resolution) and to load the spec of a resolved feature-pack.
//! Real deployments back this with a repository client and a local cache;
//! [`Catalog`] is an in-memory implementation for tests and offline use.

mod catalog;

pub use catalog::{Catalog, CatalogFile, LatestBuild};

use crate::error::ArtifactError;
use crate::location::{FeaturePackId, FeaturePackLocation};
use crate::spec::FeaturePackSpec;
use std::sync::Arc;

/// External collaborator resolving locations and loading specs
pub trait ArtifactResolver {
    /// Resolve a location without a build to a concrete FPID
    fn resolve_location(&self, location: &FeaturePackLocation)
        -> Result<FeaturePackId, ArtifactError>;

    /// Load the spec of a resolved feature-pack
    fn load_spec(&self, fpid: &FeaturePackId) -> Result<Arc<FeaturePackSpec>, ArtifactError>;
}

impl<T: ArtifactResolver + ?Sized> ArtifactResolver for &T {
    fn resolve_location(
        &self,
        location: &FeaturePackLocation,
    ) -> Result<FeaturePackId, ArtifactError> {
        (**self).resolve_location(location)
    }

    fn load_spec(&self, fpid: &FeaturePackId) -> Result<Arc<FeaturePackSpec>, ArtifactError> {
        (**self).load_spec(fpid)
    }
}

impl<T: ArtifactResolver + ?Sized> ArtifactResolver for Arc<T> {
    fn resolve_location(
        &self,
        location: &FeaturePackLocation,
    ) -> Result<FeaturePackId, ArtifactError> {
        (**self).resolve_location(location)
    }

    fn load_spec(&self, fpid: &FeaturePackId) -> Result<Arc<FeaturePackSpec>, ArtifactError> {
        (**self).load_spec(fpid)
    }
}
