// src/universe/catalog.rs

//! In-memory feature-pack catalog
//!
//! # Example catalog.toml
//!
//! ```toml
//! [[feature-pack]]
//! fpid = "server@maven:current#27.0.1"
//!
//! [[feature-pack.dependency]]
//! location = "base@maven#3.1"
//! origin = "base"
//!
//! [[feature-pack.package]]
//! name = "web"
//!
//! [[latest]]
//! location = "server@maven:current/final"
//! build = "27.0.1"
//! ```

use super::ArtifactResolver;
use crate::error::ArtifactError;
use crate::location::{FeaturePackId, FeaturePackLocation};
use crate::model::ModelResult;
use crate::spec::FeaturePackSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Explicit latest-build answer for a location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestBuild {
    pub location: FeaturePackLocation,
    pub build: String,
}

/// On-disk form of a catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, rename = "feature-pack")]
    pub feature_packs: Vec<FeaturePackSpec>,
    #[serde(default)]
    pub latest: Vec<LatestBuild>,
}

/// A fixed set of feature-pack specs
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: BTreeMap<FeaturePackId, Arc<FeaturePackSpec>>,
    /// Registration order, newest last
    order: Vec<FeaturePackId>,
    /// Location without build -> build
    latest: BTreeMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec, replacing one with the same FPID
    pub fn add(&mut self, spec: FeaturePackSpec) {
        let fpid = spec.fpid.clone();
        self.order.retain(|f| f != &fpid);
        self.order.push(fpid.clone());
        self.specs.insert(fpid, Arc::new(spec));
    }

    pub fn with(mut self, spec: FeaturePackSpec) -> Self {
        self.add(spec);
        self
    }

    /// Answer version-less lookups of `location` with `build`
    pub fn set_latest(&mut self, location: &FeaturePackLocation, build: impl Into<String>) {
        self.latest
            .insert(location.without_build().to_string(), build.into());
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn from_file_contents(file: CatalogFile) -> Self {
        let mut catalog = Self::new();
        for spec in file.feature_packs {
            catalog.add(spec);
        }
        for latest in file.latest {
            catalog.set_latest(&latest.location, latest.build);
        }
        catalog
    }

    /// Parse a catalog from TOML text
    pub fn parse(content: &str) -> ModelResult<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Ok(Self::from_file_contents(file))
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

impl ArtifactResolver for Catalog {
    fn resolve_location(
        &self,
        location: &FeaturePackLocation,
    ) -> Result<FeaturePackId, ArtifactError> {
        if let Some(fpid) = location.fpid() {
            return Ok(fpid);
        }

        if let Some(build) = self.latest.get(&location.to_string()) {
            debug!("Resolved {} to build {} (explicit latest)", location, build);
            return Ok(FeaturePackId {
                producer: location.producer.clone(),
                channel: location.channel.clone(),
                build: build.clone(),
            });
        }

        self.order
            .iter()
            .rev()
            .find(|fpid| {
                fpid.producer == location.producer
                    && (location.channel.is_none() || fpid.channel == location.channel)
            })
            .cloned()
            .inspect(|fpid| debug!("Resolved {} to {} (newest registered)", location, fpid))
            .ok_or_else(|| ArtifactError::new(format!("No build of {} is available", location)))
    }

    fn load_spec(&self, fpid: &FeaturePackId) -> Result<Arc<FeaturePackSpec>, ArtifactError> {
        self.specs
            .get(fpid)
            .cloned()
            .ok_or_else(|| ArtifactError::new(format!("Feature-pack {} not found in catalog", fpid)))
    }
}
