// src/resolver/merge.rs

//! Merging of repeated feature-pack occurrences
//!
//! When the closure walk reaches a producer more than once, the package
//! overrides of every occurrence are folded into one set. Unions are taken on
//! both sides; a package that ends up both included and excluded is a
//! conflict, never a silently picked winner.

use crate::error::ResolutionError;
use crate::location::{FeaturePackId, ProducerId};
use crate::model::{FeaturePackDependencyConfig, PackageRef};
use std::collections::BTreeSet;
use tracing::trace;

/// Accumulated package overrides for one producer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOverrides {
    /// Included packages in first-seen order
    pub included: Vec<PackageRef>,
    pub excluded: BTreeSet<String>,
    /// Patches attached to the producer in first-seen order
    pub patches: Vec<FeaturePackId>,
}

impl PackageOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.included.iter().any(|p| p.name == name)
    }

    /// Fold one dependency occurrence into the accumulated overrides
    pub fn merge(
        &mut self,
        producer: &ProducerId,
        occurrence: &FeaturePackDependencyConfig,
    ) -> Result<(), ResolutionError> {
        occurrence.validate()?;

        for package in &occurrence.included_packages {
            match self.included.iter_mut().find(|p| p.name == package.name) {
                Some(existing) => {
                    // Params of a later occurrence add to the earlier ones
                    for (key, value) in &package.params {
                        existing.params.insert(key.clone(), value.clone());
                    }
                }
                None => self.included.push(package.clone()),
            }
        }
        self.excluded
            .extend(occurrence.excluded_packages.iter().cloned());

        for patch in &occurrence.patches {
            if !self.patches.contains(patch) {
                self.patches.push(patch.clone());
            }
        }

        if let Some(package) = self.included.iter().find(|p| self.excluded.contains(&p.name)) {
            return Err(ResolutionError::PackageOverrideConflict {
                producer: producer.clone(),
                package: package.name.clone(),
            });
        }

        trace!(
            "Merged overrides for {}: {} included, {} excluded",
            producer,
            self.included.len(),
            self.excluded.len()
        );
        Ok(())
    }
}
