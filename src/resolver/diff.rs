// src/resolver/diff.rs

//! Differences between two provisioning layouts
//!
//! Used by editing sessions to report what a config change did, and handed to
//! diff hooks.

use super::{FeaturePackLayout, ProvisioningLayout};
use crate::location::{FeaturePackId, ProducerId};
use serde::Serialize;

/// A change to one producer between two layouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "kebab-case")]
pub enum LayoutChange {
    /// Feature-pack is new
    Added { fpid: FeaturePackId },

    /// Feature-pack is gone
    Removed { fpid: FeaturePackId },

    /// Same producer, different build
    Updated {
        from: FeaturePackId,
        to: FeaturePackId,
    },

    /// Same build, different package set
    PackagesChanged {
        fpid: FeaturePackId,
        added: Vec<String>,
        removed: Vec<String>,
    },

    /// Patch list of a feature-pack changed
    PatchesChanged {
        fpid: FeaturePackId,
        patches: Vec<FeaturePackId>,
    },
}

impl LayoutChange {
    /// Producer this change affects
    pub fn producer(&self) -> &ProducerId {
        match self {
            LayoutChange::Added { fpid } => &fpid.producer,
            LayoutChange::Removed { fpid } => &fpid.producer,
            LayoutChange::Updated { to, .. } => &to.producer,
            LayoutChange::PackagesChanged { fpid, .. } => &fpid.producer,
            LayoutChange::PatchesChanged { fpid, .. } => &fpid.producer,
        }
    }

    /// Whether a feature-pack enters or leaves the layout
    pub fn is_structural(&self) -> bool {
        matches!(self, LayoutChange::Added { .. } | LayoutChange::Removed { .. })
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        match self {
            LayoutChange::Added { fpid } => format!("Add {}", fpid),
            LayoutChange::Removed { fpid } => format!("Remove {}", fpid),
            LayoutChange::Updated { from, to } => {
                format!("Update {} ({} -> {})", to.producer, from.build, to.build)
            }
            LayoutChange::PackagesChanged {
                fpid,
                added,
                removed,
            } => {
                let mut desc = format!("Packages of {}:", fpid);
                for name in added {
                    desc.push_str(&format!(" +{}", name));
                }
                for name in removed {
                    desc.push_str(&format!(" -{}", name));
                }
                desc
            }
            LayoutChange::PatchesChanged { fpid, patches } => {
                let names: Vec<String> = patches.iter().map(ToString::to_string).collect();
                format!("Patches of {}: [{}]", fpid, names.join(", "))
            }
        }
    }
}

/// All changes between an older and a newer layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutDiff {
    pub changes: Vec<LayoutChange>,
}

impl LayoutDiff {
    /// Compare two layouts; changes follow the newer layout's order, removals last
    pub fn between(older: &ProvisioningLayout, newer: &ProvisioningLayout) -> Self {
        let mut changes = Vec::new();

        for fp in newer.ordered_feature_packs() {
            match older.feature_pack(fp.producer()) {
                None => changes.push(LayoutChange::Added {
                    fpid: fp.fpid().clone(),
                }),
                Some(old) if old.fpid() != fp.fpid() => changes.push(LayoutChange::Updated {
                    from: old.fpid().clone(),
                    to: fp.fpid().clone(),
                }),
                Some(old) => {
                    let added = missing_from(fp, old);
                    let removed = missing_from(old, fp);
                    if !added.is_empty() || !removed.is_empty() {
                        changes.push(LayoutChange::PackagesChanged {
                            fpid: fp.fpid().clone(),
                            added,
                            removed,
                        });
                    }
                }
            }

            let old_patches = older.patches_for(fp.fpid());
            let new_patches = newer.patches_for(fp.fpid());
            let ids = |patches: &[FeaturePackLayout]| -> Vec<FeaturePackId> {
                patches.iter().map(|p| p.fpid().clone()).collect()
            };
            if ids(old_patches) != ids(new_patches) {
                changes.push(LayoutChange::PatchesChanged {
                    fpid: fp.fpid().clone(),
                    patches: ids(new_patches),
                });
            }
        }

        for fp in older.ordered_feature_packs() {
            if newer.feature_pack(fp.producer()).is_none() {
                changes.push(LayoutChange::Removed {
                    fpid: fp.fpid().clone(),
                });
            }
        }

        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Count of added and removed feature-packs
    pub fn structural_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_structural()).count()
    }
}

/// Packages of `a` that `b` does not have
fn missing_from(a: &FeaturePackLayout, b: &FeaturePackLayout) -> Vec<String> {
    a.packages()
        .iter()
        .filter(|name| !b.has_package(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeaturePackDependencyConfig, ProvisioningConfig};
    use crate::location::FeaturePackLocation;
    use crate::resolver::resolve;
    use crate::spec::{FeaturePackSpec, PackageSpec};
    use crate::universe::Catalog;

    fn fpid(s: &str) -> FeaturePackId {
        FeaturePackId::parse(s).unwrap()
    }

    fn dep(s: &str) -> FeaturePackDependencyConfig {
        FeaturePackDependencyConfig::new(FeaturePackLocation::parse(s).unwrap())
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .with(
                FeaturePackSpec::new(fpid("core@u#1"))
                    .with_package(PackageSpec::new("a"))
                    .with_package(PackageSpec::new("b")),
            )
            .with(FeaturePackSpec::new(fpid("core@u#2")).with_package(PackageSpec::new("a")))
            .with(FeaturePackSpec::new(fpid("extra@u#1")))
    }

    #[test]
    fn test_identical_layouts() {
        let config = ProvisioningConfig::new().with_dependency(dep("core@u#1"));
        let layout = resolve(&catalog(), &config).unwrap();
        assert!(layout.diff(&layout).is_empty());
    }

    #[test]
    fn test_added_and_removed() {
        let catalog = catalog();
        let older = resolve(&catalog, &ProvisioningConfig::new().with_dependency(dep("core@u#1"))).unwrap();
        let newer = resolve(&catalog, &ProvisioningConfig::new().with_dependency(dep("extra@u#1"))).unwrap();

        let diff = older.diff(&newer);
        assert_eq!(
            diff.changes,
            vec![
                LayoutChange::Added { fpid: fpid("extra@u#1") },
                LayoutChange::Removed { fpid: fpid("core@u#1") },
            ]
        );
        assert_eq!(diff.structural_count(), 2);
    }

    #[test]
    fn test_updated_and_packages() {
        let catalog = catalog();
        let v1 = resolve(&catalog, &ProvisioningConfig::new().with_dependency(dep("core@u#1"))).unwrap();
        let v2 = resolve(&catalog, &ProvisioningConfig::new().with_dependency(dep("core@u#2"))).unwrap();
        let v1_trimmed = resolve(
            &catalog,
            &ProvisioningConfig::new().with_dependency(dep("core@u#1").exclude("b")),
        )
        .unwrap();

        let diff = v1.diff(&v2);
        assert_eq!(diff.changes[0].description(), "Update core@u (1 -> 2)");

        let diff = v1.diff(&v1_trimmed);
        assert_eq!(
            diff.changes,
            vec![LayoutChange::PackagesChanged {
                fpid: fpid("core@u#1"),
                added: vec![],
                removed: vec!["b".to_string()],
            }]
        );
    }
}
