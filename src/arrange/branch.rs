// src/arrange/branch.rs

//! Branch partitioning
//!
//! Features are assigned to branches in declaration order. The first rule
//! that applies wins:
//!
//! 1. a child joins its parent's branch when either spec groups children
//! 2. an explicit branch name on the config selects a named branch
//! 3. a feature-branch annotation selects a named branch
//! 4. a spec-branch annotation selects the spec's branch, or the branch of
//!    the current contiguous run of that spec
//! 5. otherwise the feature gets a branch of its own
//!
//! Branch indices follow the order in which branches first receive a
//! feature, so index order is declaration order.

use super::instance::FeatureInstance;
use crate::spec::SpecId;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// What a branch was created for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BranchKey {
    /// Shared by every feature naming it
    Named { name: String },
    /// Shared by every instance of a spec
    Spec { spec: SpecId },
    /// One contiguous run of a spec's instances
    SpecRun { spec: SpecId, start: usize },
    /// A single feature
    Single { feature: usize },
    /// A parent and its grouped children
    Family { root: usize },
}

/// A schedulable group of features
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub index: usize,
    pub key: BranchKey,
    /// Display name used in events and diagnostics
    pub label: String,
    /// Emitted as one atomic batch
    pub batch: bool,
    /// Member instance indices, in declaration order
    pub features: Vec<usize>,
}

#[derive(Default)]
struct Partitioner {
    branches: Vec<Branch>,
    by_key: BTreeMap<BranchKey, usize>,
    /// Spec and branch of the current spec-branch run
    run: Option<(SpecId, usize)>,
}

impl Partitioner {
    fn join(&mut self, key: BranchKey, label: impl FnOnce() -> String, batch: bool, feature: usize) -> usize {
        let index = match self.by_key.get(&key) {
            Some(&index) => index,
            None => {
                let index = self.branches.len();
                self.branches.push(Branch {
                    index,
                    key: key.clone(),
                    label: label(),
                    batch: false,
                    features: Vec::new(),
                });
                self.by_key.insert(key, index);
                index
            }
        };
        let branch = &mut self.branches[index];
        branch.batch |= batch;
        branch.features.push(feature);
        index
    }
}

/// Assign every instance to a branch; returns the branches in index order
pub(super) fn partition(instances: &mut [FeatureInstance]) -> Vec<Branch> {
    let mut partitioner = Partitioner::default();

    for i in 0..instances.len() {
        let instance = &instances[i];
        let spec_id = instance.id.spec.clone();

        let joined_parent = instance.parent.filter(|&p| {
            instances[p].spec.groups_children() || instance.spec.groups_children()
        });

        let branch = if let Some(parent) = joined_parent {
            let index = instances[parent].branch;
            trace!("{} joins the branch of its parent {}", instance.id, instances[parent].id);
            partitioner.branches[index].features.push(i);
            partitioner.run = None;
            index
        } else if let Some(name) = instance.branch_name.clone() {
            partitioner.run = None;
            partitioner.join(BranchKey::Named { name: name.clone() }, || name, false, i)
        } else if let Some((name, batch)) = instance.spec.feature_branch() {
            let name = name.to_string();
            partitioner.run = None;
            partitioner.join(BranchKey::Named { name: name.clone() }, || name, batch, i)
        } else if let Some((per_spec, batch)) = instance.spec.spec_branch() {
            if per_spec {
                partitioner.run = None;
                let label = spec_id.to_string();
                partitioner.join(BranchKey::Spec { spec: spec_id }, || label, batch, i)
            } else {
                let key = match &partitioner.run {
                    Some((run_spec, branch)) if *run_spec == spec_id => {
                        partitioner.branches[*branch].key.clone()
                    }
                    _ => BranchKey::SpecRun {
                        spec: spec_id.clone(),
                        start: i,
                    },
                };
                let label = format!("{}#{}", spec_id, i);
                let index = partitioner.join(key, || label, batch, i);
                partitioner.run = Some((spec_id, index));
                index
            }
        } else {
            partitioner.run = None;
            let label = instance.id.to_string();
            let key = if instance.spec.groups_children() {
                BranchKey::Family { root: i }
            } else {
                BranchKey::Single { feature: i }
            };
            partitioner.join(key, || label, false, i)
        };

        instances[i].branch = branch;
    }

    partitioner.branches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrange::instance::resolve_instances;
    use crate::location::ProducerId;
    use crate::model::FeatureConfig;
    use crate::spec::{BranchAnnotation, FeatureSpec, FeatureSpecRegistry, ParamSpec, ResolvedFeatureId};

    fn producer() -> ProducerId {
        ProducerId::new("core", "u")
    }

    fn spec(name: &str) -> SpecId {
        SpecId::new(producer(), name)
    }

    fn registry() -> FeatureSpecRegistry {
        let mut registry = FeatureSpecRegistry::new();
        registry.register(producer(), FeatureSpec::new("plain").with_param(ParamSpec::id("n")));
        registry.register(
            producer(),
            FeatureSpec::new("run")
                .with_param(ParamSpec::id("n"))
                .annotate(BranchAnnotation::SpecBranch {
                    per_spec: false,
                    batch: false,
                }),
        );
        registry.register(
            producer(),
            FeatureSpec::new("shared")
                .with_param(ParamSpec::id("n"))
                .annotate(BranchAnnotation::SpecBranch {
                    per_spec: true,
                    batch: true,
                }),
        );
        registry.register(
            producer(),
            FeatureSpec::new("net")
                .with_param(ParamSpec::id("n"))
                .annotate(BranchAnnotation::FeatureBranch {
                    name: "network".into(),
                    batch: false,
                }),
        );
        registry.register(
            producer(),
            FeatureSpec::new("family")
                .with_param(ParamSpec::id("n"))
                .annotate(BranchAnnotation::ParentChildren),
        );
        registry
    }

    fn feature(name: &str, n: &str) -> FeatureConfig {
        FeatureConfig::new(spec(name)).with_param("n", n)
    }

    fn branches_of(features: Vec<FeatureConfig>) -> (Vec<FeatureInstance>, Vec<Branch>) {
        let mut instances = resolve_instances(&features, &registry()).unwrap();
        let branches = partition(&mut instances);
        (instances, branches)
    }

    #[test]
    fn test_singletons() {
        let (instances, branches) = branches_of(vec![feature("plain", "1"), feature("plain", "2")]);
        assert_eq!(branches.len(), 2);
        assert_eq!(instances[1].branch, 1);
    }

    #[test]
    fn test_per_spec_branch_spans_gaps() {
        let (_, branches) = branches_of(vec![
            feature("shared", "1"),
            feature("plain", "x"),
            feature("shared", "2"),
        ]);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].features, vec![0, 2]);
        assert!(branches[0].batch);
    }

    #[test]
    fn test_spec_runs_split_on_gaps() {
        let (_, branches) = branches_of(vec![
            feature("run", "1"),
            feature("run", "2"),
            feature("plain", "x"),
            feature("run", "3"),
        ]);
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].features, vec![0, 1]);
        assert_eq!(branches[2].features, vec![3]);
    }

    #[test]
    fn test_named_branches() {
        let (_, branches) = branches_of(vec![
            feature("net", "1"),
            feature("plain", "x").in_branch("network"),
            feature("net", "2"),
        ]);
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].label, "network");
        assert_eq!(branches[0].features, vec![0, 1, 2]);
    }

    #[test]
    fn test_children_join_parent() {
        let parent = ResolvedFeatureId::new(spec("family")).with_param("n", "p");
        let (instances, branches) = branches_of(vec![
            feature("family", "p"),
            feature("plain", "c").with_parent(parent.clone()),
            feature("plain", "other"),
        ]);
        assert_eq!(branches.len(), 2);
        assert_eq!(instances[1].branch, instances[0].branch);
        assert_eq!(branches[0].features, vec![0, 1]);
    }

    #[test]
    fn test_ungrouped_child_keeps_own_branch() {
        let parent = ResolvedFeatureId::new(spec("plain")).with_param("n", "p");
        let (instances, branches) = branches_of(vec![
            feature("plain", "p"),
            feature("plain", "c").with_parent(parent),
        ]);
        assert_eq!(branches.len(), 2);
        assert_eq!(instances[1].parent, Some(0));
    }
}
