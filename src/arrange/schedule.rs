// src/arrange/schedule.rs

//! Branch scheduling
//!
//! A branch depends on every other branch holding a provider of a capability
//! one of its features requires, and on the branch of a parent it did not
//! join. Branches are ordered with Kahn's algorithm; among branches that are
//! ready at the same time the one declared first goes first.

use super::branch::Branch;
use super::instance::FeatureInstance;
use crate::error::ArrangementError;
use crate::resolver::DependencyGraph;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Capability string -> providing instance indices, in declaration order
pub type ProviderIndex = BTreeMap<String, Vec<usize>>;

pub(super) fn index_providers(instances: &[FeatureInstance]) -> ProviderIndex {
    let mut providers: ProviderIndex = BTreeMap::new();
    for instance in instances {
        for capability in &instance.provides {
            providers
                .entry(capability.clone())
                .or_default()
                .push(instance.index);
        }
    }
    providers
}

/// Fail on the first hard requirement nobody provides
pub(super) fn check_providers(
    instances: &[FeatureInstance],
    providers: &ProviderIndex,
) -> Result<(), ArrangementError> {
    for instance in instances {
        for requirement in &instance.requires {
            if requirement.optional || providers.contains_key(&requirement.capability) {
                continue;
            }
            return Err(ArrangementError::MissingCapabilityProvider {
                feature: instance.id.clone(),
                capability: requirement.capability.clone(),
            });
        }
    }
    Ok(())
}

/// Build the branch dependency graph
pub(super) fn branch_graph(
    instances: &[FeatureInstance],
    branches: &[Branch],
    providers: &ProviderIndex,
) -> DependencyGraph<usize> {
    let mut graph = DependencyGraph::new();
    for branch in branches {
        graph.add_node(branch.index);
    }

    for instance in instances {
        for requirement in &instance.requires {
            let Some(found) = providers.get(&requirement.capability) else {
                continue;
            };
            for &provider in found {
                let provider_branch = instances[provider].branch;
                if provider_branch == instance.branch {
                    if provider != instance.index {
                        debug!(
                            "{} requires {} inside branch {}, satisfied by the branch",
                            instance.id, requirement.capability, branches[instance.branch].label
                        );
                    }
                    continue;
                }
                trace!(
                    "Branch {} after {} for {}",
                    branches[instance.branch].label,
                    branches[provider_branch].label,
                    requirement.capability
                );
                graph.add_edge(instance.branch, provider_branch);
            }
        }

        if let Some(parent) = instance.parent {
            let parent_branch = instances[parent].branch;
            if parent_branch != instance.branch {
                graph.add_edge(instance.branch, parent_branch);
            }
        }
    }

    graph
}

/// Order the branches; returns branch indices
pub(super) fn schedule(
    instances: &[FeatureInstance],
    branches: &[Branch],
    providers: &ProviderIndex,
) -> Result<Vec<usize>, ArrangementError> {
    let graph = branch_graph(instances, branches, providers);
    graph.topological_sort().map_err(|cycle| {
        ArrangementError::CyclicCapabilityDependency {
            cycle: cycle
                .iter()
                .map(|&b| branches[b].label.clone())
                .collect(),
        }
    })
}
