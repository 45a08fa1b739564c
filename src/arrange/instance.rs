// src/arrange/instance.rs

//! Feature instances and capability expansion
//!
//! Each declared feature is checked against its spec, completed with
//! parameter defaults and given its identity. Capability templates are then
//! expanded with the effective parameter values.

use crate::error::ArrangementError;
use crate::model::FeatureConfig;
use crate::spec::{FeatureSpec, FeatureSpecRegistry, ParamValue, ResolvedFeatureId, UnboundParameter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// A required capability of one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub capability: String,
    pub optional: bool,
}

/// A validated feature ready for scheduling
#[derive(Debug, Clone, Serialize)]
pub struct FeatureInstance {
    /// Position in the declared feature list
    pub index: usize,
    pub id: ResolvedFeatureId,
    #[serde(skip)]
    pub spec: Arc<FeatureSpec>,
    /// Declared values completed with defaults
    pub params: BTreeMap<String, ParamValue>,
    pub provides: Vec<String>,
    pub requires: Vec<Requirement>,
    /// Index of the parent instance
    pub parent: Option<usize>,
    /// Explicit branch name from the config
    pub branch_name: Option<String>,
    /// Index of the branch this instance was placed in
    pub branch: usize,
}

/// Validate the declared features and build their instances
pub(super) fn resolve_instances(
    features: &[FeatureConfig],
    registry: &FeatureSpecRegistry,
) -> Result<Vec<FeatureInstance>, ArrangementError> {
    let mut instances: Vec<FeatureInstance> = Vec::with_capacity(features.len());
    let mut ids: BTreeMap<ResolvedFeatureId, usize> = BTreeMap::new();

    for (index, config) in features.iter().enumerate() {
        let spec = registry
            .get(&config.spec)
            .cloned()
            .ok_or_else(|| ArrangementError::UnknownFeatureSpec {
                spec: config.spec.clone(),
            })?;

        if let Some(name) = config.params.keys().find(|name| spec.param(name).is_none()) {
            return Err(ArrangementError::UnknownParameter {
                spec: config.spec.clone(),
                param: name.clone(),
            });
        }

        let value_of = |name: &str| {
            config
                .params
                .get(name)
                .or_else(|| spec.param(name).and_then(|p| p.default.as_ref()))
                .cloned()
        };

        let mut id = ResolvedFeatureId::new(config.spec.clone());
        for param in spec.id_params() {
            match value_of(&param.name) {
                Some(value) => {
                    id.params.insert(param.name.clone(), value);
                }
                None if param.nillable => {}
                None => {
                    return Err(ArrangementError::MissingIdParameter {
                        spec: config.spec.clone(),
                        param: param.name.clone(),
                    });
                }
            }
        }

        let mut params = BTreeMap::new();
        for param in &spec.params {
            match value_of(&param.name) {
                Some(value) => {
                    params.insert(param.name.clone(), value);
                }
                None if param.nillable || param.feature_id => {}
                None => {
                    return Err(ArrangementError::MissingRequiredParameter {
                        feature: id,
                        param: param.name.clone(),
                    });
                }
            }
        }

        if ids.contains_key(&id) {
            return Err(ArrangementError::DuplicateFeatureId { feature: id });
        }

        let parent = match &config.parent {
            Some(parent_id) => match ids.get(parent_id) {
                Some(&parent) => Some(parent),
                None => {
                    return Err(ArrangementError::UnknownParentFeature {
                        feature: id,
                        parent: parent_id.clone(),
                    });
                }
            },
            None => None,
        };

        let provides = expand_provides(&spec, &id, &params);
        let requires = expand_requires(&spec, &id, &params)?;

        ids.insert(id.clone(), index);
        instances.push(FeatureInstance {
            index,
            id,
            spec,
            params,
            provides,
            requires,
            parent,
            branch_name: config.branch.clone(),
            branch: 0,
        });
    }

    Ok(instances)
}

fn expand_provides(
    spec: &FeatureSpec,
    id: &ResolvedFeatureId,
    params: &BTreeMap<String, ParamValue>,
) -> Vec<String> {
    let mut provides = Vec::new();
    for template in &spec.provides {
        match template.expand(params) {
            Ok(capabilities) => {
                for capability in capabilities {
                    if !provides.contains(&capability) {
                        provides.push(capability);
                    }
                }
            }
            Err(UnboundParameter(param)) => {
                trace!("{} does not provide '{}', {} is unset", id, template, param)
            }
        }
    }
    provides
}

fn expand_requires(
    spec: &FeatureSpec,
    id: &ResolvedFeatureId,
    params: &BTreeMap<String, ParamValue>,
) -> Result<Vec<Requirement>, ArrangementError> {
    let mut requires: Vec<Requirement> = Vec::new();
    for template in &spec.requires {
        let optional = template.is_optional();
        match template.expand(params) {
            Ok(capabilities) => {
                for capability in capabilities {
                    match requires.iter_mut().find(|r| r.capability == capability) {
                        // A hard requirement wins over an optional one
                        Some(existing) => existing.optional &= optional,
                        None => requires.push(Requirement {
                            capability,
                            optional,
                        }),
                    }
                }
            }
            Err(UnboundParameter(param)) if optional => {
                trace!("Skipping optional '{}' of {}, {} is unset", template, id, param)
            }
            Err(UnboundParameter(param)) => {
                return Err(ArrangementError::UnresolvedCapabilityParameter {
                    feature: id.clone(),
                    template: template.to_string(),
                    param,
                });
            }
        }
    }
    Ok(requires)
}
