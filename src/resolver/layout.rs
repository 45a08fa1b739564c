// src/resolver/layout.rs

//! Feature-pack closure walk
//!
//! The walk visits the user's direct dependencies in declaration order and
//! recurses depth-first into each feature-pack's own dependency configs. A
//! producer is appended to the ordered list after all of its dependencies
//! (post-order), which places every dependency before its dependents and
//! breaks ties by declaration order at each level.
//!
//! A producer reached again is merged, never re-walked. That also covers
//! feature-pack cycles: the producer is already known when the cycle closes.
//! Inherit flags are settled after the walk over the recorded dependency
//! edges, so a later occurrence can still widen what an earlier one narrowed.
//! When an occurrence pins a build for a producer whose build was looked up
//! through the artifact resolver, the walk restarts with that build forced.

use super::merge::PackageOverrides;
use super::packages::PackageResolver;
use super::{FeaturePackLayout, FeaturePackRole, ProvisioningLayout};
use crate::error::{ArtifactError, ResolutionError};
use crate::location::{FeaturePackId, FeaturePackLocation, ProducerId};
use crate::model::{FeaturePackDependencyConfig, ProvisioningConfig, UniverseBindings};
use crate::spec::FeaturePackSpec;
use crate::universe::ArtifactResolver;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Complete a producer id, falling back to the universe of the feature-pack
/// that declared it
pub(super) fn bind_producer(
    bindings: &UniverseBindings,
    producer: &ProducerId,
    parent: Option<&ProducerId>,
) -> Result<ProducerId, ResolutionError> {
    match (&producer.universe, parent.and_then(|p| p.universe.as_ref())) {
        (None, Some(universe)) => Ok(producer.in_universe(universe.clone())),
        _ => bindings.bind(producer),
    }
}

fn bind_fpid(
    bindings: &UniverseBindings,
    fpid: &FeaturePackId,
    parent: Option<&ProducerId>,
) -> Result<FeaturePackId, ResolutionError> {
    Ok(FeaturePackId {
        producer: bind_producer(bindings, &fpid.producer, parent)?,
        ..fpid.clone()
    })
}

/// Copy of a dependency config with every producer id completed
fn bind_dependency(
    bindings: &UniverseBindings,
    dependency: &FeaturePackDependencyConfig,
    parent: Option<&ProducerId>,
) -> Result<FeaturePackDependencyConfig, ResolutionError> {
    let mut bound = dependency.clone();
    bound.location = FeaturePackLocation {
        producer: bind_producer(bindings, &dependency.location.producer, parent)?,
        ..dependency.location.clone()
    };
    bound.patches = dependency
        .patches
        .iter()
        .map(|patch| bind_fpid(bindings, patch, parent))
        .collect::<Result<_, _>>()?;
    Ok(bound)
}

fn unavailable(location: String) -> impl FnOnce(ArtifactError) -> ResolutionError {
    move |source| ResolutionError::ArtifactUnavailable { location, source }
}

/// Where the build of a walked producer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildSource {
    /// Pinned in the provisioning config
    User,
    /// Requested by a feature-pack spec
    Spec,
    /// Learned from a spec during an earlier pass
    Forced,
    /// Looked up through the artifact resolver
    Resolved,
}

/// Inherit flags in effect for a feature-pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scope {
    inherit_packages: bool,
    inherit_configs: bool,
}

impl Scope {
    const NONE: Scope = Scope {
        inherit_packages: false,
        inherit_configs: false,
    };

    /// Flags carried by a dependency edge
    fn declared(dependency: &FeaturePackDependencyConfig) -> Self {
        Self {
            inherit_packages: dependency.inherit_packages,
            inherit_configs: dependency.inherit_configs,
        }
    }

    /// Flags passed down through an edge
    fn through(self, edge: Scope) -> Self {
        Self {
            inherit_packages: self.inherit_packages && edge.inherit_packages,
            inherit_configs: self.inherit_configs && edge.inherit_configs,
        }
    }

    fn union(self, other: Scope) -> Self {
        Self {
            inherit_packages: self.inherit_packages || other.inherit_packages,
            inherit_configs: self.inherit_configs || other.inherit_configs,
        }
    }
}

/// A patch attachment, in walk order
enum PatchAttachment {
    /// Listed on a dependency config of the target
    Listed {
        target: ProducerId,
        patch: FeaturePackId,
    },
    /// Reached as a plain dependency
    Routed(ProducerId),
}

enum Flow {
    Continue,
    Restart { producer: ProducerId, build: String },
}

/// Walk state for one producer
struct Entry {
    fpid: FeaturePackId,
    spec: Arc<FeaturePackSpec>,
    source: BuildSource,
    role: FeaturePackRole,
    overrides: PackageOverrides,
    scope: Scope,
    /// Flags were set by a user declaration and are not derived from edges
    user_flags: bool,
}

impl Entry {
    /// Merge one occurrence, recording the patches it adds
    fn merge(
        &mut self,
        producer: &ProducerId,
        dependency: &FeaturePackDependencyConfig,
        attachments: &mut Vec<PatchAttachment>,
    ) -> Result<(), ResolutionError> {
        let known = self.overrides.patches.len();
        self.overrides.merge(producer, dependency)?;
        attachments.extend(self.overrides.patches[known..].iter().map(|patch| {
            PatchAttachment::Listed {
                target: producer.clone(),
                patch: patch.clone(),
            }
        }));
        Ok(())
    }
}

/// The user's declarations, with universes bound
struct UserDeclarations {
    direct: Vec<FeaturePackDependencyConfig>,
    transitive: Vec<FeaturePackDependencyConfig>,
    pins: BTreeMap<ProducerId, FeaturePackLocation>,
    direct_producers: BTreeSet<ProducerId>,
}

impl UserDeclarations {
    fn collect(config: &ProvisioningConfig) -> Result<Self, ResolutionError> {
        let mut direct = Vec::new();
        let mut transitive = Vec::new();
        for dependency in &config.dependencies {
            let bound = bind_dependency(&config.universes, dependency, None)?;
            if bound.transitive {
                transitive.push(bound);
            } else {
                direct.push(bound);
            }
        }
        for dependency in &config.transitive {
            transitive.push(bind_dependency(&config.universes, dependency, None)?);
        }

        let mut pins: BTreeMap<ProducerId, FeaturePackLocation> = BTreeMap::new();
        for dependency in direct.iter().chain(transitive.iter()) {
            dependency.validate()?;
            let Some(build) = &dependency.location.build else {
                continue;
            };
            match pins.get(dependency.producer()) {
                Some(pinned) if pinned.build.as_ref() != Some(build) => {
                    return Err(ResolutionError::ConflictingVersions {
                        producer: dependency.producer().clone(),
                        first: pinned.build.clone().unwrap_or_default(),
                        second: build.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    pins.insert(dependency.producer().clone(), dependency.location.clone());
                }
            }
        }

        let direct_producers = direct.iter().map(|d| d.producer().clone()).collect();

        Ok(Self {
            direct,
            transitive,
            pins,
            direct_producers,
        })
    }

    /// Every user declaration for a producer, direct ones first
    fn for_producer<'s, 'p>(
        &'s self,
        producer: &'p ProducerId,
    ) -> impl Iterator<Item = &'s FeaturePackDependencyConfig> {
        self.direct
            .iter()
            .chain(self.transitive.iter())
            .filter(move |d| d.producer() == producer)
    }

    /// Location the user gave for a producer, used for build lookups
    fn location(&self, producer: &ProducerId) -> Option<&FeaturePackLocation> {
        self.for_producer(producer).next().map(|d| &d.location)
    }
}

/// One pass of the closure walk
struct Walk<'w, R: ArtifactResolver + ?Sized> {
    artifacts: &'w R,
    bindings: &'w UniverseBindings,
    user: &'w UserDeclarations,
    forced: &'w BTreeMap<ProducerId, String>,
    entries: BTreeMap<ProducerId, Entry>,
    ordered: Vec<ProducerId>,
    path: Vec<ProducerId>,
    /// Nested dependency edges as (dependent, dependency, flags)
    edges: Vec<(ProducerId, ProducerId, Scope)>,
    /// Patch feature-packs reached through dependency edges
    routed_patches: BTreeMap<ProducerId, (FeaturePackId, Arc<FeaturePackSpec>)>,
    attachments: Vec<PatchAttachment>,
}

impl<'w, R: ArtifactResolver + ?Sized> Walk<'w, R> {
    fn run(&mut self) -> Result<Flow, ResolutionError> {
        let user = self.user;
        for dependency in &user.direct {
            if let flow @ Flow::Restart { .. } = self.visit(dependency)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }

    fn visit(&mut self, dependency: &FeaturePackDependencyConfig) -> Result<Flow, ResolutionError> {
        let producer = dependency.producer().clone();

        if self.routed_patches.contains_key(&producer) {
            trace!("{} already routed to the patch table", producer);
            return Ok(Flow::Continue);
        }

        if let Some(entry) = self.entries.get_mut(&producer) {
            if let Some(requested) = &dependency.location.build {
                if *requested != entry.fpid.build {
                    match entry.source {
                        BuildSource::User => debug!(
                            "Ignoring build {} of {} requested by a dependency, user pinned {}",
                            requested, producer, entry.fpid.build
                        ),
                        BuildSource::Spec | BuildSource::Forced => {
                            return Err(ResolutionError::ConflictingVersions {
                                producer,
                                first: entry.fpid.build.clone(),
                                second: requested.clone(),
                            });
                        }
                        BuildSource::Resolved => {
                            return Ok(Flow::Restart {
                                producer,
                                build: requested.clone(),
                            });
                        }
                    }
                } else if entry.source == BuildSource::Resolved {
                    entry.source = BuildSource::Spec;
                }
            }

            entry.merge(&producer, dependency, &mut self.attachments)?;
            if self.path.contains(&producer) {
                debug!("Feature-pack cycle closes at {}", producer);
            } else {
                trace!("Merged repeated occurrence of {}", producer);
            }
            return Ok(Flow::Continue);
        }

        let (fpid, source) = self.select_build(dependency)?;
        let spec = self
            .artifacts
            .load_spec(&fpid)
            .map_err(unavailable(fpid.to_string()))?;

        if let Some(target) = &spec.patch_for {
            debug!("{} is a patch for {}, moving it to the patch table", fpid, target);
            self.attachments.push(PatchAttachment::Routed(producer.clone()));
            self.routed_patches.insert(producer, (fpid, spec));
            return Ok(Flow::Continue);
        }

        let role = if self.user.direct_producers.contains(&producer) {
            FeaturePackRole::Direct
        } else {
            FeaturePackRole::Transitive
        };
        debug!("Visiting {} ({})", fpid, role);

        let mut entry = Entry {
            fpid,
            spec: Arc::clone(&spec),
            source,
            role,
            overrides: PackageOverrides::new(),
            scope: Scope::NONE,
            user_flags: false,
        };
        entry.merge(&producer, dependency, &mut self.attachments)?;
        for declaration in self.user.for_producer(&producer) {
            entry.merge(&producer, declaration, &mut self.attachments)?;
            entry.scope = entry.scope.union(Scope::declared(declaration));
            entry.user_flags = true;
        }
        self.entries.insert(producer.clone(), entry);

        self.path.push(producer.clone());
        for nested in &spec.dependencies {
            let nested = bind_dependency(self.bindings, nested, Some(&producer))?;
            self.edges.push((
                producer.clone(),
                nested.producer().clone(),
                Scope::declared(&nested),
            ));
            if let flow @ Flow::Restart { .. } = self.visit(&nested)? {
                return Ok(flow);
            }
        }
        self.path.pop();

        self.ordered.push(producer);
        Ok(Flow::Continue)
    }

    /// Pick the build for a producer seen for the first time
    fn select_build(
        &self,
        dependency: &FeaturePackDependencyConfig,
    ) -> Result<(FeaturePackId, BuildSource), ResolutionError> {
        let producer = dependency.producer();

        if let Some(fpid) = self.user.pins.get(producer).and_then(FeaturePackLocation::fpid) {
            return Ok((fpid, BuildSource::User));
        }
        if let Some(build) = self.forced.get(producer) {
            let fpid = dependency.location.clone().with_build(build.clone()).fpid();
            if let Some(fpid) = fpid {
                return Ok((fpid, BuildSource::Forced));
            }
        }
        if let Some(fpid) = dependency.location.fpid() {
            return Ok((fpid, BuildSource::Spec));
        }

        let location = self.user.location(producer).unwrap_or(&dependency.location);
        let fpid = self
            .artifacts
            .resolve_location(location)
            .map_err(unavailable(location.to_string()))?;
        debug!("Resolved {} to {}", location, fpid);
        Ok((fpid, BuildSource::Resolved))
    }

    /// Settle inherit flags: a feature-pack without user flags takes the
    /// union of what its dependents pass down, iterated from nothing up to
    /// the least fixpoint
    fn settle_scopes(&mut self) {
        loop {
            let mut changed = false;
            for (dependent, dependency, edge) in &self.edges {
                let Some(passed) = self.entries.get(dependent).map(|e| e.scope.through(*edge)) else {
                    continue;
                };
                let Some(entry) = self.entries.get_mut(dependency) else {
                    continue;
                };
                if entry.user_flags {
                    continue;
                }
                let widened = entry.scope.union(passed);
                if widened != entry.scope {
                    trace!("Widened inherit flags of {} through {}", dependency, dependent);
                    entry.scope = widened;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn finish(mut self) -> Result<ProvisioningLayout, ResolutionError> {
        for declaration in &self.user.transitive {
            let producer = declaration.producer();
            if !self.entries.contains_key(producer) && !self.routed_patches.contains_key(producer) {
                debug!(
                    "Transitive declaration {} was never reached, ignoring it",
                    declaration.location
                );
            }
        }
        self.settle_scopes();

        let mut ordered = Vec::with_capacity(self.ordered.len());
        for producer in &self.ordered {
            let Some(entry) = self.entries.remove(producer) else {
                continue;
            };
            let mut layout = FeaturePackLayout::new(entry.fpid, entry.role, entry.spec);
            layout.inherit_packages = entry.scope.inherit_packages;
            layout.inherit_configs = entry.scope.inherit_configs;
            layout.included = entry.overrides.included;
            layout.excluded = entry.overrides.excluded;
            ordered.push(layout);
        }

        let mut patches: BTreeMap<FeaturePackId, Vec<FeaturePackLayout>> = BTreeMap::new();
        for attachment in std::mem::take(&mut self.attachments) {
            match attachment {
                PatchAttachment::Listed { target, patch } => {
                    let Some(target) = ordered
                        .iter()
                        .find(|fp| fp.producer() == &target)
                        .map(|fp| fp.fpid.clone())
                    else {
                        continue;
                    };
                    let spec = self
                        .artifacts
                        .load_spec(&patch)
                        .map_err(unavailable(patch.to_string()))?;
                    let declared = spec
                        .patch_for
                        .as_ref()
                        .map(|t| bind_fpid(self.bindings, t, Some(&patch.producer)))
                        .transpose()?;
                    if declared.as_ref() != Some(&target) {
                        return Err(ResolutionError::PatchTargetMismatch {
                            patch,
                            expected: target,
                            declared,
                        });
                    }
                    add_patch(&mut patches, &target, patch, spec);
                }
                PatchAttachment::Routed(producer) => {
                    let Some((patch, spec)) = self.routed_patches.remove(&producer) else {
                        continue;
                    };
                    let Some(target) = spec
                        .patch_for
                        .as_ref()
                        .map(|t| bind_fpid(self.bindings, t, Some(&patch.producer)))
                        .transpose()?
                    else {
                        continue;
                    };
                    if !ordered.iter().any(|fp| fp.fpid == target) {
                        return Err(ResolutionError::PatchTargetNotInstalled { patch, target });
                    }
                    add_patch(&mut patches, &target, patch, spec);
                }
            }
        }

        let packages = PackageResolver::new(self.bindings, &ordered).resolve()?;
        for (layout, resolved) in ordered.iter_mut().zip(packages) {
            layout.packages = resolved;
        }

        info!(
            "Resolved {} feature-packs ({} patched)",
            ordered.len(),
            patches.len()
        );
        Ok(ProvisioningLayout { ordered, patches })
    }
}

fn add_patch(
    patches: &mut BTreeMap<FeaturePackId, Vec<FeaturePackLayout>>,
    target: &FeaturePackId,
    patch: FeaturePackId,
    spec: Arc<FeaturePackSpec>,
) {
    let list = patches.entry(target.clone()).or_default();
    if list.iter().any(|p| p.fpid == patch) {
        return;
    }
    debug!("Attaching patch {} to {}", patch, target);
    let mut layout = FeaturePackLayout::new(patch, FeaturePackRole::Patch, spec);
    layout.packages = layout
        .spec
        .default_packages()
        .map(|p| p.name.clone())
        .collect();
    list.push(layout);
}

/// Resolves provisioning configs into layouts
pub struct LayoutResolver<'a, R: ArtifactResolver + ?Sized> {
    artifacts: &'a R,
}

impl<'a, R: ArtifactResolver + ?Sized> LayoutResolver<'a, R> {
    pub fn new(artifacts: &'a R) -> Self {
        Self { artifacts }
    }

    /// Resolve a config from scratch
    pub fn resolve(&self, config: &ProvisioningConfig) -> Result<ProvisioningLayout, ResolutionError> {
        let user = UserDeclarations::collect(config)?;
        let mut forced: BTreeMap<ProducerId, String> = BTreeMap::new();

        loop {
            let mut walk = Walk {
                artifacts: self.artifacts,
                bindings: &config.universes,
                user: &user,
                forced: &forced,
                entries: BTreeMap::new(),
                ordered: Vec::new(),
                path: Vec::new(),
                edges: Vec::new(),
                routed_patches: BTreeMap::new(),
                attachments: Vec::new(),
            };

            match walk.run()? {
                Flow::Continue => return walk.finish(),
                Flow::Restart { producer, build } => {
                    debug!("Restarting resolution with {} pinned to build {}", producer, build);
                    forced.insert(producer, build);
                }
            }
        }
    }
}
