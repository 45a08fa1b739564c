// src/resolver/packages.rs

//! Package resolution inside resolved feature-packs
//!
//! Every feature-pack seeds its package set with its default packages (when
//! it inherits them) minus the excluded ones, plus the explicitly included
//! ones. Package dependency edges are then followed depth-first, locally or
//! across feature-packs through the origin alias of a dependency config.
//! Required edges go into a package graph that must stay acyclic.

use super::graph::DependencyGraph;
use super::layout::bind_producer;
use super::FeaturePackLayout;
use crate::error::ResolutionError;
use crate::location::ProducerId;
use crate::model::UniverseBindings;
use crate::spec::PackageSpec;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, trace, warn};

/// A package name scoped to its producer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageKey {
    pub producer: ProducerId,
    pub name: String,
}

impl PackageKey {
    pub fn new(producer: ProducerId, name: impl Into<String>) -> Self {
        Self {
            producer,
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.producer, self.name)
    }
}

pub(super) struct PackageResolver<'a> {
    bindings: &'a UniverseBindings,
    layouts: &'a [FeaturePackLayout],
    index: BTreeMap<ProducerId, usize>,
    graph: DependencyGraph<PackageKey>,
    visited: BTreeSet<PackageKey>,
    /// Selected package names per layout index, dependencies first
    selected: Vec<Vec<String>>,
}

impl<'a> PackageResolver<'a> {
    pub(super) fn new(bindings: &'a UniverseBindings, layouts: &'a [FeaturePackLayout]) -> Self {
        let index = layouts
            .iter()
            .enumerate()
            .map(|(i, fp)| (fp.producer().clone(), i))
            .collect();
        Self {
            bindings,
            layouts,
            index,
            graph: DependencyGraph::new(),
            visited: BTreeSet::new(),
            selected: vec![Vec::new(); layouts.len()],
        }
    }

    /// Resolve the package set of every layout, in layout order
    pub(super) fn resolve(mut self) -> Result<Vec<Vec<String>>, ResolutionError> {
        let layouts = self.layouts;
        for (i, layout) in layouts.iter().enumerate() {
            for package in Self::seeds(layout)? {
                self.visit(i, package, None)?;
            }
        }

        if let Some(cycle) = self.graph.detect_cycle() {
            return Err(ResolutionError::CircularPackageDependency {
                cycle: cycle.iter().map(ToString::to_string).collect(),
            });
        }

        debug!(
            "Resolved {} packages across {} feature-packs",
            self.visited.len(),
            layouts.len()
        );
        Ok(self.selected)
    }

    /// Initial package set of one feature-pack
    fn seeds(layout: &'a FeaturePackLayout) -> Result<Vec<&'a PackageSpec>, ResolutionError> {
        let spec: &'a crate::spec::FeaturePackSpec = layout.spec();

        for name in &layout.excluded {
            if spec.package(name).is_none() {
                warn!("{} excludes unknown package {}", layout.fpid(), name);
            }
        }

        let mut seeds: Vec<&PackageSpec> = Vec::new();
        if layout.inherit_packages {
            seeds.extend(
                spec.default_packages()
                    .filter(|p| !layout.excluded.contains(&p.name)),
            );
        }
        for included in &layout.included {
            let package = spec.package(&included.name).ok_or_else(|| {
                ResolutionError::PackageNotFound {
                    producer: layout.producer().clone(),
                    package: included.name.clone(),
                    required_by: None,
                }
            })?;
            if !seeds.iter().any(|p| p.name == package.name) {
                seeds.push(package);
            }
        }
        Ok(seeds)
    }

    fn visit(
        &mut self,
        owner: usize,
        package: &'a PackageSpec,
        required_by: Option<&PackageKey>,
    ) -> Result<(), ResolutionError> {
        let layouts = self.layouts;
        let layout = &layouts[owner];
        let key = PackageKey::new(layout.producer().clone(), &package.name);
        if !self.visited.insert(key.clone()) {
            return Ok(());
        }
        match required_by {
            Some(parent) => trace!("Selecting {} (required by {})", key, parent),
            None => trace!("Selecting {}", key),
        }
        self.graph.add_node(key.clone());

        for dependency in &package.dependencies {
            let target = match &dependency.origin {
                None => Some(owner),
                Some(alias) => self.external_target(layout, &package.name, alias)?,
            };

            let resolved = target.and_then(|t| {
                let target_layout = &layouts[t];
                target_layout
                    .spec()
                    .package(&dependency.name)
                    .filter(|_| !target_layout.excluded.contains(&dependency.name))
                    .map(|spec| (t, spec))
            });

            let Some((target, target_package)) = resolved else {
                if dependency.optional {
                    trace!(
                        "Skipping optional dependency {} of {}, not available",
                        dependency.name, key
                    );
                    continue;
                }
                let producer = match target {
                    Some(t) => layouts[t].producer().clone(),
                    None => self.alias_producer(layout, dependency.origin.as_deref())?,
                };
                return Err(ResolutionError::PackageNotFound {
                    producer,
                    package: dependency.name.clone(),
                    required_by: Some(key.to_string()),
                });
            };

            if !dependency.optional {
                let target_key =
                    PackageKey::new(layouts[target].producer().clone(), &target_package.name);
                self.graph.add_edge(key.clone(), target_key);
            }
            self.visit(target, target_package, Some(&key))?;
        }

        self.selected[owner].push(package.name.clone());
        Ok(())
    }

    /// Layout reached through an origin alias, None if it is not installed
    fn external_target(
        &self,
        layout: &FeaturePackLayout,
        package: &str,
        alias: &str,
    ) -> Result<Option<usize>, ResolutionError> {
        let producer = self.alias_producer(layout, Some(alias)).map_err(|_| {
            ResolutionError::UnknownDependencyAlias {
                feature_pack: layout.fpid().clone(),
                package: package.to_string(),
                alias: alias.to_string(),
            }
        })?;
        Ok(self.index.get(&producer).copied())
    }

    /// Producer an origin alias refers to
    fn alias_producer(
        &self,
        layout: &FeaturePackLayout,
        alias: Option<&str>,
    ) -> Result<ProducerId, ResolutionError> {
        let Some(alias) = alias else {
            return Ok(layout.producer().clone());
        };
        let dependency = layout.spec().dependency_by_origin(alias).ok_or_else(|| {
            ResolutionError::UnknownDependencyAlias {
                feature_pack: layout.fpid().clone(),
                package: String::new(),
                alias: alias.to_string(),
            }
        })?;
        bind_producer(self.bindings, dependency.producer(), Some(layout.producer()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FeaturePackId;
    use crate::model::FeaturePackDependencyConfig;
    use crate::location::FeaturePackLocation;
    use crate::resolver::FeaturePackRole;
    use crate::spec::{FeaturePackSpec, PackageDependencySpec};
    use std::sync::Arc;

    fn layout(spec: FeaturePackSpec) -> FeaturePackLayout {
        FeaturePackLayout::new(spec.fpid.clone(), FeaturePackRole::Direct, Arc::new(spec))
    }

    fn fpid(s: &str) -> FeaturePackId {
        FeaturePackId::parse(s).unwrap()
    }

    fn resolve(layouts: &[FeaturePackLayout]) -> Result<Vec<Vec<String>>, ResolutionError> {
        PackageResolver::new(&UniverseBindings::default(), layouts).resolve()
    }

    #[test]
    fn test_dependencies_first() {
        let spec = FeaturePackSpec::new(fpid("core@u#1"))
            .with_package(PackageSpec::new("a").with_dependency(PackageDependencySpec::local("b")))
            .with_package(PackageSpec::non_default("b"))
            .with_package(PackageSpec::non_default("unused"));

        let packages = resolve(&[layout(spec)]).unwrap();
        assert_eq!(packages[0], vec!["b", "a"]);
    }

    #[test]
    fn test_excluded_default_is_skipped() {
        let spec = FeaturePackSpec::new(fpid("core@u#1"))
            .with_package(PackageSpec::new("a"))
            .with_package(PackageSpec::new("b"));
        let mut fp = layout(spec);
        fp.excluded.insert("b".to_string());

        assert_eq!(resolve(&[fp]).unwrap()[0], vec!["a"]);
    }

    #[test]
    fn test_required_edge_to_excluded_package() {
        let spec = FeaturePackSpec::new(fpid("core@u#1"))
            .with_package(PackageSpec::new("a").with_dependency(PackageDependencySpec::local("b")))
            .with_package(PackageSpec::new("b"));
        let mut fp = layout(spec);
        fp.excluded.insert("b".to_string());

        let err = resolve(&[fp]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Package b not found in core@u (required by core@u/a)"
        );
    }

    #[test]
    fn test_optional_edge_is_skipped() {
        let spec = FeaturePackSpec::new(fpid("core@u#1")).with_package(
            PackageSpec::new("a").with_dependency(PackageDependencySpec::local("missing").optional()),
        );
        assert_eq!(resolve(&[layout(spec)]).unwrap()[0], vec!["a"]);
    }

    #[test]
    fn test_unknown_alias() {
        let spec = FeaturePackSpec::new(fpid("core@u#1")).with_package(
            PackageSpec::new("a").with_dependency(PackageDependencySpec::external("nope", "x")),
        );
        let err = resolve(&[layout(spec)]).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::UnknownDependencyAlias { alias, package, .. } if alias == "nope" && package == "a"
        ));
    }

    #[test]
    fn test_cross_pack_cycle() {
        let base = FeaturePackSpec::new(fpid("base@u#1"))
            .with_dependency(
                FeaturePackDependencyConfig::new(FeaturePackLocation::parse("app@u#1").unwrap())
                    .with_origin("app"),
            )
            .with_package(
                PackageSpec::new("x").with_dependency(PackageDependencySpec::external("app", "y")),
            );
        let app = FeaturePackSpec::new(fpid("app@u#1"))
            .with_dependency(
                FeaturePackDependencyConfig::new(FeaturePackLocation::parse("base@u#1").unwrap())
                    .with_origin("base"),
            )
            .with_package(
                PackageSpec::new("y").with_dependency(PackageDependencySpec::external("base", "x")),
            );

        let err = resolve(&[layout(base), layout(app)]).unwrap_err();
        match err {
            ResolutionError::CircularPackageDependency { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"base@u/x".to_string()));
                assert!(cycle.contains(&"app@u/y".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_cycle_is_not_an_error() {
        let spec = FeaturePackSpec::new(fpid("core@u#1"))
            .with_package(PackageSpec::new("a").with_dependency(PackageDependencySpec::local("b")))
            .with_package(
                PackageSpec::new("b").with_dependency(PackageDependencySpec::local("a").optional()),
            );
        assert_eq!(resolve(&[layout(spec)]).unwrap()[0], vec!["b", "a"]);
    }

    #[test]
    fn test_included_package_must_exist() {
        let mut fp = layout(FeaturePackSpec::new(fpid("core@u#1")));
        fp.included.push(crate::model::PackageRef::new("ghost"));
        let err = resolve(&[fp]).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::PackageNotFound { required_by: None, .. }
        ));
    }
}
