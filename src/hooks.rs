// src/hooks.rs

//! Install and diff hooks
//!
//! Feature-pack specs name the hooks they need by a stable string id. Callers
//! register implementations in a [`HookRegistry`] and run them over a resolved
//! layout. Every referenced id is checked before the first hook runs, so an
//! unknown id never leaves a layout half-processed.

use crate::location::FeaturePackId;
use crate::resolver::{FeaturePackLayout, LayoutDiff, ProvisioningLayout};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Feature-pack {feature_pack} requires unknown hook '{hook}'")]
    UnknownHook {
        hook: String,
        feature_pack: FeaturePackId,
    },

    #[error("Hook '{hook}' failed on {target}")]
    Failed {
        hook: String,
        target: String,
        #[source]
        source: anyhow::Error,
    },
}

impl HookError {
    fn failed(hook: &str, target: impl ToString, source: anyhow::Error) -> Self {
        HookError::Failed {
            hook: hook.to_string(),
            target: target.to_string(),
            source,
        }
    }
}

/// Hook invoked for each feature-pack that names it
pub trait InstallHook: Send + Sync {
    fn id(&self) -> &str;

    /// Install one feature-pack; `layout` is the whole resolved layout
    fn install(
        &self,
        feature_pack: &FeaturePackLayout,
        layout: &ProvisioningLayout,
    ) -> anyhow::Result<()>;
}

/// Hook invoked with the changes between two layouts
pub trait DiffHook: Send + Sync {
    fn id(&self) -> &str;

    fn on_diff(&self, diff: &LayoutDiff) -> anyhow::Result<()>;
}

/// One install hook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvocation {
    pub hook: String,
    pub feature_pack: FeaturePackId,
}

/// Hooks keyed by id
#[derive(Default)]
pub struct HookRegistry {
    install: BTreeMap<String, Arc<dyn InstallHook>>,
    diff: BTreeMap<String, Arc<dyn DiffHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an install hook, replacing any hook with the same id
    pub fn register_install(&mut self, hook: Arc<dyn InstallHook>) {
        let id = hook.id().to_string();
        if self.install.insert(id.clone(), hook).is_some() {
            warn!("Install hook '{}' registered twice, keeping the last", id);
        }
    }

    /// Register a diff hook, replacing any hook with the same id
    pub fn register_diff(&mut self, hook: Arc<dyn DiffHook>) {
        let id = hook.id().to_string();
        if self.diff.insert(id.clone(), hook).is_some() {
            warn!("Diff hook '{}' registered twice, keeping the last", id);
        }
    }

    pub fn install_hook(&self, id: &str) -> Option<&Arc<dyn InstallHook>> {
        self.install.get(id)
    }

    pub fn diff_hook(&self, id: &str) -> Option<&Arc<dyn DiffHook>> {
        self.diff.get(id)
    }

    pub fn install_ids(&self) -> impl Iterator<Item = &str> {
        self.install.keys().map(String::as_str)
    }

    pub fn diff_ids(&self) -> impl Iterator<Item = &str> {
        self.diff.keys().map(String::as_str)
    }

    /// Run install hooks over a layout
    ///
    /// Feature-packs are visited in layout order, each followed by its
    /// patches; a feature-pack's hooks run in the order its spec lists them.
    pub fn run_install(
        &self,
        layout: &ProvisioningLayout,
    ) -> Result<Vec<HookInvocation>, HookError> {
        let plan = self.plan(layout)?;
        if plan.is_empty() {
            debug!("No install hooks to run");
            return Ok(Vec::new());
        }

        info!("Running {} install hook(s)", plan.len());
        let mut invocations = Vec::with_capacity(plan.len());
        for (hook, feature_pack) in plan {
            debug!("  Running hook {} for {}", hook.id(), feature_pack.fpid());
            hook.install(feature_pack, layout)
                .map_err(|e| HookError::failed(hook.id(), feature_pack.fpid(), e))?;
            invocations.push(HookInvocation {
                hook: hook.id().to_string(),
                feature_pack: feature_pack.fpid().clone(),
            });
        }
        Ok(invocations)
    }

    /// Run every diff hook, in id order; returns how many ran
    pub fn run_diff(&self, diff: &LayoutDiff) -> Result<usize, HookError> {
        if diff.is_empty() {
            debug!("Layout unchanged, skipping diff hooks");
            return Ok(0);
        }
        for (id, hook) in &self.diff {
            debug!("Running diff hook {} over {} change(s)", id, diff.len());
            hook.on_diff(diff)
                .map_err(|e| HookError::failed(id, "layout diff", e))?;
        }
        Ok(self.diff.len())
    }

    /// Look up every hook the layout names, in execution order
    fn plan<'l>(
        &self,
        layout: &'l ProvisioningLayout,
    ) -> Result<Vec<(&Arc<dyn InstallHook>, &'l FeaturePackLayout)>, HookError> {
        let mut plan = Vec::new();
        for fp in layout.ordered_feature_packs() {
            let patches = layout.patches_for(fp.fpid());
            for target in std::iter::once(fp).chain(patches) {
                for id in &target.spec().hooks {
                    let hook = self.install.get(id).ok_or_else(|| HookError::UnknownHook {
                        hook: id.clone(),
                        feature_pack: target.fpid().clone(),
                    })?;
                    plan.push((hook, target));
                }
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use crate::location::FeaturePackLocation;
    use crate::model::{FeaturePackDependencyConfig, ProvisioningConfig};
    use crate::resolver::resolve;
    use crate::spec::{FeaturePackSpec, PackageSpec};
    use crate::universe::Catalog;
    use std::sync::Mutex;

    struct Recorder {
        id: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl InstallHook for Recorder {
        fn id(&self) -> &str {
            self.id
        }

        fn install(
            &self,
            feature_pack: &FeaturePackLayout,
            _layout: &ProvisioningLayout,
        ) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(feature_pack.fpid().to_string());
            Ok(())
        }
    }

    impl DiffHook for Recorder {
        fn id(&self) -> &str {
            self.id
        }

        fn on_diff(&self, diff: &LayoutDiff) -> anyhow::Result<()> {
            for change in &diff.changes {
                self.seen.lock().unwrap().push(change.description());
            }
            Ok(())
        }
    }

    struct Failing;

    impl InstallHook for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        fn install(&self, _: &FeaturePackLayout, _: &ProvisioningLayout) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk full")).context("writing content")
        }
    }

    fn fpid(s: &str) -> FeaturePackId {
        FeaturePackId::parse(s).unwrap()
    }

    fn layout(hooks: &[&str]) -> ProvisioningLayout {
        let mut app = FeaturePackSpec::new(fpid("app@u#1"))
            .with_dependency(FeaturePackDependencyConfig::new(
                FeaturePackLocation::parse("base@u#1").unwrap(),
            ))
            .with_package(PackageSpec::new("main"));
        for hook in hooks {
            app = app.with_hook(*hook);
        }
        let catalog = Catalog::new()
            .with(app)
            .with(FeaturePackSpec::new(fpid("base@u#1")).with_hook("files"));
        let config = ProvisioningConfig::new().with_dependency(FeaturePackDependencyConfig::new(
            FeaturePackLocation::parse("app@u#1").unwrap(),
        ));
        resolve(&catalog, &config).unwrap()
    }

    #[test]
    fn test_install_hooks_follow_layout_order() {
        let files = Recorder::new("files");
        let mut registry = HookRegistry::new();
        registry.register_install(files.clone());

        let invocations = registry.run_install(&layout(&["files"])).unwrap();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[0].feature_pack, fpid("base@u#1"));
        assert_eq!(
            *files.seen.lock().unwrap(),
            vec!["base@u#1".to_string(), "app@u#1".to_string()]
        );
    }

    #[test]
    fn test_unknown_hook_runs_nothing() {
        let files = Recorder::new("files");
        let mut registry = HookRegistry::new();
        registry.register_install(files.clone());

        let err = registry.run_install(&layout(&["files", "scripts"])).unwrap_err();
        assert!(matches!(
            err,
            HookError::UnknownHook { ref hook, ref feature_pack }
                if hook == "scripts" && *feature_pack == fpid("app@u#1")
        ));
        assert!(files.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_hook() {
        let mut registry = HookRegistry::new();
        registry.register_install(Recorder::new("files"));
        registry.register_install(Arc::new(Failing));

        let err = registry.run_install(&layout(&["failing"])).unwrap_err();
        assert_eq!(err.to_string(), "Hook 'failing' failed on app@u#1");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "writing content");
        assert_eq!(
            format!("{:#}", anyhow::Error::from(err)),
            "Hook 'failing' failed on app@u#1: writing content: disk full"
        );
    }

    #[test]
    fn test_diff_hooks() {
        let audit = Recorder::new("audit");
        let mut registry = HookRegistry::new();
        registry.register_diff(audit.clone());

        let empty = ProvisioningLayout::default();
        assert_eq!(registry.run_diff(&empty.diff(&empty)).unwrap(), 0);

        let diff = empty.diff(&layout(&[]));
        assert_eq!(registry.run_diff(&diff).unwrap(), 1);
        assert_eq!(
            *audit.seen.lock().unwrap(),
            vec!["Add base@u#1".to_string(), "Add app@u#1".to_string()]
        );
        assert_eq!(registry.diff_ids().collect::<Vec<_>>(), vec!["audit"]);
    }
}
