// src/session.rs

//! Editable provisioning sessions
//!
//! A session owns a provisioning config and the layout resolved from it.
//! Every edit is a [`ProvisioningAction`], a pure transformation from one
//! config to the next that also yields its own inverse. Applying an action
//! re-resolves the edited config from scratch; the session only switches to
//! the new config and layout when resolution succeeds, so a failed edit
//! leaves it exactly as it was.
//!
//! Applied actions are kept in a bounded undo history.

use crate::error::ResolutionError;
use crate::location::{FeaturePackId, ProducerId};
use crate::model::{FeaturePackDependencyConfig, PackageRef, ProvisioningConfig};
use crate::resolver::{resolve, LayoutDiff, ProvisioningLayout};
use crate::universe::ArtifactResolver;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use strum_macros::AsRefStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of undoable actions kept
pub const DEFAULT_HISTORY_LIMIT: usize = 32;

/// Errors from session edits
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Feature-pack {0} is not declared")]
    NotDeclared(ProducerId),

    #[error("Feature-pack {0} is already declared")]
    AlreadyDeclared(ProducerId),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// One edit of a provisioning config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ProvisioningAction {
    /// Declare a new direct dependency, at `index` or at the end
    AddFeaturePack {
        dependency: FeaturePackDependencyConfig,
        index: Option<usize>,
    },

    /// Drop a direct dependency
    RemoveFeaturePack { producer: ProducerId },

    /// Replace the declaration of a producer
    UpdateFeaturePack {
        dependency: FeaturePackDependencyConfig,
    },

    ExcludePackage {
        producer: ProducerId,
        package: String,
    },

    IncludePackage {
        producer: ProducerId,
        package: PackageRef,
    },

    AddPatch {
        producer: ProducerId,
        patch: FeaturePackId,
    },
}

impl ProvisioningAction {
    /// Producer the action edits
    pub fn producer(&self) -> &ProducerId {
        match self {
            ProvisioningAction::AddFeaturePack { dependency, .. } => dependency.producer(),
            ProvisioningAction::RemoveFeaturePack { producer } => producer,
            ProvisioningAction::UpdateFeaturePack { dependency } => dependency.producer(),
            ProvisioningAction::ExcludePackage { producer, .. } => producer,
            ProvisioningAction::IncludePackage { producer, .. } => producer,
            ProvisioningAction::AddPatch { producer, .. } => producer,
        }
    }

    /// Apply to a config, returning the edited copy and the inverse action
    ///
    /// Package and patch edits of a feature-pack the user never declared
    /// start from a version-less transitive declaration carrying the inherit
    /// flags `layout` currently gives it. The inverse removes that
    /// declaration again.
    pub fn apply(
        &self,
        config: &ProvisioningConfig,
        layout: &ProvisioningLayout,
    ) -> Result<(ProvisioningConfig, ProvisioningAction), SessionError> {
        let mut next = config.clone();
        let producer = self.producer();
        let slot = Slot::find(config, producer);

        if let ProvisioningAction::AddFeaturePack { dependency, index } = self {
            if slot.is_some() {
                return Err(SessionError::AlreadyDeclared(producer.clone()));
            }
            let list = if dependency.transitive {
                &mut next.transitive
            } else {
                &mut next.dependencies
            };
            let at = index.unwrap_or(list.len()).min(list.len());
            list.insert(at, dependency.clone());
            let inverse = ProvisioningAction::RemoveFeaturePack {
                producer: producer.clone(),
            };
            return Ok((next, inverse));
        }

        let Some(slot) = slot else {
            let installed = match self {
                ProvisioningAction::ExcludePackage { .. }
                | ProvisioningAction::IncludePackage { .. }
                | ProvisioningAction::AddPatch { .. } => layout.feature_pack(producer),
                _ => None,
            };
            let installed = installed.ok_or_else(|| SessionError::NotDeclared(producer.clone()))?;

            debug!("Declaring {} as transitive to edit it", producer);
            let mut declared = FeaturePackDependencyConfig::new(installed.fpid().location().without_build())
                .inherit_packages(installed.inherit_packages())
                .inherit_configs(installed.inherit_configs());
            declared.transitive = true;
            next.transitive.push(self.edit(declared));
            let inverse = ProvisioningAction::RemoveFeaturePack {
                producer: producer.clone(),
            };
            return Ok((next, inverse));
        };

        let (list, at) = slot.entry(&mut next);
        let previous = list[at].clone();

        if let ProvisioningAction::RemoveFeaturePack { .. } = self {
            list.remove(at);
            let inverse = ProvisioningAction::AddFeaturePack {
                dependency: previous,
                index: Some(at),
            };
            return Ok((next, inverse));
        }

        let mut edited = self.edit(previous.clone());
        edited.transitive = previous.transitive;
        list[at] = edited;

        Ok((
            next,
            ProvisioningAction::UpdateFeaturePack {
                dependency: previous,
            },
        ))
    }

    /// The declaration after this edit
    fn edit(&self, declared: FeaturePackDependencyConfig) -> FeaturePackDependencyConfig {
        match self {
            ProvisioningAction::UpdateFeaturePack { dependency } => dependency.clone(),
            ProvisioningAction::ExcludePackage { package, .. } => {
                let mut edited = declared;
                edited.included_packages.retain(|p| &p.name != package);
                edited.exclude(package.clone())
            }
            ProvisioningAction::IncludePackage { package, .. } => {
                let mut edited = declared;
                edited.excluded_packages.remove(&package.name);
                edited.include_ref(package.clone())
            }
            ProvisioningAction::AddPatch { patch, .. } => declared.with_patch(patch.clone()),
            ProvisioningAction::AddFeaturePack { .. } | ProvisioningAction::RemoveFeaturePack { .. } => {
                declared
            }
        }
    }
}

/// Where a producer is declared in a config
#[derive(Debug, Clone, Copy)]
enum Slot {
    Direct(usize),
    Transitive(usize),
}

impl Slot {
    /// Direct declarations are looked up first
    fn find(config: &ProvisioningConfig, producer: &ProducerId) -> Option<Slot> {
        config
            .dependency_index(producer)
            .map(Slot::Direct)
            .or_else(|| config.transitive_index(producer).map(Slot::Transitive))
    }

    fn entry(self, config: &mut ProvisioningConfig) -> (&mut Vec<FeaturePackDependencyConfig>, usize) {
        match self {
            Slot::Direct(at) => (&mut config.dependencies, at),
            Slot::Transitive(at) => (&mut config.transitive, at),
        }
    }
}

/// An applied action and the action that reverts it
#[derive(Debug, Clone)]
struct HistoryEntry {
    action: ProvisioningAction,
    inverse: ProvisioningAction,
}

/// A provisioning config under edit, with its current layout
pub struct ProvisioningSession<R: ArtifactResolver> {
    artifacts: R,
    config: ProvisioningConfig,
    layout: Arc<ProvisioningLayout>,
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    history_limit: usize,
}

impl<R: ArtifactResolver> ProvisioningSession<R> {
    /// Start a session; the initial config must resolve
    pub fn new(artifacts: R, config: ProvisioningConfig) -> Result<Self, SessionError> {
        let layout = resolve(&artifacts, &config)?;
        Ok(Self {
            artifacts,
            config,
            layout: Arc::new(layout),
            undo: VecDeque::new(),
            redo: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self.trim_history();
        self
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Current layout; holders keep it alive across later edits
    pub fn layout(&self) -> Arc<ProvisioningLayout> {
        Arc::clone(&self.layout)
    }

    pub fn artifacts(&self) -> &R {
        &self.artifacts
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Undoable actions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &ProvisioningAction> {
        self.undo.iter().map(|entry| &entry.action)
    }

    /// Apply an action and re-resolve
    pub fn apply(&mut self, action: ProvisioningAction) -> Result<LayoutDiff, SessionError> {
        let (config, inverse) = action.apply(&self.config, &self.layout)?;
        let diff = self.switch_to(config).inspect_err(|e| {
            warn!("{} on {} rejected: {}", action.as_ref(), action.producer(), e);
        })?;

        debug!("Applied {} on {}", action.as_ref(), action.producer());
        self.undo.push_back(HistoryEntry { action, inverse });
        self.redo.clear();
        self.trim_history();
        Ok(diff)
    }

    /// Revert the most recent action
    pub fn undo(&mut self) -> Result<LayoutDiff, SessionError> {
        let entry = self.undo.pop_back().ok_or(SessionError::NothingToUndo)?;
        match entry
            .inverse
            .apply(&self.config, &self.layout)
            .and_then(|(config, _)| self.switch_to(config))
        {
            Ok(diff) => {
                debug!("Undid {} on {}", entry.action.as_ref(), entry.action.producer());
                self.redo.push(entry);
                Ok(diff)
            }
            Err(e) => {
                self.undo.push_back(entry);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone action
    pub fn redo(&mut self) -> Result<LayoutDiff, SessionError> {
        let entry = self.redo.pop().ok_or(SessionError::NothingToRedo)?;
        match entry
            .action
            .apply(&self.config, &self.layout)
            .and_then(|(config, _)| self.switch_to(config))
        {
            Ok(diff) => {
                debug!("Redid {} on {}", entry.action.as_ref(), entry.action.producer());
                self.undo.push_back(entry);
                self.trim_history();
                Ok(diff)
            }
            Err(e) => {
                self.redo.push(entry);
                Err(e)
            }
        }
    }

    /// Resolve a config and make it current if that succeeds
    fn switch_to(&mut self, config: ProvisioningConfig) -> Result<LayoutDiff, SessionError> {
        let layout = resolve(&self.artifacts, &config)?;
        let diff = self.layout.diff(&layout);
        info!("Layout now has {} feature-packs ({} changes)", layout.len(), diff.len());
        self.config = config;
        self.layout = Arc::new(layout);
        Ok(diff)
    }

    fn trim_history(&mut self) {
        while self.undo.len() > self.history_limit {
            self.undo.pop_front();
        }
    }
}
