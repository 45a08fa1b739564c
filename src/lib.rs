// src/lib.rs

//! fpack - feature-pack provisioning core
//!
//! Two engines sit at the center of a feature-pack provisioning tool:
//!
//! - The layout resolver turns a provisioning config (which feature-packs to
//!   install, with package overrides and patches) into an ordered layout: the
//!   transitive closure of the declared feature-packs, dependencies first,
//!   each with its resolved package set and its patches.
//! - The arranger takes a flattened list of configured features and orders
//!   them into branches so that every capability a feature requires is
//!   provided by something that comes earlier.
//!
//! # Architecture
//!
//! - Pure engines: resolution and arrangement are functions of their inputs
//!   and the answers of an [`universe::ArtifactResolver`]
//! - Deterministic: ordered maps throughout, declaration order breaks ties
//! - Sessions: edits are re-resolved from scratch and only kept on success
//! - Hooks: install and diff callbacks registered by stable id

pub mod arrange;
mod error;
pub mod hooks;
pub mod location;
pub mod model;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod spec;
pub mod universe;

pub use arrange::{arrange, Arrangement, ArrangementEvent, Arranger, EventStream};
pub use error::{ArrangementError, ArtifactError, Error, ResolutionError, Result};
pub use hooks::{DiffHook, HookError, HookRegistry, InstallHook};
pub use location::{FeaturePackId, FeaturePackLocation, LocationParseError, ProducerId};
pub use model::{
    parse_features, parse_provisioning, FeatureConfig, FeaturePackDependencyConfig, ModelError,
    PackageRef, ProvisioningConfig, UniverseBindings,
};
pub use resolver::{
    resolve, FeaturePackLayout, FeaturePackRole, LayoutChange, LayoutDiff, LayoutResolver,
    ProvisioningLayout,
};
pub use session::{ProvisioningAction, ProvisioningSession, SessionError};
pub use sink::{ArrangementSink, CallbackSink, CollectingSink, LogSink, SilentSink};
pub use spec::{
    FeaturePackSpec, FeatureSpec, FeatureSpecRegistry, PackageSpec, ParamValue,
    ResolvedFeatureId, SpecId,
};
pub use universe::{ArtifactResolver, Catalog};
