// src/location.rs

//! Feature-pack identity and location model
//!
//! A feature-pack location (FPL) names where a feature-pack comes from using
//! the format:
//! `producer[@universe][:channel][/frequency][#build]`
//!
//! Examples:
//! - `wildfly@maven:current/final#27.0.1` - fully resolved
//! - `wildfly@maven:current` - latest build of the `current` channel
//! - `wildfly` - producer only, universe comes from the provisioning bindings
//!
//! # Identity
//!
//! - **ProducerId**: producer name scoped to a universe
//! - **FeaturePackLocation**: producer plus optional channel, frequency and build
//! - **FeaturePackId**: a location with a concrete build (FPID). Equality is
//!   structural over producer, channel and build; frequency is a lookup hint
//!   only and does not take part in identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A producer name scoped to a universe
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProducerId {
    /// Producer name
    pub name: String,
    /// Universe the producer lives in (None until bound)
    pub universe: Option<String>,
}

impl ProducerId {
    /// Create a producer in an explicit universe
    pub fn new(name: impl Into<String>, universe: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            universe: Some(universe.into()),
        }
    }

    /// Create a producer whose universe will be bound later
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            universe: None,
        }
    }

    /// Parse `name[@universe]`
    pub fn parse(s: &str) -> Result<Self, LocationParseError> {
        let (name, universe) = match s.split_once('@') {
            Some((name, universe)) => (name, Some(validate("universe", universe, s)?)),
            None => (s, None),
        };
        let name = validate("producer", name, s)?;
        Ok(Self { name, universe })
    }

    /// Return a copy bound to the given universe
    pub fn in_universe(&self, universe: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            universe: Some(universe.into()),
        }
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.universe {
            Some(universe) => write!(f, "{}@{}", self.name, universe),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for ProducerId {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProducerId::parse(s)
    }
}

impl TryFrom<String> for ProducerId {
    type Error = LocationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProducerId::parse(&value)
    }
}

impl From<ProducerId> for String {
    fn from(value: ProducerId) -> Self {
        value.to_string()
    }
}

/// Where a feature-pack comes from, possibly without a concrete build
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeaturePackLocation {
    pub producer: ProducerId,
    /// Channel (release stream) name
    pub channel: Option<String>,
    /// Frequency within the channel, e.g. `final` or `beta`
    pub frequency: Option<String>,
    /// Concrete build; None means the location is unresolved
    pub build: Option<String>,
}

impl FeaturePackLocation {
    /// Create an unresolved location for a producer
    pub fn new(producer: ProducerId) -> Self {
        Self {
            producer,
            channel: None,
            frequency: None,
            build: None,
        }
    }

    /// Parse a location from `producer[@universe][:channel][/frequency][#build]`
    pub fn parse(s: &str) -> Result<Self, LocationParseError> {
        let (rest, build) = match s.rsplit_once('#') {
            Some((rest, build)) => (rest, Some(validate("build", build, s)?)),
            None => (s, None),
        };
        let (rest, frequency) = match rest.split_once('/') {
            Some((rest, frequency)) => (rest, Some(validate("frequency", frequency, s)?)),
            None => (rest, None),
        };
        let (rest, channel) = match rest.split_once(':') {
            Some((rest, channel)) => (rest, Some(validate("channel", channel, s)?)),
            None => (rest, None),
        };
        let producer = ProducerId::parse(rest).map_err(|e| e.within(s))?;

        Ok(Self {
            producer,
            channel,
            frequency,
            build,
        })
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }

    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Drop the build, keeping producer, channel and frequency
    pub fn without_build(&self) -> Self {
        Self {
            build: None,
            ..self.clone()
        }
    }

    /// Whether a concrete build is known
    pub fn is_resolved(&self) -> bool {
        self.build.is_some()
    }

    /// The FPID for this location, if it carries a build
    pub fn fpid(&self) -> Option<FeaturePackId> {
        self.build.as_ref().map(|build| FeaturePackId {
            producer: self.producer.clone(),
            channel: self.channel.clone(),
            build: build.clone(),
        })
    }
}

impl fmt::Display for FeaturePackLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.producer)?;
        if let Some(channel) = &self.channel {
            write!(f, ":{}", channel)?;
        }
        if let Some(frequency) = &self.frequency {
            write!(f, "/{}", frequency)?;
        }
        if let Some(build) = &self.build {
            write!(f, "#{}", build)?;
        }
        Ok(())
    }
}

impl FromStr for FeaturePackLocation {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeaturePackLocation::parse(s)
    }
}

impl TryFrom<String> for FeaturePackLocation {
    type Error = LocationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FeaturePackLocation::parse(&value)
    }
}

impl From<FeaturePackLocation> for String {
    fn from(value: FeaturePackLocation) -> Self {
        value.to_string()
    }
}

/// A fully resolved feature-pack identity (FPID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeaturePackId {
    pub producer: ProducerId,
    pub channel: Option<String>,
    pub build: String,
}

impl FeaturePackId {
    pub fn new(producer: ProducerId, build: impl Into<String>) -> Self {
        Self {
            producer,
            channel: None,
            build: build.into(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Parse an FPID; the build component is mandatory
    pub fn parse(s: &str) -> Result<Self, LocationParseError> {
        FeaturePackLocation::parse(s)?
            .fpid()
            .ok_or_else(|| LocationParseError::MissingBuild(s.to_string()))
    }

    /// The location form of this identity
    pub fn location(&self) -> FeaturePackLocation {
        FeaturePackLocation {
            producer: self.producer.clone(),
            channel: self.channel.clone(),
            frequency: None,
            build: Some(self.build.clone()),
        }
    }
}

impl fmt::Display for FeaturePackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location())
    }
}

impl FromStr for FeaturePackId {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeaturePackId::parse(s)
    }
}

impl TryFrom<String> for FeaturePackId {
    type Error = LocationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FeaturePackId::parse(&value)
    }
}

impl From<FeaturePackId> for String {
    fn from(value: FeaturePackId) -> Self {
        value.to_string()
    }
}

/// Errors that can occur when parsing a location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationParseError {
    #[error("Empty {component} in feature-pack location: {input}")]
    EmptyComponent {
        component: &'static str,
        input: String,
    },

    #[error("Invalid {component} '{value}' in feature-pack location: {input}")]
    InvalidComponent {
        component: &'static str,
        value: String,
        input: String,
    },

    #[error("Feature-pack location has no build: {0}")]
    MissingBuild(String),
}

impl LocationParseError {
    /// Report the error against the full input string
    fn within(self, input: &str) -> Self {
        match self {
            Self::EmptyComponent { component, .. } => Self::EmptyComponent {
                component,
                input: input.to_string(),
            },
            Self::InvalidComponent {
                component, value, ..
            } => Self::InvalidComponent {
                component,
                value,
                input: input.to_string(),
            },
            other => other,
        }
    }
}

/// Validate one location component (alphanumeric, dots, hyphens, underscores)
fn validate(component: &'static str, value: &str, input: &str) -> Result<String, LocationParseError> {
    if value.is_empty() {
        return Err(LocationParseError::EmptyComponent {
            component,
            input: input.to_string(),
        });
    }

    let valid_chars = |c: char| c.is_alphanumeric() || c == '.' || c == '-' || c == '_';
    if !value.chars().all(valid_chars) {
        return Err(LocationParseError::InvalidComponent {
            component,
            value: value.to_string(),
            input: input.to_string(),
        });
    }

    Ok(value.to_string())
}
