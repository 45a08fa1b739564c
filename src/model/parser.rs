// src/model/parser.rs

//! Parser for provisioning and feature list TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    FeatureConfig, FeaturePackDependencyConfig, ModelError, ModelResult, ProvisioningConfig,
    UniverseBindings,
};

/// Current provisioning file version
pub const PROVISIONING_VERSION: u32 = 1;

/// On-disk form of a provisioning config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningFile {
    #[serde(default)]
    pub provisioning: ProvisioningHeader,

    #[serde(default)]
    pub universes: UniverseBindings,

    /// Direct dependencies, in declaration order
    #[serde(default, rename = "feature-pack")]
    pub feature_packs: Vec<FeaturePackDependencyConfig>,

    /// Transitive-only declarations
    #[serde(default)]
    pub transitive: Vec<FeaturePackDependencyConfig>,
}

/// Header section of a provisioning file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningHeader {
    /// File version (for forward compatibility)
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for ProvisioningHeader {
    fn default() -> Self {
        Self {
            version: PROVISIONING_VERSION,
        }
    }
}

fn default_version() -> u32 {
    PROVISIONING_VERSION
}

impl ProvisioningFile {
    /// Convert into the in-memory config
    pub fn into_config(self) -> ProvisioningConfig {
        let mut config = ProvisioningConfig {
            dependencies: self.feature_packs,
            transitive: Vec::new(),
            universes: self.universes,
        };
        for dependency in self.transitive {
            config.add_transitive(dependency);
        }
        config
    }
}

impl From<&ProvisioningConfig> for ProvisioningFile {
    fn from(config: &ProvisioningConfig) -> Self {
        Self {
            provisioning: ProvisioningHeader::default(),
            universes: config.universes.clone(),
            feature_packs: config.dependencies.clone(),
            transitive: config.transitive.clone(),
        }
    }
}

/// Parse a provisioning config from TOML text
pub fn parse_provisioning(content: &str) -> ModelResult<ProvisioningConfig> {
    let file: ProvisioningFile = toml::from_str(content)?;

    if file.provisioning.version > PROVISIONING_VERSION {
        return Err(ModelError::VersionMismatch {
            expected: PROVISIONING_VERSION,
            found: file.provisioning.version,
        });
    }

    Ok(file.into_config())
}

/// Parse a provisioning config from a file
pub fn parse_provisioning_file(path: &Path) -> ModelResult<ProvisioningConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_provisioning(&content)
}

/// On-disk form of a flattened feature list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureListFile {
    #[serde(default, rename = "feature")]
    pub features: Vec<FeatureConfig>,
}

/// Parse a feature list from TOML text
pub fn parse_features(content: &str) -> ModelResult<Vec<FeatureConfig>> {
    let file: FeatureListFile = toml::from_str(content)?;
    Ok(file.features)
}

/// Parse a feature list from a file
pub fn parse_features_file(path: &Path) -> ModelResult<Vec<FeatureConfig>> {
    let content = std::fs::read_to_string(path)?;
    parse_features(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::ProducerId;
    use crate::spec::ParamValue;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_provisioning() {
        let toml = r#"
[provisioning]
version = 1

[universes]
default = "maven"

[[feature-pack]]
location = "server:current#27.0.1"
exclude = ["docs"]
patches = ["server-patch#27.0.1-p1"]

[[feature-pack]]
location = "tools@maven"
inherit-packages = false
include = ["cli"]

[[transitive]]
location = "base#3.1"
include = ["logging", { name = "metrics", params = { level = "full" } }]
"#;

        let config = parse_provisioning(toml).unwrap();
        assert_eq!(config.universes.default.as_deref(), Some("maven"));
        assert_eq!(config.dependencies.len(), 2);

        let server = &config.dependencies[0];
        assert_eq!(server.location.producer, ProducerId::unbound("server"));
        assert_eq!(server.location.build.as_deref(), Some("27.0.1"));
        assert!(server.excluded_packages.contains("docs"));
        assert_eq!(server.patches.len(), 1);
        assert!(server.inherit_packages);

        let tools = &config.dependencies[1];
        assert!(!tools.inherit_packages);
        assert!(tools.is_included("cli"));

        assert_eq!(config.transitive.len(), 1);
        assert!(config.transitive[0].transitive);
        assert_eq!(config.transitive[0].included_packages[1].params["level"], "full");
    }

    #[test]
    fn test_future_version_rejected() {
        let toml = r#"
[provisioning]
version = 99
"#;
        assert!(matches!(
            parse_provisioning(toml),
            Err(ModelError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_invalid_location_rejected() {
        let toml = r#"
[[feature-pack]]
location = "bad location"
"#;
        assert!(matches!(
            parse_provisioning(toml),
            Err(ModelError::ParseError(_))
        ));
    }

    #[test]
    fn test_round_trip_through_file() {
        let config = parse_provisioning(
            r#"
[universes]
default = "maven"

[[feature-pack]]
location = "server#1"
exclude = ["docs"]
"#,
        )
        .unwrap();

        let text = toml::to_string(&ProvisioningFile::from(&config)).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let loaded = parse_provisioning_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_features() {
        let toml = r#"
[[feature]]
spec = { producer = "core@u", name = "interface" }
params = { name = "public", ports = ["80", "443"] }

[[feature]]
spec = { producer = "core@u", name = "socket" }
params = { name = "http" }
branch = "net"
parent = { spec = { producer = "core@u", name = "interface" }, params = { name = "public" } }
"#;

        let features = parse_features(toml).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].spec.name, "interface");
        assert_eq!(
            features[0].params["ports"],
            ParamValue::from(vec!["80", "443"])
        );
        assert_eq!(features[1].branch.as_deref(), Some("net"));
        assert_eq!(
            features[1].parent.as_ref().unwrap().params["name"],
            ParamValue::from("public")
        );
    }

    #[test]
    fn test_missing_file() {
        let result = parse_features_file(Path::new("/nonexistent/features.toml"));
        assert!(matches!(result, Err(ModelError::ReadError(_))));
    }
}
