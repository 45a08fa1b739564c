// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fpack::model::{parse_features_file, parse_provisioning_file};
use fpack::{
    Catalog, CollectingSink, FeaturePackLayout, FeaturePackRole, FeatureSpecRegistry, LogSink,
    ProvisioningLayout,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "fpack")]
#[command(author, version, about = "Feature-pack layout resolution and feature arrangement", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a provisioning config into an ordered layout
    Resolve {
        /// Catalog of available feature-packs
        #[arg(short, long)]
        catalog: PathBuf,
        /// Provisioning config
        provisioning: PathBuf,
        /// Only list feature-packs with this role (direct, transitive)
        #[arg(long)]
        role: Option<FeaturePackRole>,
        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
    /// Arrange a feature list against the specs of a resolved layout
    Arrange {
        #[arg(short, long)]
        catalog: PathBuf,
        /// Provisioning config providing the feature specs
        #[arg(short, long)]
        provisioning: PathBuf,
        /// Flattened feature list
        features: PathBuf,
        /// Print the event stream as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what changes between two provisioning configs
    Diff {
        #[arg(short, long)]
        catalog: PathBuf,
        old: PathBuf,
        new: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn resolve_file(catalog: &Catalog, path: &Path) -> Result<ProvisioningLayout> {
    let config = parse_provisioning_file(path)
        .with_context(|| format!("Failed to load provisioning config {}", path.display()))?;
    fpack::resolve(catalog, &config)
        .with_context(|| format!("Failed to resolve {}", path.display()))
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    let catalog = Catalog::load(path)
        .with_context(|| format!("Failed to load catalog {}", path.display()))?;
    info!("Loaded {} feature-pack(s) from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn print_feature_pack(fp: &FeaturePackLayout, indent: &str) {
    println!("{}{} [{}]", indent, fp.fpid(), fp.role());
    for package in fp.packages() {
        println!("{}    {}", indent, package);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "fpack=debug" } else { "fpack=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Resolve {
            catalog,
            provisioning,
            role,
            json,
        }) => {
            let catalog = load_catalog(&catalog)?;
            let layout = resolve_file(&catalog, &provisioning)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&layout)?);
                return Ok(());
            }

            for fp in layout.ordered_feature_packs() {
                if role.is_some_and(|r| r != fp.role()) {
                    continue;
                }
                print_feature_pack(fp, "");
                for patch in layout.patches_for(fp.fpid()) {
                    print_feature_pack(patch, "  patch ");
                }
            }
            Ok(())
        }
        Some(Commands::Arrange {
            catalog,
            provisioning,
            features,
            json,
        }) => {
            let catalog = load_catalog(&catalog)?;
            let layout = resolve_file(&catalog, &provisioning)?;
            let registry = FeatureSpecRegistry::from_layout(&layout);

            let features = parse_features_file(&features)
                .with_context(|| format!("Failed to load feature list {}", features.display()))?;
            let arrangement = fpack::arrange(&features, &registry)?;

            if json {
                let mut sink = CollectingSink::new();
                arrangement.emit(&mut sink);
                println!("{}", serde_json::to_string_pretty(sink.events())?);
            } else {
                let mut sink = LogSink::new("arrange");
                arrangement.emit(&mut sink);
                for branch in arrangement.ordered_branches() {
                    println!("{}", branch.label);
                    for &index in &branch.features {
                        println!("    {}", arrangement.instances()[index].id);
                    }
                }
                info!("Arranged {} feature(s)", sink.feature_count());
            }
            Ok(())
        }
        Some(Commands::Diff {
            catalog,
            old,
            new,
            json,
        }) => {
            let catalog = load_catalog(&catalog)?;
            let older = resolve_file(&catalog, &old)?;
            let newer = resolve_file(&catalog, &new)?;
            let diff = older.diff(&newer);

            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else if diff.is_empty() {
                println!("No changes");
            } else {
                for change in &diff.changes {
                    println!("{}", change.description());
                }
            }
            Ok(())
        }
        None => {
            println!("fpack v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'fpack --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_role_argument() {
        let cli = Cli::try_parse_from([
            "fpack", "resolve", "--catalog", "c.toml", "p.toml", "--role", "transitive",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Resolve { role, .. }) => {
                assert_eq!(role, Some(FeaturePackRole::Transitive))
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_resolve_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.toml");
        std::fs::write(
            &catalog_path,
            r#"
[[feature-pack]]
fpid = "core@u#1"

[[feature-pack.package]]
name = "main"
"#,
        )
        .unwrap();
        let provisioning = dir.path().join("provisioning.toml");
        std::fs::write(
            &provisioning,
            r#"
[provisioning]
version = 1

[[feature-pack]]
location = "core@u#1"
"#,
        )
        .unwrap();

        let catalog = load_catalog(&catalog_path).unwrap();
        let layout = resolve_file(&catalog, &provisioning).unwrap();
        assert_eq!(layout.len(), 1);
        assert!(layout.ordered_feature_packs()[0].has_package("main"));
    }
}
