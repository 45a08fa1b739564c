// tests/proptest_ordering.rs

//! Property-based tests for deterministic ordering.
//!
//! These tests verify that:
//! - Arranged features follow capability levels and keep declaration order
//!   inside a level, for any declaration order
//! - Every resolved feature-pack comes after all of its dependencies
//! - Repeated runs over the same input produce identical output

mod common;

use common::{dep, feature, fpid, registry};
use fpack::model::FeatureConfig;
use fpack::spec::FeatureSpec;
use fpack::{arrange, resolve, Catalog, FeaturePackSpec, ProvisioningConfig};
use proptest::prelude::*;

const LEVELS: usize = 4;

/// Spec `lvl{k}` provides `cap{k}` and requires `cap{k-1}`
fn level_specs() -> Vec<FeatureSpec> {
    (0..LEVELS)
        .map(|k| {
            let spec = FeatureSpec::new(format!("lvl{}", k)).provides(&format!("cap{}", k));
            if k == 0 {
                spec
            } else {
                spec.requires(&format!("cap{}", k - 1))
            }
        })
        .collect()
}

/// Features with their level; every level below the highest has a provider
fn arb_features() -> impl Strategy<Value = Vec<(usize, FeatureConfig)>> {
    (1..=LEVELS)
        .prop_flat_map(|top| {
            let extra = prop::collection::vec(0..top, 0..8);
            (Just(top), extra)
        })
        .prop_flat_map(|(top, extra)| {
            let levels: Vec<usize> = (0..top).chain(extra).collect();
            Just(levels).prop_shuffle()
        })
        .prop_map(|levels| {
            levels
                .into_iter()
                .enumerate()
                .map(|(i, level)| (level, feature(&format!("lvl{}", level), &i.to_string())))
                .collect()
        })
}

/// A feature-pack DAG: pack `i` may depend on any pack `j < i`
fn arb_dag() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (2usize..8)
        .prop_flat_map(|n| {
            let edges = (0..n)
                .map(|i| prop::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i))
                .collect::<Vec<_>>();
            let roots = prop::sample::subsequence((0..n).collect::<Vec<_>>(), 1..=n);
            (edges, roots)
        })
        .prop_flat_map(|(edges, roots)| (Just(edges), Just(roots).prop_shuffle()))
}

fn dag_catalog(edges: &[Vec<usize>]) -> Catalog {
    let mut catalog = Catalog::new();
    for (i, deps) in edges.iter().enumerate() {
        let mut spec = FeaturePackSpec::new(fpid(&format!("fp{}@test#1", i)));
        for j in deps {
            spec = spec.with_dependency(dep(&format!("fp{}@test#1", j)));
        }
        catalog.add(spec);
    }
    catalog
}

proptest! {
    /// Branches come out level by level, in declaration order within a level.
    #[test]
    fn arranged_by_level_then_declaration(features in arb_features()) {
        let registry = registry(level_specs());
        let configs: Vec<FeatureConfig> = features.iter().map(|(_, f)| f.clone()).collect();
        let arrangement = arrange(&configs, &registry).unwrap();

        let mut expected: Vec<(usize, usize)> = features
            .iter()
            .enumerate()
            .map(|(i, (level, _))| (*level, i))
            .collect();
        expected.sort();

        let actual: Vec<(usize, usize)> = arrangement
            .ordered_branches()
            .flat_map(|branch| branch.features.iter().copied())
            .map(|i| (features[i].0, i))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    /// Arranging the same list twice emits identical events.
    #[test]
    fn arrangement_deterministic(features in arb_features()) {
        let registry = registry(level_specs());
        let configs: Vec<FeatureConfig> = features.into_iter().map(|(_, f)| f).collect();

        let first: Vec<_> = arrange(&configs, &registry).unwrap().events().collect();
        let second: Vec<_> = arrange(&configs, &registry).unwrap().events().collect();
        prop_assert_eq!(first, second);
    }

    /// Dependencies always precede dependents, and repeated runs agree.
    #[test]
    fn layout_dependencies_first((edges, roots) in arb_dag()) {
        let catalog = dag_catalog(&edges);
        let mut config = ProvisioningConfig::new();
        for root in &roots {
            config.add_dependency(dep(&format!("fp{}@test#1", root)));
        }

        let layout = resolve(&catalog, &config).unwrap();
        for fp in layout.ordered_feature_packs() {
            let position = layout.position(fp.producer()).unwrap();
            for dependency in &fp.spec().dependencies {
                let before = layout.position(dependency.producer());
                prop_assert!(before.is_some_and(|b| b < position));
            }
        }

        let again = resolve(&catalog, &config).unwrap();
        prop_assert_eq!(common::order(&layout), common::order(&again));
    }
}
