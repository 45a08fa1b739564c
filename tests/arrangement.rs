// tests/arrangement.rs

//! Feature arrangement: capability ordering, branches, batches and event output.

mod common;

use common::{feature, feature_id, registry, spec_id};
use fpack::model::parse_features;
use fpack::spec::{BranchAnnotation, FeaturePackSpec, FeatureSpec, ParamSpec, ParamValue};
use fpack::{
    arrange, resolve, ArrangementError, ArrangementEvent, Catalog, CollectingSink,
    FeatureSpecRegistry, ProvisioningConfig,
};

fn feature_names(sink: &CollectingSink) -> Vec<String> {
    sink.feature_ids()
        .iter()
        .map(|id| format!("{}:{}", id.spec.name, id.params["n"]))
        .collect()
}

#[test]
fn test_provider_branch_is_emitted_before_requirer() {
    let registry = registry(vec![
        FeatureSpec::new("spec-a").provides("cap1"),
        FeatureSpec::new("spec-b").requires("cap1"),
    ]);
    let arrangement = arrange(&[feature("spec-b", "1"), feature("spec-a", "1")], &registry).unwrap();

    let mut sink = CollectingSink::new();
    arrangement.emit(&mut sink);
    assert_eq!(feature_names(&sink), vec!["spec-a:1", "spec-b:1"]);
}

#[test]
fn test_unprovided_capability_names_the_requirer() {
    let registry = registry(vec![FeatureSpec::new("spec-b").requires("cap1")]);
    let err = arrange(&[feature("spec-b", "1")], &registry).unwrap_err();

    match err {
        ArrangementError::MissingCapabilityProvider { feature, capability } => {
            assert_eq!(feature, feature_id("spec-b", "1"));
            assert_eq!(capability, "cap1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_batch_spec_branch_wraps_both_features() {
    let registry = registry(vec![FeatureSpec::new("ds").annotate(BranchAnnotation::SpecBranch {
        per_spec: true,
        batch: true,
    })]);
    let arrangement = arrange(&[feature("ds", "1"), feature("ds", "2")], &registry).unwrap();

    let events: Vec<_> = arrangement.events().collect();
    let count = |f: fn(&ArrangementEvent) -> bool| events.iter().filter(|e| f(e)).count();
    assert_eq!(count(|e| matches!(e, ArrangementEvent::BatchStart)), 1);
    assert_eq!(count(|e| matches!(e, ArrangementEvent::BatchEnd)), 1);
    assert_eq!(count(|e| matches!(e, ArrangementEvent::BranchStart { .. })), 1);
    assert_eq!(count(|e| matches!(e, ArrangementEvent::BranchEnd { .. })), 1);

    let batch_start = events
        .iter()
        .position(|e| matches!(e, ArrangementEvent::BatchStart))
        .unwrap();
    let batch_end = events
        .iter()
        .position(|e| matches!(e, ArrangementEvent::BatchEnd))
        .unwrap();
    let features: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, ArrangementEvent::Feature { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(features.len(), 2);
    assert!(features.iter().all(|&i| batch_start < i && i < batch_end));
}

#[test]
fn test_duplicate_identity_is_rejected() {
    let registry = registry(vec![FeatureSpec::new("a")]);
    let err = arrange(&[feature("a", "1"), feature("a", "1")], &registry).unwrap_err();
    assert!(matches!(
        err,
        ArrangementError::DuplicateFeatureId { feature } if feature == feature_id("a", "1")
    ));
}

#[test]
fn test_every_provider_precedes_its_requirers() {
    let registry = registry(vec![
        FeatureSpec::new("interface").provides("iface.$n"),
        FeatureSpec::new("socket")
            .with_param(ParamSpec::new("interface"))
            .requires("iface.$interface")
            .provides("socket.$n"),
        FeatureSpec::new("listener")
            .with_param(ParamSpec::new("socket"))
            .requires("socket.$socket")
            .requires("?ssl"),
        FeatureSpec::new("ssl").provides("ssl"),
    ]);
    let features = vec![
        feature("listener", "http").with_param("socket", "web"),
        feature("socket", "web").with_param("interface", "public"),
        feature("listener", "https").with_param("socket", "secure"),
        feature("ssl", "default"),
        feature("socket", "secure").with_param("interface", "public"),
        feature("interface", "public"),
    ];

    let arrangement = arrange(&features, &registry).unwrap();
    for instance in arrangement.instances() {
        let position = arrangement.branch_position(&instance.id).unwrap();
        for requirement in &instance.requires {
            for provider in arrangement.providers_of(&requirement.capability) {
                assert!(
                    arrangement.branch_position(&provider.id).unwrap() <= position,
                    "{} must not come after {}",
                    provider.id,
                    instance.id
                );
            }
        }
    }
}

#[test]
fn test_arrange_specs_from_a_resolved_layout() {
    let producer = common::producer("core");
    let catalog = Catalog::new().with(
        FeaturePackSpec::new(common::fpid("core@test#1"))
            .with_feature(
                FeatureSpec::new("datasource")
                    .with_param(ParamSpec::id("n"))
                    .provides("ds.$n"),
            )
            .with_feature(
                FeatureSpec::new("deployment")
                    .with_param(ParamSpec::id("n"))
                    .with_param(ParamSpec::new("ds").with_default("main"))
                    .requires("ds.$ds"),
            ),
    );
    let config = ProvisioningConfig::new().with_dependency(common::dep("core@test#1"));
    let layout = resolve(&catalog, &config).unwrap();
    let registry = FeatureSpecRegistry::from_layout(&layout);
    assert_eq!(registry.len(), 2);

    let features = parse_features(&format!(
        r#"
[[feature]]
spec = {{ producer = "{producer}", name = "deployment" }}
params = {{ n = "app" }}

[[feature]]
spec = {{ producer = "{producer}", name = "datasource" }}
params = {{ n = "main" }}
"#
    ))
    .unwrap();

    let arrangement = arrange(&features, &registry).unwrap();
    let mut sink = CollectingSink::new();
    arrangement.emit(&mut sink);
    assert_eq!(feature_names(&sink), vec!["datasource:main", "deployment:app"]);
    assert_eq!(
        arrangement.instance(&feature_id("deployment", "app")).unwrap().params["ds"],
        ParamValue::from("main")
    );
    assert_eq!(spec_id("deployment").producer, producer);
}

#[test]
fn test_event_stream_serializes() {
    let registry = registry(vec![FeatureSpec::new("a")]);
    let arrangement = arrange(&[feature("a", "1")], &registry).unwrap();
    let events: Vec<_> = arrangement.events().collect();

    let json = serde_json::to_value(&events).unwrap();
    assert_eq!(json[0]["event"], "branch-start");
    assert_eq!(json[1]["event"], "feature-pack");
    assert_eq!(json[2]["event"], "spec");
    assert_eq!(json[3]["event"], "feature");
    assert_eq!(json[4]["event"], "branch-end");
}
