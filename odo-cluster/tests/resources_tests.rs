//! The generated objects must agree with each other and with the selector the
//! push uses to find the running pod.

use odo_cluster::resources::{self, pvc_name};
use odo_core::{ComponentName, ComponentSettings};

fn settings() -> ComponentSettings {
    ComponentSettings {
        name: Some(ComponentName::from("frontend")),
        image: Some("registry.access.redhat.com/ubi8/nodejs-14".to_string()),
        ports: vec![8080],
        ..Default::default()
    }
}

#[test]
fn push_selector_matches_pod_template_labels() {
    let settings = settings();
    let selector = settings.selector().expect("selector");
    let (key, value) = selector.split_once('=').expect("key=value");

    let deployment = resources::deployment(&settings, "team-a").expect("deployment");
    let labels = deployment
        .spec
        .expect("spec")
        .template
        .metadata
        .expect("metadata")
        .labels
        .expect("labels");
    assert_eq!(labels.get(key).map(String::as_str), Some(value));
}

#[test]
fn deployment_mounts_the_claim_that_is_created() {
    let settings = settings();
    let claim = resources::project_files_claim(&settings, "team-a").expect("claim");
    let deployment = resources::deployment(&settings, "team-a").expect("deployment");

    let claim_name = claim.metadata.name.expect("claim name");
    assert_eq!(claim_name, pvc_name("frontend"));
    let volumes = deployment
        .spec
        .expect("spec")
        .template
        .spec
        .expect("pod spec")
        .volumes
        .expect("volumes");
    assert!(volumes.iter().any(|v| v
        .persistent_volume_claim
        .as_ref()
        .is_some_and(|c| c.claim_name == claim_name)));
}

#[test]
fn service_routes_to_the_component_pods() {
    let settings = settings();
    let service = resources::service(&settings, "team-a")
        .expect("service")
        .expect("ports configured");
    let deployment = resources::deployment(&settings, "team-a").expect("deployment");

    let selector = service.spec.expect("spec").selector.expect("selector");
    let template_labels = deployment
        .spec
        .expect("spec")
        .template
        .metadata
        .expect("metadata")
        .labels
        .expect("labels");
    for (key, value) in &selector {
        assert_eq!(template_labels.get(key), Some(value));
    }
    assert_eq!(service.metadata.namespace.as_deref(), Some("team-a"));
}
