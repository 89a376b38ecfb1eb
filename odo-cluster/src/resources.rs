//! Kubernetes objects for a component.
//!
//! Pure builders; nothing here talks to the API server.
//!
//! A component is one Deployment with two containers sharing a
//! project-files volume mounted at `/projects`:
//!
//! - `build` receives synced sources and runs the build command
//! - `run` runs the application and the reload command

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, ResourceRequirements, Service,
    ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::ObjectMeta;

use odo_core::{ComponentSettings, COMPONENT_LABEL, PROJECTS_ROOT};

use crate::error::ClusterError;

/// Label carrying the application a component belongs to.
pub const APPLICATION_LABEL: &str = "app.kubernetes.io/part-of";

const PROJECT_VOLUME: &str = "odo-projects";

/// Keeps a container alive when it has nothing else to run.
const IDLE_COMMAND: &str = "tail -f /dev/null";

/// `<component>-project-files`
pub fn pvc_name(component: &str) -> String {
    format!("{component}-project-files")
}

pub fn labels(settings: &ComponentSettings, component: &str) -> BTreeMap<String, String> {
    [
        (COMPONENT_LABEL.to_string(), component.to_string()),
        (APPLICATION_LABEL.to_string(), settings.application.to_string()),
    ]
    .into()
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn project_files_claim(
    settings: &ComponentSettings,
    namespace: &str,
) -> Result<PersistentVolumeClaim, ClusterError> {
    let component = component_name(settings)?;
    Ok(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(pvc_name(component)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(settings, component)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(ResourceRequirements {
                requests: Some(
                    [(
                        "storage".to_string(),
                        Quantity(settings.storage_size.clone()),
                    )]
                    .into(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    })
}

pub fn deployment(settings: &ComponentSettings, namespace: &str) -> Result<Deployment, ClusterError> {
    let component = component_name(settings)?;
    let image = settings
        .image
        .clone()
        .ok_or_else(|| ClusterError::MissingImage {
            component: component.to_string(),
        })?;
    let labels = labels(settings, component);

    let mount = VolumeMount {
        name: PROJECT_VOLUME.to_string(),
        mount_path: PROJECTS_ROOT.to_string(),
        ..Default::default()
    };
    let ports = (!settings.ports.is_empty()).then(|| {
        settings
            .ports
            .iter()
            .map(|port| ContainerPort {
                container_port: (*port).into(),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            })
            .collect()
    });
    let run_script = settings
        .run
        .as_ref()
        .map(|spec| spec.to_argv())
        .unwrap_or_else(|| shell(IDLE_COMMAND));

    let pod_spec = PodSpec {
        containers: vec![
            Container {
                name: settings.build_container.clone(),
                image: Some(image.clone()),
                command: Some(shell(IDLE_COMMAND)),
                volume_mounts: Some(vec![mount.clone()]),
                ..Default::default()
            },
            Container {
                name: settings.run_container.clone(),
                image: Some(image),
                command: Some(run_script),
                ports,
                volume_mounts: Some(vec![mount]),
                ..Default::default()
            },
        ],
        volumes: Some(vec![Volume {
            name: PROJECT_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: pvc_name(component),
                read_only: None,
            }),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(component.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            // Two pods must never mount the ReadWriteOnce claim at once.
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                rolling_update: None,
            }),
            selector: LabelSelector {
                match_labels: Some(
                    [(COMPONENT_LABEL.to_string(), component.to_string())].into(),
                ),
                match_expressions: None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    })
}

/// Service exposing the configured ports; `None` when there are none.
pub fn service(
    settings: &ComponentSettings,
    namespace: &str,
) -> Result<Option<Service>, ClusterError> {
    let component = component_name(settings)?;
    if settings.ports.is_empty() {
        return Ok(None);
    }
    let ports = settings
        .ports
        .iter()
        .map(|port| ServicePort {
            name: Some(format!("port-{port}")),
            port: (*port).into(),
            target_port: Some(IntOrString::Int((*port).into())),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        })
        .collect();

    Ok(Some(Service {
        metadata: ObjectMeta {
            name: Some(component.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(settings, component)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some([(COMPONENT_LABEL.to_string(), component.to_string())].into()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }))
}

fn component_name(settings: &ComponentSettings) -> Result<&str, ClusterError> {
    settings
        .name
        .as_ref()
        .map(|name| name.0.as_str())
        .ok_or(ClusterError::MissingName)
}

fn shell(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use odo_core::{CommandSpec, ComponentName};

    fn settings() -> ComponentSettings {
        ComponentSettings {
            name: Some(ComponentName::from("api")),
            image: Some("registry.access.redhat.com/ubi8/nodejs-14".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn deployment_shares_project_volume_between_containers() {
        let deployment = deployment(&settings(), "team-a").expect("deployment");
        let spec = deployment.spec.expect("spec").template.spec.expect("pod spec");

        let names: Vec<_> = spec.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["build", "run"]);
        for container in &spec.containers {
            let mounts = container.volume_mounts.as_ref().expect("mounts");
            assert_eq!(mounts[0].mount_path, "/projects");
        }
        let volume = &spec.volumes.expect("volumes")[0];
        assert_eq!(
            volume.persistent_volume_claim.as_ref().map(|c| c.claim_name.as_str()),
            Some("api-project-files")
        );
    }

    #[test]
    fn run_container_uses_run_command() {
        let mut settings = settings();
        settings.run = Some(CommandSpec {
            command: "npm start".to_string(),
            workdir: Some("/projects/api".to_string()),
        });
        let deployment = deployment(&settings, "team-a").expect("deployment");
        let spec = deployment.spec.expect("spec").template.spec.expect("pod spec");
        assert_eq!(
            spec.containers[1].command.as_deref(),
            Some(&["sh".to_string(), "-c".to_string(), "cd '/projects/api' && npm start".to_string()][..])
        );
    }

    #[test]
    fn deployment_selects_on_component_label() {
        let deployment = deployment(&settings(), "team-a").expect("deployment");
        let labels = deployment.spec.expect("spec").selector.match_labels.expect("labels");
        assert_eq!(labels.get(COMPONENT_LABEL).map(String::as_str), Some("api"));
    }

    #[test]
    fn deployment_requires_image() {
        let mut settings = settings();
        settings.image = None;
        assert!(matches!(
            deployment(&settings, "team-a"),
            Err(ClusterError::MissingImage { .. })
        ));
    }

    #[test]
    fn claim_requests_configured_storage() {
        let mut settings = settings();
        settings.storage_size = "2Gi".to_string();
        let claim = project_files_claim(&settings, "team-a").expect("claim");
        let requests = claim.spec.expect("spec").resources.expect("resources").requests.expect("requests");
        assert_eq!(requests.get("storage"), Some(&Quantity("2Gi".to_string())));
    }

    #[test]
    fn service_only_with_ports() {
        assert!(service(&settings(), "team-a").expect("service").is_none());

        let mut settings = settings();
        settings.ports = vec![8080, 8443];
        let service = service(&settings, "team-a").expect("service").expect("some");
        let ports = service.spec.expect("spec").ports.expect("ports");
        assert_eq!(ports.iter().map(|p| p.port).collect::<Vec<_>>(), vec![8080, 8443]);
    }

    #[test]
    fn unnamed_component_is_rejected() {
        assert!(matches!(
            project_files_claim(&ComponentSettings::default(), "team-a"),
            Err(ClusterError::MissingName)
        ));
    }
}
