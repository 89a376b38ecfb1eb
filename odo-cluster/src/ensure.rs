//! Create or update the cluster resources a component needs before a push.
//!
//! Workload resources are applied server-side under the `odo` field manager,
//! so running it again with unchanged settings is a no-op on the cluster.
//! The namespace is only created when missing; users without cluster-wide
//! rights can still push into a namespace that already exists.

use std::fmt::Debug;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

use odo_core::ComponentSettings;

use crate::client::KubeClient;
use crate::error::{kube_err, ClusterError};
use crate::resources;

const FIELD_MANAGER: &str = "odo";

/// What [`KubeClient::ensure_component`] had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureReport {
    pub deployment_created: bool,
    pub storage_created: bool,
}

impl EnsureReport {
    /// A fresh workload or volume holds none of the sources yet.
    pub fn needs_full_push(&self) -> bool {
        self.deployment_created || self.storage_created
    }
}

impl KubeClient {
    /// Make sure the namespace, project-files claim, Deployment and (when
    /// ports are configured) Service exist and match `settings`.
    pub async fn ensure_component(
        &self,
        settings: &ComponentSettings,
    ) -> Result<EnsureReport, ClusterError> {
        let namespace = self.namespace();
        let client = self.client();

        ensure_namespace(client, namespace).await?;

        let claim = resources::project_files_claim(settings, namespace)?;
        let storage_created = create_if_absent(client, namespace, claim).await?;

        let deployment = resources::deployment(settings, namespace)?;
        let deployment_created = apply(client, namespace, deployment).await?;

        if let Some(service) = resources::service(settings, namespace)? {
            apply(client, namespace, service).await?;
        }

        let report = EnsureReport {
            deployment_created,
            storage_created,
        };
        tracing::info!(?report, namespace, "component resources ready");
        Ok(report)
    }
}

async fn ensure_namespace(client: &Client, namespace: &str) -> Result<(), ClusterError> {
    let api: Api<Namespace> = Api::all(client.clone());
    match api.get_opt(namespace).await {
        Ok(Some(_)) => return Ok(()),
        Ok(None) => {}
        Err(err) if api_code(&err) == Some(403) => {
            tracing::debug!(namespace, "namespaces not readable, assuming it exists");
            return Ok(());
        }
        Err(err) => return Err(kube_err(format!("reading namespace {namespace}"))(err)),
    }

    match api
        .create(&PostParams::default(), &resources::namespace(namespace))
        .await
    {
        Ok(_) => {
            tracing::info!(namespace, "created namespace");
            Ok(())
        }
        Err(err) if api_code(&err) == Some(409) => Ok(()),
        Err(err) => Err(kube_err(format!("creating namespace {namespace}"))(err)),
    }
}

/// HTTP status of an API error response.
fn api_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

/// Create `resource` unless one with the same name exists. Returns whether it
/// was created.
///
/// Used for claims, whose spec cannot change after creation.
async fn create_if_absent<K>(client: &Client, namespace: &str, resource: K) -> Result<bool, ClusterError>
where
    K: Clone + DeserializeOwned + Serialize + Debug + Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let name = resource_name(&resource);
    let kind = K::kind(&Default::default()).to_string();

    let existing = api
        .get_opt(&name)
        .await
        .map_err(kube_err(format!("reading {kind} {name}")))?;
    if existing.is_some() {
        tracing::debug!(%kind, %name, "already present");
        return Ok(false);
    }

    api.create(&PostParams::default(), &resource)
        .await
        .map_err(kube_err(format!("creating {kind} {name}")))?;
    tracing::info!(%kind, %name, "created");
    Ok(true)
}

/// Server-side apply `resource`. Returns whether it did not exist before.
async fn apply<K>(client: &Client, namespace: &str, resource: K) -> Result<bool, ClusterError>
where
    K: Clone + DeserializeOwned + Serialize + Debug + Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let name = resource_name(&resource);
    let kind = K::kind(&Default::default()).to_string();

    let existed = api
        .get_opt(&name)
        .await
        .map_err(kube_err(format!("reading {kind} {name}")))?
        .is_some();

    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(resource),
    )
    .await
    .map_err(kube_err(format!("applying {kind} {name}")))?;
    tracing::debug!(%kind, %name, existed, "applied");
    Ok(!existed)
}

fn resource_name<K: Resource>(resource: &K) -> String {
    resource.meta().name.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("namespaces \"team-a\" is {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn forbidden_namespace_lookup_is_recognised() {
        assert_eq!(api_code(&api_error(403, "Forbidden")), Some(403));
        assert_eq!(api_code(&api_error(409, "AlreadyExists")), Some(409));
        assert_eq!(api_code(&kube::Error::Service("connection refused".into())), None);
    }

    #[test]
    fn full_push_needed_for_any_new_resource() {
        assert!(!EnsureReport::default().needs_full_push());
        assert!(EnsureReport {
            deployment_created: true,
            storage_created: false
        }
        .needs_full_push());
        assert!(EnsureReport {
            deployment_created: false,
            storage_created: true
        }
        .needs_full_push());
    }
}
