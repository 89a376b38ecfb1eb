//! Error types for odo-cluster.

use thiserror::Error;

/// Failures while preparing cluster resources for a component.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A Kubernetes API call failed.
    #[error("{context}: {source}")]
    Kube {
        context: String,
        #[source]
        source: kube::Error,
    },

    /// No kubeconfig or in-cluster configuration could be loaded.
    #[error("unable to connect to the cluster: {0}")]
    Connect(#[source] kube::Error),

    /// The component has no name yet.
    #[error("component name is not set; run 'odo config set name <component>'")]
    MissingName,

    /// The component has no builder image to run.
    #[error("component '{component}' has no image; run 'odo config set image <image>'")]
    MissingImage { component: String },
}

pub(crate) fn kube_err(context: impl Into<String>) -> impl FnOnce(kube::Error) -> ClusterError {
    let context = context.into();
    move |source| ClusterError::Kube { context, source }
}
