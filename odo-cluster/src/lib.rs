//! # odo-cluster
//!
//! Kubernetes side of a push.
//!
//! [`KubeClient`] implements [`odo_sync::OrchestrationClient`] on top of the
//! pod `exec` API, and [`KubeClient::ensure_component`] creates the
//! workload a component is pushed into.

pub mod client;
pub mod ensure;
pub mod error;
pub mod resources;

pub use client::KubeClient;
pub use ensure::EnsureReport;
pub use error::ClusterError;

use odo_core::{ComponentSettings, Preference};

/// Namespace used when neither the component nor the preferences name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The component's project, else the preferred namespace, else `default`.
pub fn namespace_for(settings: &ComponentSettings, preference: &Preference) -> String {
    settings
        .project
        .clone()
        .or_else(|| preference.namespace.clone())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("team-a"), Some("shared"), "team-a")]
    #[case(None, Some("shared"), "shared")]
    #[case(None, None, "default")]
    fn namespace_precedence(
        #[case] project: Option<&str>,
        #[case] preferred: Option<&str>,
        #[case] expected: &str,
    ) {
        let settings = ComponentSettings {
            project: project.map(str::to_string),
            ..Default::default()
        };
        let preference = Preference {
            namespace: preferred.map(str::to_string),
            ..Default::default()
        };
        assert_eq!(namespace_for(&settings, &preference), expected);
    }
}
