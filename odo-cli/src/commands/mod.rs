pub mod config;
pub mod push;
pub mod status;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use odo_cluster::{namespace_for, KubeClient};
use odo_core::{preference, ComponentSettings, Preference};
use odo_sync::{Console, PushPlan};

/// `--context`, or the current directory, made absolute.
pub fn resolve_context(context: Option<&Path>) -> Result<PathBuf> {
    let dir = match context {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("could not determine current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("context directory {} is not accessible", dir.display()))
}

/// Component settings for `context`; the component must have a name.
pub fn load_settings(context: &Path) -> Result<ComponentSettings> {
    let config = odo_core::config::load_at(context).context("failed to load component config")?;
    if config.component.name.is_none() {
        anyhow::bail!("component name is not set; run 'odo config set name <component>'");
    }
    Ok(config.component)
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// Connect to the cluster and create or update the component's resources.
///
/// Forces a full push when the workload or its volume was just created.
pub async fn prepare_component(
    settings: &ComponentSettings,
    plan: &mut PushPlan,
    console: &Console,
) -> Result<KubeClient> {
    let preference: Preference = preference::load().context("failed to load preferences")?;
    let namespace = namespace_for(settings, &preference);
    let client = KubeClient::try_default(namespace, &preference)
        .await
        .context("failed to connect to the cluster")?;

    let status = console.status("Checking component");
    let ensured = client
        .ensure_component(settings)
        .await
        .context("failed to create component resources")?;
    status.succeed();

    if ensured.needs_full_push() {
        tracing::info!("new component resources, pushing the full tree");
        plan.force_push = true;
    }
    Ok(client)
}
