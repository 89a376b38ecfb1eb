//! `odo watch`: push on every change until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use odo_sync::{Console, PushPlan};

use super::{load_settings, prepare_component, resolve_context, runtime};

/// Arguments for `odo watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Component directory (defaults to the current directory).
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Extra glob pattern to exclude; may be repeated.
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignores: Vec<String>,

    /// Quiet period in milliseconds before changes are pushed.
    #[arg(long, default_value_t = 1000)]
    pub delay: u64,

    /// Stream the build output.
    #[arg(long)]
    pub show_log: bool,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let context = resolve_context(self.context.as_deref())?;
        let settings = load_settings(&context)?;

        let mut plan = PushPlan::from_settings(&context, &settings, &self.ignores, false)
            .context("invalid component config")?;
        plan.show_log = self.show_log;

        let console = Console::stdout();
        let delay = Duration::from_millis(self.delay);
        runtime()?.block_on(async {
            let client = prepare_component(&settings, &mut plan, &console).await?;
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %err, "ctrl-c handler failed");
                    std::future::pending::<()>().await;
                }
            };
            let summary = odo_watch::watch(&client, &plan, &console, delay, shutdown)
                .await
                .context("watch stopped")?;
            tracing::info!(
                pushes = summary.pushes,
                failures = summary.failures,
                "watch finished"
            );
            Ok::<(), anyhow::Error>(())
        })
    }
}
