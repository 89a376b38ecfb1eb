//! `odo push`: sync changed files, then build and reload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use odo_sync::{push, Console, PushPlan, SyncError};

use super::{load_settings, prepare_component, resolve_context, runtime};

/// Arguments for `odo push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Component directory (defaults to the current directory).
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Extra glob pattern to exclude; may be repeated.
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignores: Vec<String>,

    /// Push every file even if nothing changed.
    #[arg(short, long)]
    pub force: bool,

    /// Stream the build output.
    #[arg(long)]
    pub show_log: bool,
}

impl PushArgs {
    pub fn run(self) -> Result<()> {
        let context = resolve_context(self.context.as_deref())?;
        let settings = load_settings(&context)?;
        let name = settings
            .name
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        let mut plan = PushPlan::from_settings(&context, &settings, &self.ignores, self.force)
            .context("invalid component config")?;
        plan.show_log = self.show_log;

        let console = Console::stdout();
        runtime()?.block_on(async {
            let client = prepare_component(&settings, &mut plan, &console).await?;
            match push(&client, &plan, &console).await {
                Ok(report) if report.is_noop() => {
                    console.line("No file changes detected, skipping push. Use '-f' to force it.");
                    Ok::<(), anyhow::Error>(())
                }
                Ok(_) => {
                    console.line(&format!("Changes successfully pushed to component: {name}"));
                    Ok(())
                }
                Err(err) => {
                    print_captured_output(&err, self.show_log);
                    Err(err).with_context(|| format!("failed to push component {name}"))
                }
            }
        })
    }
}

/// Without `--show-log` a failed build has printed nothing yet.
fn print_captured_output(err: &SyncError, shown: bool) {
    if let SyncError::RemoteCommand { output, .. } = err {
        if !shown && !output.is_empty() {
            eprintln!("{}", output.trim_end());
        }
    }
}
