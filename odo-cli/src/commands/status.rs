//! `odo status`: what the next push would sync, computed locally.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use odo_core::config;
use odo_sync::{index, scan, IgnoreRuleSet};

use super::resolve_context;

/// Arguments for `odo status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Component directory (defaults to the current directory).
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Extra glob pattern to exclude; may be repeated.
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignores: Vec<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let context = resolve_context(self.context.as_deref())?;
        let report = build_report(&context, &self.ignores)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    component: Option<String>,
    context: String,
    last_sync_at: Option<String>,
    last_sync_age: String,
    changed: Vec<String>,
    deleted: Vec<String>,
}

#[derive(Tabled)]
struct PendingRow {
    #[tabled(rename = "file")]
    file: String,
    #[tabled(rename = "change")]
    change: String,
}

fn build_report(context: &Path, extra_ignores: &[String]) -> Result<StatusReport> {
    let settings = config::load_or_default_at(context)
        .context("failed to load component config")?
        .component;

    let mut rules = IgnoreRuleSet::load_from_dir(context).context("failed to load ignore rules")?;
    rules
        .extend(&settings.ignores)
        .context("invalid ignore pattern in component config")?;
    rules
        .extend(extra_ignores)
        .context("invalid --ignore pattern")?;

    let pending = scan(context, &rules).context("failed to scan source tree")?;

    let index = index::load_at(context).context("failed to load file index")?;
    let (last_sync_at, last_sync_age) = if index.is_empty() {
        (None, "never".to_string())
    } else {
        (
            Some(index.synced_at.to_rfc3339()),
            index::format_age(index.synced_at),
        )
    };

    Ok(StatusReport {
        component: settings.name.map(|n| n.to_string()),
        context: context.display().to_string(),
        last_sync_at,
        last_sync_age,
        changed: pending.changed,
        deleted: pending.deleted,
    })
}

fn print_table(report: &StatusReport) {
    println!(
        "odo v{} | component {} | last push {}",
        env!("CARGO_PKG_VERSION"),
        report.component.as_deref().unwrap_or("<unnamed>").bold(),
        report.last_sync_age,
    );

    if report.changed.is_empty() && report.deleted.is_empty() {
        println!("{} nothing to push", "✓".green());
        return;
    }

    let rows: Vec<PendingRow> = report
        .changed
        .iter()
        .map(|file| PendingRow {
            file: file.clone(),
            change: "modified".yellow().to_string(),
        })
        .chain(report.deleted.iter().map(|file| PendingRow {
            file: file.clone(),
            change: "deleted".red().to_string(),
        }))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!(
        "{} changed, {} deleted. Run 'odo push' to sync them.",
        report.changed.len(),
        report.deleted.len()
    );
}
