//! `odo config`: view and edit `.odo/config.yaml`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use odo_core::config::{self, SUPPORTED_PARAMETERS};

use super::resolve_context;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show every parameter and its current value.
    View(ContextArgs),
    /// Set a parameter.
    Set {
        /// Parameter name (case-insensitive).
        key: String,
        value: String,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Reset a parameter to its default.
    Unset {
        key: String,
        #[command(flatten)]
        context: ContextArgs,
    },
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Component directory (defaults to the current directory).
    #[arg(long)]
    pub context: Option<PathBuf>,
}

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "PARAMETER")]
    parameter: &'static str,
    #[tabled(rename = "CURRENT_VALUE")]
    value: String,
    #[tabled(rename = "DESCRIPTION")]
    description: &'static str,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::View(args) => {
            let context = resolve_context(args.context.as_deref())?;
            let config = config::load_at(&context).context("failed to load component config")?;
            let mut rows = Vec::new();
            for &(key, description) in SUPPORTED_PARAMETERS {
                let value = config::get_value(&config.component, key)?.unwrap_or_default();
                rows.push(ParameterRow {
                    parameter: key,
                    value,
                    description,
                });
            }
            let mut table = Table::new(rows);
            table.with(Style::blank());
            println!("{table}");
        }
        ConfigCommand::Set {
            key,
            value,
            context,
        } => {
            let context = resolve_context(context.context.as_deref())?;
            config::set_at(&context, &key, &value)
                .with_context(|| format!("failed to set '{key}'"))?;
            println!("Local config was successfully updated: {key} = {value}");
        }
        ConfigCommand::Unset { key, context } => {
            let context = resolve_context(context.context.as_deref())?;
            config::unset_at(&context, &key).with_context(|| format!("failed to unset '{key}'"))?;
            println!("Local config was successfully updated: {key} unset");
        }
    }
    Ok(())
}
