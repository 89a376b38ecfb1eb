//! Per-component local configuration.
//!
//! # Storage layout
//!
//! ```text
//! <context>/
//!   .odo/
//!     config.yaml            (component settings: mode 0600)
//!     odo-file-index.json    (owned by odo-sync)
//! ```
//!
//! # API pattern
//!
//! Every function takes the context directory explicitly. The CLI resolves
//! the context from `--context` or the current directory.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, ConfigError};
use crate::types::{ApplicationName, CommandSpec, ComponentName, ComponentSettings, LocalConfig};

/// Name of the per-component state directory.
pub const ODO_DIR: &str = ".odo";

/// Parameters accepted by `odo config set|unset`, with a short description.
pub const SUPPORTED_PARAMETERS: &[(&str, &str)] = &[
    ("name", "component name"),
    ("application", "application the component belongs to"),
    ("project", "cluster namespace"),
    ("sourcetype", "local | binary | git"),
    ("sourcepath", "binary file path or git URL"),
    ("image", "container image used by the build and run containers"),
    ("destination", "directory inside the container receiving the sources"),
    ("mirrorroots", "comma-separated extra directories that mirror the sources"),
    ("buildcommand", "command building the sources after each push"),
    ("buildworkdir", "working directory of the build command"),
    ("runcommand", "command started in the run container"),
    ("reloadcommand", "command restarting the application after a build"),
    ("ports", "comma-separated container ports"),
    ("ignore", "comma-separated glob patterns excluded from push"),
    ("storagesize", "size of the project-files volume"),
];

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<context>/.odo/`
pub fn odo_dir_at(context: &Path) -> PathBuf {
    context.join(ODO_DIR)
}

/// `<context>/.odo/config.yaml`: pure, no I/O.
pub fn config_path_at(context: &Path) -> PathBuf {
    odo_dir_at(context).join("config.yaml")
}

// ---------------------------------------------------------------------------
// 2. Load / save
// ---------------------------------------------------------------------------

/// Load `<context>/.odo/config.yaml`.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(context: &Path) -> Result<LocalConfig, ConfigError> {
    let path = config_path_at(context);
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Like [`load_at`] but returns a fresh config when none exists yet.
pub fn load_or_default_at(context: &Path) -> Result<LocalConfig, ConfigError> {
    match load_at(context) {
        Ok(config) => Ok(config),
        Err(ConfigError::ConfigNotFound { .. }) => Ok(LocalConfig::new()),
        Err(err) => Err(err),
    }
}

/// Atomically save `config` to `<context>/.odo/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(context: &Path, config: &LocalConfig) -> Result<(), ConfigError> {
    let dir = odo_dir_at(context);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let path = config_path_at(context);
    let tmp_path = path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. set / unset
// ---------------------------------------------------------------------------

/// Set a single parameter and persist the config, creating it if needed.
pub fn set_at(context: &Path, key: &str, value: &str) -> Result<LocalConfig, ConfigError> {
    let mut config = load_or_default_at(context)?;
    apply_value(&mut config, key, Some(value))?;
    config.updated_at = Utc::now();
    save_at(context, &config)?;
    Ok(config)
}

/// Clear a single parameter back to its default and persist the config.
pub fn unset_at(context: &Path, key: &str) -> Result<LocalConfig, ConfigError> {
    let mut config = load_at(context)?;
    apply_value(&mut config, key, None)?;
    config.updated_at = Utc::now();
    save_at(context, &config)?;
    Ok(config)
}

fn apply_value(config: &mut LocalConfig, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
    let normalized = key.to_ascii_lowercase();
    let settings = &mut config.component;
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.unwrap_or_default().to_string(),
        reason,
    };

    match normalized.as_str() {
        "name" => settings.name = value.map(ComponentName::from),
        "application" => {
            settings.application = value.map(ApplicationName::from).unwrap_or_default()
        }
        "project" => settings.project = value.map(str::to_string),
        "sourcetype" => {
            settings.source_type = match value {
                Some(v) => v.parse().map_err(invalid)?,
                None => Default::default(),
            }
        }
        "sourcepath" => settings.source_path = value.map(PathBuf::from),
        "image" => settings.image = value.map(str::to_string),
        "destination" => settings.destination = value.map(str::to_string),
        "mirrorroots" => settings.mirror_roots = split_list(value),
        "buildcommand" => {
            let workdir = settings.build.take().and_then(|b| b.workdir);
            settings.build = value.map(|command| CommandSpec {
                command: command.to_string(),
                workdir,
            })
        }
        "buildworkdir" => match settings.build.as_mut() {
            Some(build) => build.workdir = value.map(str::to_string),
            None if value.is_none() => {}
            None => return Err(invalid("set buildcommand first".to_string())),
        },
        "runcommand" => {
            settings.run = value.map(|command| CommandSpec {
                command: command.to_string(),
                workdir: None,
            })
        }
        "reloadcommand" => {
            settings.reload = value.map(|command| CommandSpec {
                command: command.to_string(),
                workdir: None,
            })
        }
        "ports" => {
            let mut ports = Vec::new();
            for raw in split_list(value) {
                let port = raw
                    .parse::<u16>()
                    .map_err(|e| invalid(format!("'{raw}' is not a port: {e}")))?;
                ports.push(port);
            }
            settings.ports = ports;
        }
        "ignore" => settings.ignores = split_list(value),
        "storagesize" => {
            settings.storage_size = value.unwrap_or("1Gi").to_string();
        }
        _ => return Err(ConfigError::UnknownParameter(key.to_string())),
    }
    Ok(())
}

/// Current value of a parameter as shown by `odo config view`; `None` when unset.
pub fn get_value(settings: &ComponentSettings, key: &str) -> Result<Option<String>, ConfigError> {
    let value = match key.to_ascii_lowercase().as_str() {
        "name" => settings.name.as_ref().map(ToString::to_string),
        "application" => Some(settings.application.to_string()),
        "project" => settings.project.clone(),
        "sourcetype" => Some(settings.source_type.to_string()),
        "sourcepath" => settings.source_path.as_ref().map(|p| p.display().to_string()),
        "image" => settings.image.clone(),
        "destination" => Some(settings.destination()),
        "mirrorroots" => joined(&settings.mirror_roots),
        "buildcommand" => settings.build.as_ref().map(|b| b.command.clone()),
        "buildworkdir" => settings.build.as_ref().and_then(|b| b.workdir.clone()),
        "runcommand" => settings.run.as_ref().map(|r| r.command.clone()),
        "reloadcommand" => settings.reload.as_ref().map(|r| r.command.clone()),
        "ports" => {
            let ports: Vec<String> = settings.ports.iter().map(u16::to_string).collect();
            joined(&ports)
        }
        "ignore" => joined(&settings.ignores),
        "storagesize" => Some(settings.storage_size.clone()),
        _ => return Err(ConfigError::UnknownParameter(key.to_string())),
    };
    Ok(value)
}

fn joined(items: &[String]) -> Option<String> {
    (!items.is_empty()).then(|| items.join(","))
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Platform-specific permission helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
