//! Domain types for a component's local configuration.
//!
//! All path fields use `PathBuf`; destination paths inside the workload are
//! plain `String`s because they are never resolved on the local filesystem.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed component name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName(pub String);

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ComponentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed application name grouping components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationName(pub String);

impl fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ApplicationName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Default for ApplicationName {
    fn default() -> Self {
        Self("app".to_string())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where a component's source comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A local directory tree, synced incrementally.
    #[default]
    Local,
    /// A single local file (e.g. a built jar), pushed whole.
    Binary,
    /// A remote git repository, built by the cluster; never synced.
    Git,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Local => write!(f, "local"),
            SourceType::Binary => write!(f, "binary"),
            SourceType::Git => write!(f, "git"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "binary" => Ok(Self::Binary),
            "git" => Ok(Self::Git),
            other => Err(format!(
                "unknown source type '{other}'; expected: local, binary, git"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A command run inside the workload, optionally from a working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl CommandSpec {
    /// The argv executed in the container: `sh -c "cd <workdir> && <command>"`.
    pub fn to_argv(&self) -> Vec<String> {
        let script = match &self.workdir {
            Some(dir) => format!("cd {} && {}", shell_quote(dir), self.command),
            None => self.command.clone(),
        };
        vec!["sh".to_string(), "-c".to_string(), script]
    }
}

/// Single-quote `value` for `sh`, escaping embedded single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn default_build_container() -> String {
    "build".to_string()
}

fn default_run_container() -> String {
    "run".to_string()
}

fn default_storage_size() -> String {
    "1Gi".to_string()
}

/// Settings of the active component, persisted in `.odo/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<ComponentName>,
    #[serde(default)]
    pub application: ApplicationName,
    /// Cluster namespace the component lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
    /// Binary file path (for `SourceType::Binary`) or git URL (for `Git`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "default_build_container")]
    pub build_container: String,
    #[serde(default = "default_run_container")]
    pub run_container: String,
    /// Directory inside the workload that mirrors the source root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Further directories that mirror the source layout; deletions are
    /// propagated to every one of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirror_roots: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload: Option<CommandSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignores: Vec<String>,
    #[serde(default = "default_storage_size")]
    pub storage_size: String,
}

impl Default for ComponentSettings {
    fn default() -> Self {
        Self {
            name: None,
            application: ApplicationName::default(),
            project: None,
            source_type: SourceType::default(),
            source_path: None,
            image: None,
            build_container: default_build_container(),
            run_container: default_run_container(),
            destination: None,
            mirror_roots: Vec::new(),
            build: None,
            run: None,
            reload: None,
            ports: Vec::new(),
            ignores: Vec::new(),
            storage_size: default_storage_size(),
        }
    }
}

/// Mount point of the shared project-files volume inside both containers.
pub const PROJECTS_ROOT: &str = "/projects";

impl ComponentSettings {
    /// Destination directory for synced sources; defaults to `/projects/<name>`.
    pub fn destination(&self) -> String {
        if let Some(dest) = &self.destination {
            return dest.clone();
        }
        match &self.name {
            Some(name) => format!("{PROJECTS_ROOT}/{name}"),
            None => PROJECTS_ROOT.to_string(),
        }
    }

    /// Label selector identifying the component's running workload.
    pub fn selector(&self) -> Option<String> {
        self.name
            .as_ref()
            .map(|name| format!("{}={}", COMPONENT_LABEL, name))
    }
}

/// Label carried by every workload created for a component.
pub const COMPONENT_LABEL: &str = "app.odo.dev/component";

/// Root of `.odo/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub version: u32,
    #[serde(default)]
    pub component: ComponentSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalConfig {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: 1,
            component: ComponentSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
