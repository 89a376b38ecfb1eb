//! odo core library: component types, local config and preference persistence.
//!
//! - [`types`]: newtypes and the component settings struct
//! - [`error`]: [`ConfigError`]
//! - [`config`]: `<context>/.odo/config.yaml` load / save / set / unset
//! - [`preference`]: `~/.odo/preference.yaml`

pub mod config;
pub mod error;
pub mod preference;
pub mod types;

pub use error::ConfigError;
pub use preference::Preference;
pub use types::{
    shell_quote,
    ApplicationName, CommandSpec, ComponentName, ComponentSettings, LocalConfig, SourceType,
    COMPONENT_LABEL, PROJECTS_ROOT,
};
