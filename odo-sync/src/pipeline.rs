//! Push pipeline shared by `odo push` and `odo watch`.
//!
//! scan → sync → build → reload → commit index.
//!
//! The index is committed only when every step succeeded, so a failed push
//! is retried in full by the next one.

use std::path::{Path, PathBuf};

use odo_core::{ComponentSettings, ConfigError, SourceType};

use crate::client::OrchestrationClient;
use crate::detector::{self, Scan};
use crate::error::SyncError;
use crate::ignore::IgnoreRuleSet;
use crate::progress::Console;
use crate::transport::{sync_files, SyncOutcome, SyncRequest, SyncTarget};
use crate::trigger::trigger_and_stream;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A command triggered after the files are in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCommand {
    pub container: String,
    pub argv: Vec<String>,
}

/// Everything one push needs, resolved from the component settings.
#[derive(Debug, Clone)]
pub struct PushPlan {
    pub source_root: PathBuf,
    pub ignore: IgnoreRuleSet,
    pub target: SyncTarget,
    pub force_push: bool,
    pub build: Option<TriggerCommand>,
    pub reload: Option<TriggerCommand>,
    /// Stream build output to the console instead of only reporting it on failure.
    pub show_log: bool,
    /// Explicit files to push instead of scanning the tree. The index is not
    /// consulted or written in this mode.
    pub files: Option<Vec<String>>,
}

impl PushPlan {
    /// Resolve a plan for the component configured in `context`.
    ///
    /// `extra_ignores` are added to the ignore file and the configured globs.
    pub fn from_settings(
        context: &Path,
        settings: &ComponentSettings,
        extra_ignores: &[String],
        force_push: bool,
    ) -> Result<Self, SyncError> {
        let selector = settings.selector().ok_or_else(|| ConfigError::InvalidValue {
            key: "name".to_string(),
            value: String::new(),
            reason: "component name is not set; run 'odo config set name <component>'"
                .to_string(),
        })?;
        let destination = settings.destination();

        let target = SyncTarget {
            selector,
            container: settings.build_container.clone(),
            destination: destination.clone(),
            mirror_roots: settings.mirror_roots.clone(),
        };

        let build = settings.build.as_ref().map(|spec| {
            let mut spec = spec.clone();
            if spec.workdir.is_none() {
                spec.workdir = Some(destination.clone());
            }
            TriggerCommand {
                container: settings.build_container.clone(),
                argv: spec.to_argv(),
            }
        });
        let reload = settings.reload.as_ref().map(|spec| TriggerCommand {
            container: settings.run_container.clone(),
            argv: spec.to_argv(),
        });

        match settings.source_type {
            SourceType::Local => {
                let mut ignore = IgnoreRuleSet::load_from_dir(context)?;
                ignore.extend(&settings.ignores)?;
                ignore.extend(extra_ignores)?;
                Ok(Self {
                    source_root: context.to_path_buf(),
                    ignore,
                    target,
                    force_push,
                    build,
                    reload,
                    show_log: false,
                    files: None,
                })
            }
            SourceType::Binary => {
                let (root, file) = binary_location(context, settings)?;
                Ok(Self {
                    source_root: root,
                    ignore: IgnoreRuleSet::default(),
                    target,
                    force_push: true,
                    build,
                    reload,
                    show_log: false,
                    files: Some(vec![file]),
                })
            }
            SourceType::Git => Err(ConfigError::InvalidValue {
                key: "sourcetype".to_string(),
                value: SourceType::Git.to_string(),
                reason: "git components are built in the cluster and cannot be pushed"
                    .to_string(),
            }
            .into()),
        }
    }
}

/// Split the configured binary path into its directory and file name.
fn binary_location(
    context: &Path,
    settings: &ComponentSettings,
) -> Result<(PathBuf, String), SyncError> {
    let invalid = |value: String, reason: &str| ConfigError::InvalidValue {
        key: "sourcepath".to_string(),
        value,
        reason: reason.to_string(),
    };

    let Some(path) = &settings.source_path else {
        return Err(invalid(String::new(), "binary components need a source path").into());
    };
    let path = context.join(path);
    if !path.is_file() {
        return Err(invalid(path.display().to_string(), "not a file").into());
    }
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(invalid(path.display().to_string(), "not a file").into());
    };
    Ok((dir.to_path_buf(), name.to_string_lossy().into_owned()))
}

// ---------------------------------------------------------------------------
// push
// ---------------------------------------------------------------------------

/// What a push did.
#[derive(Debug, Clone)]
pub struct PushReport {
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    pub outcome: SyncOutcome,
    /// Output of the build command, when one ran.
    pub build_output: Option<String>,
}

impl PushReport {
    pub fn is_noop(&self) -> bool {
        self.outcome.is_noop()
    }
}

/// Run one push.
pub async fn push(
    client: &dyn OrchestrationClient,
    plan: &PushPlan,
    console: &Console,
) -> Result<PushReport, SyncError> {
    let (scan, changed, deleted) = match &plan.files {
        Some(files) => (None, files.clone(), Vec::new()),
        None => {
            let scan: Scan = detector::scan(&plan.source_root, &plan.ignore)?;
            let changed = scan.changed.clone();
            let deleted = scan.deleted.clone();
            (Some(scan), changed, deleted)
        }
    };

    let request = SyncRequest {
        source_root: &plan.source_root,
        changed: &changed,
        deleted: &deleted,
        force_push: plan.force_push,
        ignore: &plan.ignore,
    };
    let outcome = sync_files(client, &plan.target, request, console).await?;

    let mut build_output = None;
    if let Some(instance) = &outcome.instance {
        if let Some(build) = &plan.build {
            let status = console.status("Building source code");
            let out = if plan.show_log {
                console.clone()
            } else {
                Console::from_writer(std::io::sink())
            };
            let output =
                trigger_and_stream(client, instance, &build.container, &build.argv, out).await?;
            status.succeed();
            build_output = Some(output);
        }

        if let Some(reload) = &plan.reload {
            let status = console.status("Reloading the application");
            let quiet = Console::from_writer(std::io::sink());
            let output =
                trigger_and_stream(client, instance, &reload.container, &reload.argv, quiet)
                    .await?;
            tracing::debug!(output = %output.trim_end(), "reload finished");
            status.succeed();
        }
    }

    if let Some(scan) = scan {
        if !outcome.is_noop() {
            scan.commit(&plan.source_root)?;
        }
    }

    Ok(PushReport {
        changed,
        deleted,
        outcome,
        build_output,
    })
}
