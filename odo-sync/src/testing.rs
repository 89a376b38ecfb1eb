//! Test doubles for the orchestration boundary.
//!
//! [`FakeClient`] records every call in order so tests can assert on what
//! reached the cluster and when.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tokio::io::AsyncReadExt;

use crate::client::{ArchiveReader, Instance, OrchestrationClient, OutputSender};
use crate::error::ClientError;

/// One recorded orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve {
        selector: String,
    },
    Delete {
        container: String,
        paths: Vec<String>,
        roots: Vec<String>,
    },
    Archive {
        container: String,
        destination: String,
        /// Entry names and contents, in archive order.
        entries: Vec<(String, Vec<u8>)>,
    },
    Exec {
        container: String,
        command: Vec<String>,
    },
}

impl Call {
    pub fn kind(&self) -> &'static str {
        match self {
            Call::Resolve { .. } => "resolve",
            Call::Delete { .. } => "delete",
            Call::Archive { .. } => "archive",
            Call::Exec { .. } => "exec",
        }
    }
}

/// Scriptable in-memory [`OrchestrationClient`].
#[derive(Debug, Default)]
pub struct FakeClient {
    calls: Mutex<Vec<Call>>,
    never_ready: bool,
    fail_delete: bool,
    fail_archive: bool,
    exit_code: i32,
    exec_output: Vec<String>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// No instance ever becomes ready.
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn failing_archive(mut self) -> Self {
        self.fail_archive = true;
        self
    }

    /// Every exec prints `lines` (alternating stdout and stderr) and exits with `code`.
    pub fn exec_result(mut self, code: i32, lines: &[&str]) -> Self {
        self.exit_code = code;
        self.exec_output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Kinds of the recorded calls, in order.
    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.lock().iter().map(Call::kind).collect()
    }

    /// Entry names of every archive streamed so far.
    pub fn archived_paths(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                Call::Archive { entries, .. } => Some(entries),
                _ => None,
            })
            .flatten()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock().push(call);
    }
}

#[async_trait]
impl OrchestrationClient for FakeClient {
    async fn resolve_running_instance(&self, selector: &str) -> Result<Instance, ClientError> {
        self.record(Call::Resolve {
            selector: selector.to_string(),
        });
        if self.never_ready {
            return Err(ClientError::Timeout {
                selector: selector.to_string(),
                waited: std::time::Duration::from_secs(0),
            });
        }
        Ok(Instance {
            name: "component-0".to_string(),
            namespace: Some("test".to_string()),
        })
    }

    async fn delete_files(
        &self,
        _instance: &Instance,
        container: &str,
        paths: &[String],
        roots: &[String],
    ) -> Result<(), ClientError> {
        self.record(Call::Delete {
            container: container.to_string(),
            paths: paths.to_vec(),
            roots: roots.to_vec(),
        });
        if self.fail_delete {
            return Err(ClientError::ExitStatus {
                code: 1,
                message: format!("rm: cannot remove '{}': Permission denied", paths.join(" ")),
            });
        }
        Ok(())
    }

    async fn stream_archive_to(
        &self,
        _instance: &Instance,
        container: &str,
        destination: &str,
        mut archive: ArchiveReader,
    ) -> Result<(), ClientError> {
        if self.fail_archive {
            drop(archive);
            return Err(ClientError::backend(
                "exec tar",
                io::Error::new(io::ErrorKind::ConnectionReset, "stream closed"),
            ));
        }

        let mut bytes = Vec::new();
        archive
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ClientError::backend("read archive", e))?;
        let entries = decode_entries(&bytes).map_err(|e| ClientError::backend("decode archive", e))?;

        self.record(Call::Archive {
            container: container.to_string(),
            destination: destination.to_string(),
            entries,
        });
        Ok(())
    }

    async fn exec_with_streaming(
        &self,
        _instance: &Instance,
        container: &str,
        command: &[String],
        stdout: OutputSender,
        stderr: OutputSender,
    ) -> Result<(), ClientError> {
        self.record(Call::Exec {
            container: container.to_string(),
            command: command.to_vec(),
        });
        for (i, line) in self.exec_output.iter().enumerate() {
            let sink = if i % 2 == 0 { &stdout } else { &stderr };
            let _ = sink.send(format!("{line}\n").into_bytes()).await;
        }
        if self.exit_code != 0 {
            return Err(ClientError::ExitStatus {
                code: self.exit_code,
                message: "command terminated with non-zero exit code".to_string(),
            });
        }
        Ok(())
    }
}

fn decode_entries(bytes: &[u8]) -> io::Result<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        entries.push((name, content));
    }
    Ok(entries)
}

/// Cloneable in-memory writer for capturing console output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
