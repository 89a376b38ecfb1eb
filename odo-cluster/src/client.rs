//! [`OrchestrationClient`] backed by the Kubernetes API.
//!
//! Files are moved with `exec`: deletions run `rm -rf` and archives are piped
//! into `tar xzf -` through the exec stdin stream.
//!
//! The exec session ends as soon as its stdin is closed, before the remote
//! process reports an exit status. Archives are therefore spooled locally to
//! learn their length, the remote side reads exactly that many bytes with
//! `head -c`, and stdin stays open until the status has arrived.

use std::io::SeekFrom;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, ListParams};
use kube::{Api, Client};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use odo_core::{shell_quote, Preference};
use odo_sync::{ArchiveReader, ClientError, Instance, OrchestrationClient, OutputSender};

use crate::error::ClusterError;

const READ_CHUNK: usize = 8 * 1024;

/// Kubernetes client scoped to one namespace.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    namespace: String,
    push_timeout: Duration,
    poll_interval: Duration,
}

impl KubeClient {
    pub fn new(client: Client, namespace: impl Into<String>, preference: &Preference) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            push_timeout: preference.push_timeout(),
            poll_interval: preference.poll_interval(),
        }
    }

    /// Connect with the default kubeconfig or in-cluster configuration.
    pub async fn try_default(
        namespace: impl Into<String>,
        preference: &Preference,
    ) -> Result<Self, ClusterError> {
        let client = Client::try_default().await.map_err(ClusterError::Connect)?;
        Ok(Self::new(client, namespace, preference))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn instance(&self, name: String) -> Instance {
        Instance {
            name,
            namespace: Some(self.namespace.clone()),
        }
    }

    /// First pod matching `selector` that is running and not terminating.
    async fn running_pod(&self, selector: &str) -> Result<Option<String>, ClientError> {
        let list = self
            .pods()
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| ClientError::backend(format!("listing pods for '{selector}'"), e))?;
        Ok(list.items.into_iter().find_map(|pod| {
            let running = pod.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running");
            let terminating = pod.metadata.deletion_timestamp.is_some();
            (running && !terminating).then(|| pod.metadata.name.unwrap_or_default())
        }))
    }

    /// Run `command`, optionally feeding `input` to stdin, forwarding output
    /// chunks until the process exits.
    async fn exec(
        &self,
        instance: &Instance,
        container: &str,
        command: &[String],
        input: Option<ArchiveReader>,
        stdout: OutputSender,
        stderr: OutputSender,
    ) -> Result<(), ClientError> {
        let params = AttachParams::default()
            .container(container)
            .stdin(input.is_some())
            .stdout(true)
            .stderr(true);
        let mut attached = self
            .pods()
            .exec(&instance.name, command.to_vec(), &params)
            .await
            .map_err(|e| ClientError::backend(format!("exec in {instance}/{container}"), e))?;

        let status = attached.take_status();
        let feed = feed_stdin(input, attached.stdin());
        let out = forward(attached.stdout(), stdout);
        let err = forward(attached.stderr(), stderr);
        // Output streams end when the session closes, after the exit status.
        let (fed, (), ()) = tokio::join!(feed, out, err);

        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        let joined = attached.join().await;
        check_status(status)?;
        let open_stdin = fed.map_err(|e| ClientError::backend("writing to exec stdin", e))?;
        drop(open_stdin);
        joined.map_err(|e| ClientError::backend("exec stream", e))
    }

    /// Run `command` without streaming; a non-zero exit reports its stderr.
    async fn exec_quiet(
        &self,
        instance: &Instance,
        container: &str,
        command: &[String],
        input: Option<ArchiveReader>,
    ) -> Result<(), ClientError> {
        let (out_tx, out_rx) = mpsc::channel(16);
        let (err_tx, err_rx) = mpsc::channel(16);
        let run = self.exec(instance, container, command, input, out_tx, err_tx);
        let (result, _, stderr) = tokio::join!(run, collect(out_rx), collect(err_rx));
        match result {
            Err(ClientError::ExitStatus { code, message }) if !stderr.trim().is_empty() => {
                tracing::debug!(code, %message, "remote command failed");
                Err(ClientError::ExitStatus {
                    code,
                    message: stderr.trim().to_string(),
                })
            }
            other => other,
        }
    }
}

#[async_trait]
impl OrchestrationClient for KubeClient {
    async fn resolve_running_instance(&self, selector: &str) -> Result<Instance, ClientError> {
        let wait = async {
            loop {
                if let Some(name) = self.running_pod(selector).await? {
                    return Ok::<_, ClientError>(name);
                }
                tracing::debug!(selector, "waiting for a running pod");
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        match tokio::time::timeout(self.push_timeout, wait).await {
            Ok(name) => Ok(self.instance(name?)),
            Err(_) => Err(ClientError::Timeout {
                selector: selector.to_string(),
                waited: self.push_timeout,
            }),
        }
    }

    async fn delete_files(
        &self,
        instance: &Instance,
        container: &str,
        paths: &[String],
        roots: &[String],
    ) -> Result<(), ClientError> {
        let command = delete_command(paths, roots);
        tracing::debug!(pod = %instance, ?command, "deleting remote files");
        self.exec_quiet(instance, container, &command, None).await
    }

    async fn stream_archive_to(
        &self,
        instance: &Instance,
        container: &str,
        destination: &str,
        archive: ArchiveReader,
    ) -> Result<(), ClientError> {
        let (file, len) = spool(archive)
            .await
            .map_err(|e| ClientError::backend("spooling archive", e))?;
        let command = extract_command(destination, len);
        tracing::debug!(pod = %instance, destination, bytes = len, "streaming archive");
        self.exec_quiet(instance, container, &command, Some(Box::new(file)))
            .await
    }

    async fn exec_with_streaming(
        &self,
        instance: &Instance,
        container: &str,
        command: &[String],
        stdout: OutputSender,
        stderr: OutputSender,
    ) -> Result<(), ClientError> {
        self.exec(instance, container, command, None, stdout, stderr)
            .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `rm -rf` of every path under every root.
pub fn delete_command(paths: &[String], roots: &[String]) -> Vec<String> {
    let mut command = vec!["rm".to_string(), "-rf".to_string(), "--".to_string()];
    for root in roots {
        let root = root.trim_end_matches('/');
        for path in paths {
            command.push(format!("{root}/{path}"));
        }
    }
    command
}

/// Shell command that unpacks a gzip tar of `len` bytes from stdin into
/// `destination`.
///
/// `head -c` ends the archive without waiting for stdin to close.
pub fn extract_command(destination: &str, len: u64) -> Vec<String> {
    let dest = shell_quote(destination);
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("mkdir -p {dest} && head -c {len} | tar xzf - -C {dest}"),
    ]
}

/// Map the exec status to a result.
///
/// Non-zero exits carry the code from the `ExitCode` cause.
pub fn check_status(status: Option<Status>) -> Result<(), ClientError> {
    let Some(status) = status else {
        return Err(ClientError::backend(
            "exec stream",
            "remote command ended without reporting a status",
        ));
    };
    if status.status.as_deref() == Some("Success") {
        return Ok(());
    }
    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.parse::<i32>().ok())
        })
        .unwrap_or(-1);
    Err(ClientError::ExitStatus {
        code,
        message: status.message.unwrap_or_else(|| "remote command failed".to_string()),
    })
}

/// Copy the whole archive into a local temp file and rewind it.
async fn spool(mut archive: ArchiveReader) -> std::io::Result<(tokio::fs::File, u64)> {
    let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
    let len = tokio::io::copy(&mut archive, &mut file).await?;
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok((file, len))
}

/// Copy `input` into the exec stdin and hand the still-open writer back.
async fn feed_stdin<W>(input: Option<ArchiveReader>, stdin: Option<W>) -> std::io::Result<Option<W>>
where
    W: AsyncWrite + Unpin,
{
    let (Some(mut input), Some(mut stdin)) = (input, stdin) else {
        return Ok(None);
    };
    tokio::io::copy(&mut input, &mut stdin).await?;
    stdin.flush().await?;
    Ok(Some(stdin))
}

/// Copy chunks from `reader` into `tx` until end of stream.
///
/// Keeps draining after the receiver is gone so the exec never stalls.
async fn forward<R>(reader: Option<R>, tx: OutputSender)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let _ = tx.send(buf[..n].to_vec()).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "reading exec output failed");
                break;
            }
        }
    }
}

async fn collect(mut rx: mpsc::Receiver<Vec<u8>>) -> String {
    let mut bytes = Vec::new();
    while let Some(chunk) = rx.recv().await {
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
