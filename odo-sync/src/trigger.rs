//! Build and reload triggers.
//!
//! A remote command's stdout and stderr are merged into one bounded channel.
//! A scanner task splits the merged stream into lines, forwards each line to
//! the console as soon as it is complete and keeps a copy so a failure can be
//! reported with everything the command printed.

use tokio::sync::mpsc;

use crate::client::{Instance, OrchestrationClient};
use crate::error::SyncError;
use crate::progress::Console;

const OUTPUT_CHANNEL_DEPTH: usize = 32;

/// Run `command` in `container` and stream its output to `out`.
///
/// Returns the captured output. Exec failures and non-zero exits become
/// [`SyncError::RemoteCommand`] carrying the output captured so far.
pub async fn trigger_and_stream(
    client: &dyn OrchestrationClient,
    instance: &Instance,
    container: &str,
    command: &[String],
    out: Console,
) -> Result<String, SyncError> {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_DEPTH);
    let scanner = tokio::spawn(scan_lines(rx, out));

    tracing::debug!(container, command = ?command, "executing remote command");
    let result = client
        .exec_with_streaming(instance, container, command, tx.clone(), tx)
        .await;

    // Both senders are gone once exec returns, so the scanner drains and ends.
    let output = scanner.await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "output scanner task failed");
        String::new()
    });

    match result {
        Ok(()) => Ok(output),
        Err(source) => Err(SyncError::RemoteCommand {
            command: command.join(" "),
            output,
            source,
        }),
    }
}

async fn scan_lines(mut rx: mpsc::Receiver<Vec<u8>>, out: Console) -> String {
    let mut captured = String::new();
    let mut pending: Vec<u8> = Vec::new();

    while let Some(chunk) = rx.recv().await {
        pending.extend_from_slice(&chunk);
        while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            emit(&line[..line.len() - 1], &out, &mut captured);
        }
    }
    if !pending.is_empty() {
        emit(&pending, &out, &mut captured);
    }
    captured
}

fn emit(line: &[u8], out: &Console, captured: &mut String) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches('\r');
    out.line(text);
    captured.push_str(text);
    captured.push('\n');
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::client::{ArchiveReader, OutputSender};
    use crate::error::ClientError;
    use crate::testing::SharedBuffer;

    /// Prints one line, then refuses to finish until that line is on the console.
    struct SlowBuild {
        console: SharedBuffer,
    }

    #[async_trait]
    impl OrchestrationClient for SlowBuild {
        async fn resolve_running_instance(&self, _selector: &str) -> Result<Instance, ClientError> {
            unimplemented!("not used by triggers")
        }

        async fn delete_files(
            &self,
            _instance: &Instance,
            _container: &str,
            _paths: &[String],
            _roots: &[String],
        ) -> Result<(), ClientError> {
            unimplemented!("not used by triggers")
        }

        async fn stream_archive_to(
            &self,
            _instance: &Instance,
            _container: &str,
            _destination: &str,
            _archive: ArchiveReader,
        ) -> Result<(), ClientError> {
            unimplemented!("not used by triggers")
        }

        async fn exec_with_streaming(
            &self,
            _instance: &Instance,
            _container: &str,
            _command: &[String],
            stdout: OutputSender,
            _stderr: OutputSender,
        ) -> Result<(), ClientError> {
            stdout
                .send(b"compiling\n".to_vec())
                .await
                .map_err(|e| ClientError::backend("send", e))?;

            let shown = tokio::time::timeout(Duration::from_secs(5), async {
                while !self.console.contents().contains("compiling") {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
            if shown.is_err() {
                return Err(ClientError::ExitStatus {
                    code: 99,
                    message: "first line never reached the console".to_string(),
                });
            }

            stdout
                .send(b"done\n".to_vec())
                .await
                .map_err(|e| ClientError::backend("send", e))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn lines_reach_the_console_while_the_command_runs() {
        let buf = SharedBuffer::default();
        let client = SlowBuild {
            console: buf.clone(),
        };
        let instance = Instance {
            name: "component-0".to_string(),
            namespace: Some("test".to_string()),
        };

        let output = trigger_and_stream(
            &client,
            &instance,
            "build",
            &["make".to_string()],
            Console::from_writer(buf.clone()),
        )
        .await
        .expect("build output streamed before exit");

        assert_eq!(output, "compiling\ndone\n");
        assert_eq!(buf.contents(), "compiling\ndone\n");
    }

    #[tokio::test]
    async fn partial_chunks_are_joined_into_lines() {
        let buf = SharedBuffer::default();
        let (tx, rx) = mpsc::channel(4);
        let scanner = tokio::spawn(scan_lines(rx, Console::from_writer(buf.clone())));

        tx.send(b"npm ins".to_vec()).await.unwrap();
        tx.send(b"tall\r\nadded 3 pack".to_vec()).await.unwrap();
        tx.send(b"ages".to_vec()).await.unwrap();
        drop(tx);

        let captured = scanner.await.unwrap();
        assert_eq!(captured, "npm install\nadded 3 packages\n");
        assert_eq!(buf.contents(), captured);
    }
}
