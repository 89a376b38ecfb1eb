//! Gzip tar archives of the source tree.
//!
//! The archive is produced on a blocking thread and fed into an async pipe,
//! so the transfer starts before the whole archive exists.

use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;

/// Write `paths` (relative to `root`) as a gzip tar into `writer`.
///
/// Entries keep their relative names. Symlinks are stored as links. Files
/// that vanished since the scan are skipped.
pub fn write_archive<W: Write>(root: &Path, paths: &[String], writer: W) -> io::Result<W> {
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for rel in paths {
        let full = root.join(rel);
        match builder.append_path_with_name(&full, rel) {
            Ok(()) => tracing::debug!(file = %rel, "archived"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(file = %rel, "file disappeared before transfer, skipping");
            }
            Err(err) => return Err(err),
        }
    }

    builder.into_inner()?.finish()
}

/// Synchronous [`Write`] adapter over the write half of a [`tokio::io::duplex`] pipe.
///
/// Must be used from a blocking thread (`spawn_blocking`), never from inside
/// an async task.
pub struct BlockingPipeWriter {
    inner: DuplexStream,
    handle: Handle,
}

impl BlockingPipeWriter {
    pub fn new(inner: DuplexStream, handle: Handle) -> Self {
        Self { inner, handle }
    }

    /// Flush and close the pipe so the reader sees end of stream.
    pub fn shutdown(mut self) -> io::Result<()> {
        let Self { inner, handle } = &mut self;
        handle.block_on(inner.shutdown())
    }
}

impl Write for BlockingPipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Self { inner, handle } = self;
        handle.block_on(inner.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let Self { inner, handle } = self;
        handle.block_on(inner.flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn entries_keep_relative_names() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("src")).unwrap();
        fs::write(root.path().join("src/app.js"), "console.log(1)").unwrap();
        fs::write(root.path().join("package.json"), "{}").unwrap();

        let paths = vec!["package.json".to_string(), "src/app.js".to_string()];
        let bytes = write_archive(root.path(), &paths, Vec::new()).unwrap();
        assert_eq!(entry_names(&bytes), paths);
    }

    #[test]
    fn vanished_files_are_skipped() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("kept.txt"), "k").unwrap();

        let paths = vec!["gone.txt".to_string(), "kept.txt".to_string()];
        let bytes = write_archive(root.path(), &paths, Vec::new()).unwrap();
        assert_eq!(entry_names(&bytes), vec!["kept.txt"]);
    }

    #[test]
    fn content_survives_compression() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), "hello").unwrap();

        let bytes = write_archive(root.path(), &["a.txt".to_string()], Vec::new()).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pipe_writer_feeds_async_reader() {
        use tokio::io::AsyncReadExt;

        let (write_half, mut read_half) = tokio::io::duplex(16);
        let handle = Handle::current();
        let producer = tokio::task::spawn_blocking(move || {
            let mut writer = BlockingPipeWriter::new(write_half, handle);
            writer.write_all(b"streamed through a small pipe")?;
            writer.shutdown()
        });

        let mut received = Vec::new();
        read_half.read_to_end(&mut received).await.unwrap();
        producer.await.unwrap().unwrap();
        assert_eq!(received, b"streamed through a small pipe");
    }
}
