//! User-facing progress output.
//!
//! Progress lines are written to a [`Console`], not to the log. A [`Status`]
//! prints a pending line when created and a single completion line when it
//! ends, whichever way it ends.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use colored::Colorize;

/// Shared, cloneable output sink.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<dyn Write + Send>>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Console {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one line. Output errors are ignored; progress is best-effort.
    pub fn line(&self, text: &str) {
        let mut out = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    /// Start a progress indicator.
    pub fn status(&self, message: impl Into<String>) -> Status {
        Status::start(self.clone(), message.into())
    }
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).flush()
    }
}

/// A progress indicator that ends exactly once.
///
/// Dropping an unfinished status reports it as failed.
#[derive(Debug)]
pub struct Status {
    console: Console,
    message: String,
    ended: bool,
}

impl Status {
    fn start(console: Console, message: String) -> Self {
        console.line(&format!(" {} {message}...", "•".cyan()));
        Self {
            console,
            message,
            ended: false,
        }
    }

    pub fn succeed(mut self) {
        self.end(true);
    }

    pub fn fail(mut self) {
        self.end(false);
    }

    fn end(&mut self, ok: bool) {
        if self.ended {
            return;
        }
        self.ended = true;
        let mark = if ok { "✓".green() } else { "✗".red() };
        self.console.line(&format!(" {mark} {}", self.message));
    }
}

impl Drop for Status {
    fn drop(&mut self) {
        self.end(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SharedBuffer;

    #[test]
    fn status_ends_once_on_success() {
        colored::control::set_override(false);
        let buf = SharedBuffer::default();
        let console = Console::from_writer(buf.clone());

        console.status("Syncing files").succeed();

        let out = buf.contents();
        assert_eq!(out.matches("Syncing files").count(), 2, "{out}");
        assert!(out.contains("✓ Syncing files"));
        assert!(!out.contains('✗'));
    }

    #[test]
    fn dropped_status_reports_failure() {
        colored::control::set_override(false);
        let buf = SharedBuffer::default();
        let console = Console::from_writer(buf.clone());

        {
            let _status = console.status("Building");
        }

        let out = buf.contents();
        assert!(out.contains("✗ Building"), "{out}");
        assert!(!out.contains('✓'));
    }
}
