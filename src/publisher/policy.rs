//! Policies: where formatted messages go
//!
//! Every message is written followed by a newline. I/O failures never reach
//! the producer: a message that cannot be written is skipped.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Delivery mechanism for formatted messages
pub trait Policy: Send + 'static {
    /// Write one message
    fn write(&mut self, msg: &str);
}

/// Writes each message to the terminal and flushes immediately
///
/// The writer defaults to standard output; any `Write` implementation can be
/// injected, which is how tests capture terminal output.
#[derive(Debug)]
pub struct TerminalPolicy<W: Write + Send + 'static = Stdout> {
    out: W,
}

impl TerminalPolicy<Stdout> {
    /// Policy writing to standard output
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for TerminalPolicy<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send + 'static> TerminalPolicy<W> {
    /// Policy writing to `out`
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    /// Borrow the underlying writer
    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write + Send + 'static> Policy for TerminalPolicy<W> {
    fn write(&mut self, msg: &str) {
        let result = self
            .out
            .write_all(msg.as_bytes())
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());

        if let Err(e) = result {
            debug!(error = %e, "Dropping message, terminal write failed");
        }
    }
}

/// Appends each message to a file and flushes it
#[derive(Debug)]
pub struct FilePolicy {
    path: PathBuf,
    file: Option<File>,
}

impl FilePolicy {
    /// Open `path` for appending, creating it if needed
    ///
    /// If the file cannot be opened, a warning is logged and every later
    /// write is skipped.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match open_append(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open log file, messages will be skipped");
                None
            }
        };

        Self { path, file }
    }

    /// Open `path` for appending, reporting failure to the caller
    pub fn try_open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was opened successfully
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().append(true).create(true).open(path)
}

impl Policy for FilePolicy {
    fn write(&mut self, msg: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let result = file
            .write_all(msg.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush());

        if let Err(e) = result {
            debug!(path = %self.path.display(), error = %e, "Dropping message, file write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[test]
    fn test_terminal_policy_writes_line() {
        let mut policy = TerminalPolicy::with_writer(Vec::new());
        policy.write("XYZ");
        policy.write("");
        assert_eq!(policy.writer().as_slice(), b"XYZ\n\n");
    }

    #[test]
    fn test_file_policy_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("policy.log");

        let mut policy = FilePolicy::new(&path);
        assert!(policy.is_open());
        policy.write("DATA");
        drop(policy);

        let mut policy = FilePolicy::try_open(&path).unwrap();
        policy.write("MORE");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "DATA\nMORE\n");
    }

    #[test]
    #[traced_test]
    fn test_file_policy_open_failure_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("policy.log");

        let mut policy = FilePolicy::new(&path);
        assert!(!policy.is_open());
        policy.write("ignored");

        assert!(logs_contain("Failed to open log file"));
        assert!(FilePolicy::try_open(&path).is_err());
    }
}
