//! Environment provider.
//!
//! Segments perform I/O only through [`Environment`]: environment variables,
//! command execution, file probes, WSL detection, HTTP and the cache. The
//! production implementation is [`Terminal`]; tests substitute a recording
//! mock. One provider instance is shared (read-only) by every segment of a
//! render.

mod terminal;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::Cache;

pub use terminal::{Terminal, is_wsl_shared_path};

/// A file or directory found by [`Environment::has_parent_file_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Full path of the match, e.g. `/work/copy/.svn`
    pub path: PathBuf,
    /// Directory that contains the match, e.g. `/work/copy`
    pub parent_folder: PathBuf,
    pub is_dir: bool,
}

/// No parent directory contains the requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFound {
    pub name: String,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no {} found in any parent directory", self.name)
    }
}

impl std::error::Error for NotFound {}

/// Why an external command produced no usable output.
#[derive(Debug)]
pub enum CommandError {
    /// The process could not be started
    Spawn {
        command: String,
        source: std::io::Error,
    },
    /// The process exited unsuccessfully
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    /// The process was killed after exceeding the command timeout
    TimedOut { command: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Spawn { command, source } => {
                write!(f, "failed to run {command}: {source}")
            }
            CommandError::Failed {
                command,
                code,
                stderr,
            } => {
                match code {
                    Some(code) => write!(f, "{command} exited with status {code}")?,
                    None => write!(f, "{command} was terminated by a signal")?,
                }
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            CommandError::TimedOut { command } => write!(f, "{command} timed out"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Why an HTTP request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The host name could not be resolved (no network, or DNS down)
    Offline,
    /// The server answered with a non-success status
    Status(u16),
    /// Anything else: connect/TLS failure, timeout, bad URL, body read error
    Transport(String),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Offline => write!(f, "host name could not be resolved"),
            HttpError::Status(code) => write!(f, "server returned HTTP {code}"),
            HttpError::Transport(message) => write!(f, "request failed: {message}"),
        }
    }
}

impl std::error::Error for HttpError {}

/// Capability surface consumed by segments.
///
/// Implementations must be safe to share across threads: segments are
/// evaluated in parallel against the same provider.
pub trait Environment: Send + Sync {
    /// Value of an environment variable, empty when unset.
    fn getenv(&self, name: &str) -> String;

    fn has_command(&self, name: &str) -> bool;

    /// Run `name` with `args` in the working directory and return stdout.
    ///
    /// Non-zero exit, spawn failure and timeout are all errors. Callers treat
    /// any error as "unusable right now"; nothing is retried.
    fn run_command(&self, name: &str, args: &[&str]) -> Result<String, CommandError>;

    /// Whether `pattern` (a glob, relative to the working directory unless
    /// absolute) matches at least one path.
    fn has_files(&self, pattern: &str) -> bool;

    /// File content, empty when it can't be read.
    fn file_content(&self, path: &Path) -> String;

    fn home(&self) -> PathBuf;

    /// Walk from the working directory up to the filesystem root looking for
    /// an entry called `name`. The nearest match wins.
    fn has_parent_file_path(&self, name: &str, follow_symlinks: bool)
    -> Result<FileInfo, NotFound>;

    /// Operating system name as in `std::env::consts::OS`.
    fn goos(&self) -> &str;

    /// Running inside Windows Subsystem for Linux.
    fn is_wsl(&self) -> bool;

    /// Running inside WSL with the working directory on a Windows drive
    /// mounted under `/mnt/<letter>`.
    fn in_wsl_shared_drive(&self) -> bool;

    /// Translate a Linux path into the form Windows executables expect.
    /// Returns the input unchanged if translation isn't possible.
    fn convert_to_windows_path(&self, path: &Path) -> String;

    /// GET `url` and return the response body.
    fn http_get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, HttpError>;

    fn cache(&self) -> &dyn Cache;
}
