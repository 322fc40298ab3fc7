//! Recording environment for segment unit tests.
//!
//! Every probe is answered from fixed tables and counted, so tests can assert
//! not only what a segment decided but which probes it consulted.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::{CommandError, Environment, FileInfo, HttpError, NotFound};
use crate::cache::{Cache, MemoryCache};

#[derive(Default)]
pub(crate) struct MockEnvironment {
    env_vars: HashMap<String, String>,
    broken_env_vars: HashSet<String>,
    commands: HashSet<String>,
    outputs: HashMap<String, Result<String, String>>,
    files: HashSet<String>,
    file_contents: HashMap<PathBuf, String>,
    parent_files: HashMap<String, FileInfo>,
    home: PathBuf,
    wsl: bool,
    shared_drive: bool,
    http: Option<Result<Vec<u8>, HttpError>>,
    cache: MemoryCache,
    calls: Mutex<HashMap<String, usize>>,
}

fn command_key(name: &str, args: &[&str]) -> String {
    std::iter::once(name)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            home: PathBuf::from("/home/user"),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env_vars.insert(name.to_string(), value.to_string());
        self
    }

    /// Make `getenv(name)` panic, standing in for a buggy probe.
    pub fn with_panicking_env(mut self, name: &str) -> Self {
        self.broken_env_vars.insert(name.to_string());
        self
    }

    pub fn with_command(mut self, name: &str) -> Self {
        self.commands.insert(name.to_string());
        self
    }

    /// Answer `name args...` with `output`.
    pub fn with_output(mut self, name: &str, args: &[&str], output: &str) -> Self {
        self.outputs
            .insert(command_key(name, args), Ok(output.to_string()));
        self
    }

    /// Make `name args...` exit unsuccessfully with `stderr`.
    pub fn with_failure(mut self, name: &str, args: &[&str], stderr: &str) -> Self {
        self.outputs
            .insert(command_key(name, args), Err(stderr.to_string()));
        self
    }

    /// Make `has_files(pattern)` succeed.
    pub fn with_files(mut self, pattern: &str) -> Self {
        self.files.insert(pattern.to_string());
        self
    }

    pub fn with_file_content(mut self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.file_contents.insert(path.into(), content.to_string());
        self
    }

    pub fn with_parent_file(mut self, name: &str, info: FileInfo) -> Self {
        self.parent_files.insert(name.to_string(), info);
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn with_wsl(mut self, shared_drive: bool) -> Self {
        self.wsl = true;
        self.shared_drive = shared_drive;
        self
    }

    pub fn with_http(mut self, response: Result<&str, HttpError>) -> Self {
        self.http = Some(response.map(|body| body.as_bytes().to_vec()));
        self
    }

    /// How many times the probe identified by `key` ran, e.g.
    /// `"getenv DOCKER_HOST"` or `"run svn status /wc"`.
    pub fn calls(&self, key: &str) -> usize {
        self.lock_calls().get(key).copied().unwrap_or(0)
    }

    /// Total number of probes whose key starts with `prefix`.
    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        self.lock_calls()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, count)| count)
            .sum()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, HashMap<String, usize>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, key: String) {
        *self.lock_calls().entry(key).or_insert(0) += 1;
    }
}

impl Environment for MockEnvironment {
    fn getenv(&self, name: &str) -> String {
        self.record(format!("getenv {name}"));
        if self.broken_env_vars.contains(name) {
            panic!("getenv {name} exploded");
        }
        self.env_vars.get(name).cloned().unwrap_or_default()
    }

    fn has_command(&self, name: &str) -> bool {
        self.record(format!("has_command {name}"));
        self.commands.contains(name)
    }

    fn run_command(&self, name: &str, args: &[&str]) -> Result<String, CommandError> {
        let key = command_key(name, args);
        self.record(format!("run {key}"));
        match self.outputs.get(&key) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(stderr)) => Err(CommandError::Failed {
                command: name.to_string(),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Err(CommandError::Spawn {
                command: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, key),
            }),
        }
    }

    fn has_files(&self, pattern: &str) -> bool {
        self.record(format!("has_files {pattern}"));
        self.files.contains(pattern)
    }

    fn file_content(&self, path: &Path) -> String {
        self.record(format!("file_content {}", path.display()));
        self.file_contents.get(path).cloned().unwrap_or_default()
    }

    fn home(&self) -> PathBuf {
        self.home.clone()
    }

    fn has_parent_file_path(
        &self,
        name: &str,
        _follow_symlinks: bool,
    ) -> Result<FileInfo, NotFound> {
        self.record(format!("has_parent_file_path {name}"));
        self.parent_files.get(name).cloned().ok_or_else(|| NotFound {
            name: name.to_string(),
        })
    }

    fn goos(&self) -> &str {
        "linux"
    }

    fn is_wsl(&self) -> bool {
        self.wsl
    }

    fn in_wsl_shared_drive(&self) -> bool {
        self.wsl && self.shared_drive
    }

    fn convert_to_windows_path(&self, path: &Path) -> String {
        // Mirrors `wslpath -m`: /mnt/c/x -> C:/x
        let linux = path.to_string_lossy();
        match linux.strip_prefix("/mnt/") {
            Some(rest) if !rest.is_empty() => {
                let (drive, tail) = rest.split_at(1);
                format!("{}:{}", drive.to_uppercase(), tail)
            }
            _ => linux.into_owned(),
        }
    }

    fn http_get(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, HttpError> {
        self.record(format!("http_get {url}"));
        self.http
            .clone()
            .unwrap_or_else(|| Err(HttpError::Transport("no mock response".into())))
    }

    fn cache(&self) -> &dyn Cache {
        &self.cache
    }
}
