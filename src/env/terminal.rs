//! The real environment provider.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use super::{CommandError, Environment, FileInfo, HttpError, NotFound};
use crate::cache::Cache;
use crate::shell_exec::Cmd;

/// Environment provider backed by the running process.
pub struct Terminal {
    pwd: PathBuf,
    home: PathBuf,
    command_timeout: Duration,
    cache: Box<dyn Cache>,
    is_wsl: OnceLock<bool>,
}

impl Terminal {
    /// Build a provider for `pwd`.
    ///
    /// `command_timeout` applies to every [`Environment::run_command`] call.
    pub fn new(pwd: PathBuf, command_timeout: Duration, cache: Box<dyn Cache>) -> Self {
        let home = etcetera::home_dir().unwrap_or_default();
        Self {
            pwd,
            home,
            command_timeout,
            cache,
            is_wsl: OnceLock::new(),
        }
    }

    fn detect_wsl() -> bool {
        if !cfg!(target_os = "linux") {
            return false;
        }
        if std::env::var("WSL_DISTRO_NAME").is_ok_and(|v| !v.is_empty()) {
            return true;
        }
        fs::read_to_string("/proc/version")
            .map(|v| v.to_lowercase().contains("microsoft"))
            .unwrap_or(false)
    }
}

/// Whether `path` lives on a Windows drive mounted into WSL (`/mnt/c/...`).
pub fn is_wsl_shared_path(path: &Path) -> bool {
    let mut components = path.components();
    matches!(
        (components.next(), components.next(), components.next()),
        (Some(Component::RootDir), Some(Component::Normal(mnt)), Some(Component::Normal(drive)))
            if mnt == "mnt"
                && drive.len() == 1
                && drive.to_str().is_some_and(|d| d.chars().all(|c| c.is_ascii_alphabetic()))
    )
}

/// Resolver messages for a host name that does not exist, as opposed to a
/// resolver that could not be reached or asked us to try again.
const UNKNOWN_HOST_MARKERS: &[&str] = &[
    "not known",
    "no address associated",
    "no such host",
];

/// Whether a request failed in name resolution because the host is unknown.
///
/// The resolver error sits a few levels down the source chain, under a
/// `dns error` layer added by the connector.
fn is_unknown_host(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut in_dns = false;
    let mut current = Some(err);
    while let Some(layer) = current {
        let message = layer.to_string().to_lowercase();
        in_dns |= message.starts_with("dns error");
        if in_dns
            && UNKNOWN_HOST_MARKERS
                .iter()
                .any(|marker| message.contains(marker))
        {
            return true;
        }
        current = layer.source();
    }
    false
}

impl Environment for Terminal {
    fn getenv(&self, name: &str) -> String {
        std::env::var(name).unwrap_or_default()
    }

    fn has_command(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    fn run_command(&self, name: &str, args: &[&str]) -> Result<String, CommandError> {
        let output = Cmd::new(name)
            .args(args.iter().copied())
            .current_dir(&self.pwd)
            .context(name)
            .timeout(self.command_timeout)
            .run()
            .map_err(|source| match source.kind() {
                ErrorKind::TimedOut => CommandError::TimedOut {
                    command: name.to_string(),
                },
                _ => CommandError::Spawn {
                    command: name.to_string(),
                    source,
                },
            })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: name.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn has_files(&self, pattern: &str) -> bool {
        let full = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            let base = glob::Pattern::escape(&self.pwd.to_string_lossy());
            format!("{base}/{pattern}")
        };

        match glob::glob(&full) {
            Ok(mut paths) => paths.any(|p| p.is_ok()),
            Err(e) => {
                log::debug!("Invalid file pattern {}: {}", pattern, e);
                false
            }
        }
    }

    fn file_content(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    fn home(&self) -> PathBuf {
        self.home.clone()
    }

    fn has_parent_file_path(
        &self,
        name: &str,
        follow_symlinks: bool,
    ) -> Result<FileInfo, NotFound> {
        let mut current = Some(self.pwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(name);
            let metadata = if follow_symlinks {
                fs::metadata(&candidate)
            } else {
                fs::symlink_metadata(&candidate)
            };

            if let Ok(metadata) = metadata {
                // A symlinked directory still counts as a directory
                let is_dir = metadata.is_dir()
                    || (metadata.file_type().is_symlink()
                        && fs::metadata(&candidate).is_ok_and(|target| target.is_dir()));
                let path = if follow_symlinks {
                    dunce::canonicalize(&candidate).unwrap_or(candidate)
                } else {
                    candidate
                };
                let parent_folder = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                return Ok(FileInfo {
                    path,
                    parent_folder,
                    is_dir,
                });
            }

            current = dir.parent();
        }

        Err(NotFound {
            name: name.to_string(),
        })
    }

    fn goos(&self) -> &str {
        std::env::consts::OS
    }

    fn is_wsl(&self) -> bool {
        *self.is_wsl.get_or_init(Self::detect_wsl)
    }

    fn in_wsl_shared_drive(&self) -> bool {
        self.is_wsl() && is_wsl_shared_path(&self.pwd)
    }

    fn convert_to_windows_path(&self, path: &Path) -> String {
        let linux = path.to_string_lossy();
        match self.run_command("wslpath", &["-m", &linux]) {
            Ok(converted) if !converted.trim().is_empty() => converted.trim().to_string(),
            Ok(_) => linux.into_owned(),
            Err(e) => {
                log::debug!("wslpath failed for {}: {}", linux, e);
                linux.into_owned()
            }
        }
    }

    fn http_get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, HttpError> {
        let parsed = url::Url::parse(url).map_err(|e| HttpError::Transport(e.to_string()))?;

        log::debug!("GET {} (timeout {:?})", url, timeout);
        // The client timeout covers name resolution as well as the transfer
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let response = client.get(parsed).send().map_err(|e| {
            if is_unknown_host(&e) {
                log::debug!("Host of {} could not be resolved: {:#}", url, e);
                HttpError::Offline
            } else {
                HttpError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }

        response
            .bytes()
            .map(|body| body.to_vec())
            .map_err(|e| HttpError::Transport(e.to_string()))
    }

    fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }
}
