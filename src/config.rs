//! User configuration.
//!
//! A single TOML file lists the segments to render, in order:
//!
//! ```toml
//! command_timeout_ms = 4000
//!
//! [[segments]]
//! type = "svn"
//! template = " {{ branch }} "
//!
//! [segments.properties]
//! fetch_status = true
//! ```
//!
//! Scalar settings can be overridden from the environment with the
//! `PROMPTLINE_` prefix, e.g. `PROMPTLINE_COMMAND_TIMEOUT_MS=1000`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;

use crate::properties::Properties;
use crate::segments::SegmentKind;
use crate::utils::sha256_hex;

const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 4000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-invocation limit for external commands
    pub command_timeout_ms: u64,
    pub segments: Vec<SegmentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            segments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentConfig {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Replaces the segment's default template
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl Config {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// A configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
    /// SHA-256 of the file bytes; hash of the empty input when there is no file
    pub hash: String,
}

impl LoadedConfig {
    /// Identifies what the prompt renders: the shell and the ordered
    /// segment types.
    pub fn features_hash(&self, shell: &str) -> String {
        let kinds: Vec<String> = self
            .config
            .segments
            .iter()
            .map(|segment| segment.kind.to_string())
            .collect();
        sha256_hex(format!("{shell}:{}", kinds.join(",")))
    }
}

/// `explicit`, else `$PROMPTLINE_CONFIG`, else `<config dir>/promptline/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("PROMPTLINE_CONFIG")
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }

    choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("promptline").join("config.toml"))
}

/// Load the configuration at `path`. A missing file gives the defaults.
pub fn load(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_with_env(path, None)
}

fn load_with_env(
    path: Option<&Path>,
    env_vars: Option<Map<String, String>>,
) -> Result<LoadedConfig, ConfigError> {
    let contents = match path {
        Some(path) if path.exists() => {
            log::debug!("Loading config from {}", path.display());
            std::fs::read_to_string(path).map_err(|e| {
                ConfigError::Message(format!("Failed to read {}: {}", path.display(), e))
            })?
        }
        Some(path) => {
            log::debug!("No config at {}, using defaults", path.display());
            String::new()
        }
        None => String::new(),
    };

    let config = config::Config::builder()
        .add_source(File::from_str(&contents, FileFormat::Toml))
        .add_source(
            Environment::with_prefix("PROMPTLINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env_vars),
        )
        .build()?
        .try_deserialize::<Config>()?;

    Ok(LoadedConfig {
        config,
        path: path.map(Path::to_path_buf),
        hash: sha256_hex(contents.as_bytes()),
    })
}
