//! Docker context segment.
//!
//! The active context is taken from the first source that names one, in
//! order: `DOCKER_MACHINE_NAME`, `DOCKER_HOST`, `DOCKER_CONTEXT`, then the
//! CLI config file. With `display_mode = "files"` the segment also shows up
//! (without a context) next to compose files or a Dockerfile.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use super::Segment;
use crate::env::Environment;
use crate::properties::{DISPLAY_MODE, EXTENSIONS, FETCH_CONTEXT, Properties, READ_CONFIG_FILE};

pub const DISPLAY_MODE_CONTEXT: &str = "context";
pub const DISPLAY_MODE_FILES: &str = "files";

const DEFAULT_EXTENSIONS: &[&str] = &[
    "compose.yml",
    "compose.yaml",
    "docker-compose.yml",
    "docker-compose.yaml",
    "Dockerfile",
];

/// A context probe: `Some(name)` stops the chain.
type Probe = fn(&Docker) -> Option<String>;

const PROBES: &[Probe] = &[
    |d| d.context_from_env("DOCKER_MACHINE_NAME"),
    |d| d.context_from_env("DOCKER_HOST"),
    |d| d.context_from_env("DOCKER_CONTEXT"),
    Docker::context_from_config_files,
];

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(rename = "currentContext", default)]
    current_context: String,
}

pub struct Docker {
    props: Properties,
    env: Arc<dyn Environment>,
    pub context: String,
}

/// Empty or `default` means no context was chosen.
fn meaningful(context: &str) -> Option<String> {
    let context = context.trim();
    (!context.is_empty() && context != "default").then(|| context.to_string())
}

impl Docker {
    fn context_from_env(&self, name: &str) -> Option<String> {
        meaningful(&self.env.getenv(name))
    }

    /// `~/.docker/config.json`, then `$DOCKER_CONFIG/config.json`.
    fn config_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.env.home().join(".docker").join("config.json")];
        let custom = self.env.getenv("DOCKER_CONFIG");
        if !custom.is_empty() {
            files.push(PathBuf::from(custom).join("config.json"));
        }
        files
    }

    fn context_from_config_files(&self) -> Option<String> {
        if !self.props.get_bool(READ_CONFIG_FILE, true) {
            return None;
        }

        self.config_files().iter().find_map(|file| {
            if !self.env.has_files(&glob::Pattern::escape(&file.to_string_lossy())) {
                return None;
            }
            let content = self.env.file_content(file);
            match serde_json::from_str::<DockerConfig>(&content) {
                Ok(config) => meaningful(&config.current_context),
                Err(e) => {
                    log::debug!("Ignoring unreadable {}: {}", file.display(), e);
                    None
                }
            }
        })
    }

    fn has_marker_files(&self) -> bool {
        self.props
            .get_string_list(EXTENSIONS, DEFAULT_EXTENSIONS)
            .iter()
            .any(|pattern| self.env.has_files(pattern))
    }
}

impl Segment for Docker {
    fn new(props: Properties, env: Arc<dyn Environment>) -> Self {
        Self {
            props,
            env,
            context: String::new(),
        }
    }

    fn enabled(&mut self) -> bool {
        if self.props.get_bool(FETCH_CONTEXT, true)
            && let Some(context) = PROBES.iter().find_map(|probe| probe(self))
        {
            self.context = context;
            return true;
        }

        if self.props.get_string(DISPLAY_MODE, DISPLAY_MODE_CONTEXT) != DISPLAY_MODE_FILES {
            return false;
        }

        self.has_marker_files()
    }

    fn template(&self) -> &'static str {
        " \u{f308} {{ context }} "
    }

    fn fields(&self) -> minijinja::Value {
        minijinja::context! { context => self.context }
    }
}
