//! Shared version-control scaffolding.
//!
//! [`ScmStatus`] is the counter model every VCS segment fills in, and
//! [`Scm`] holds the tool-resolution and path logic they have in common,
//! including running a Windows binary from WSL on a shared drive.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::env::Environment;
use crate::properties::{EXCLUDED_FOLDERS, NATIVE_FALLBACK, Properties};

/// Change counters for a working copy.
///
/// Built empty at the start of a detection pass, filled while parsing
/// status output, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScmStatus {
    pub added: u32,
    pub deleted: u32,
    pub modified: u32,
    pub moved: u32,
    pub untracked: u32,
    pub unmerged: u32,
    pub conflicted: u32,
    /// Category name (`"Added"`, `"Untracked"`, ...) to a display format in
    /// which `{}` is replaced by the count
    pub formats: BTreeMap<String, String>,
}

impl ScmStatus {
    /// Whether anything that affects the next commit changed.
    ///
    /// Untracked and unmerged entries alone don't count.
    pub fn changed(&self) -> bool {
        self.added + self.modified + self.deleted + self.moved + self.conflicted > 0
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicted > 0
    }

    /// Sum of all counters.
    pub fn total(&self) -> u32 {
        self.added
            + self.deleted
            + self.modified
            + self.moved
            + self.untracked
            + self.unmerged
            + self.conflicted
    }
}

impl fmt::Display for ScmStatus {
    /// Non-zero counters in fixed order: `?3 +2 ~1 -4 >1 x1 !1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let categories = [
            ("Untracked", "?", self.untracked),
            ("Added", "+", self.added),
            ("Modified", "~", self.modified),
            ("Deleted", "-", self.deleted),
            ("Moved", ">", self.moved),
            ("Unmerged", "x", self.unmerged),
            ("Conflicted", "!", self.conflicted),
        ];

        let mut out = String::new();
        for (name, prefix, count) in categories {
            if count == 0 {
                continue;
            }
            // Keys may arrive lowercased from the config loader
            let format = self
                .formats
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, format)| format);
            match format {
                Some(format) => out.push_str(&format.replace("{}", &count.to_string())),
                None => {
                    out.push(' ');
                    out.push_str(prefix);
                    out.push_str(&count.to_string());
                }
            }
        }

        f.write_str(out.trim())
    }
}

impl Serialize for ScmStatus {
    /// Templates see the counters plus `changed`, `has_conflicts` and the
    /// rendered `string`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(10))?;
        map.serialize_entry("added", &self.added)?;
        map.serialize_entry("deleted", &self.deleted)?;
        map.serialize_entry("modified", &self.modified)?;
        map.serialize_entry("moved", &self.moved)?;
        map.serialize_entry("untracked", &self.untracked)?;
        map.serialize_entry("unmerged", &self.unmerged)?;
        map.serialize_entry("conflicted", &self.conflicted)?;
        map.serialize_entry("changed", &self.changed())?;
        map.serialize_entry("has_conflicts", &self.has_conflicts())?;
        map.serialize_entry("string", &self.to_string())?;
        map.end()
    }
}

/// Tool resolution and path handling common to VCS segments.
pub struct Scm {
    pub props: Properties,
    pub env: Arc<dyn Environment>,
    /// Resolved executable, empty until [`Scm::resolve_command`] succeeds
    command: String,
    /// Running `<tool>.exe` against a Windows drive from WSL
    windows_binary: bool,
}

impl Scm {
    pub fn new(props: Properties, env: Arc<dyn Environment>) -> Self {
        Self {
            props,
            env,
            command: String::new(),
            windows_binary: false,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Pick the executable for `tool`.
    ///
    /// Inside WSL on a Windows drive the Windows build (`tool.exe`) is
    /// preferred because the Linux build is slow across the filesystem
    /// boundary; `native_fallback` allows the Linux build when no Windows
    /// build is installed.
    pub fn resolve_command(&mut self, tool: &str) -> bool {
        if !self.command.is_empty() {
            return true;
        }

        if self.env.is_wsl() && self.env.in_wsl_shared_drive() {
            let exe = format!("{tool}.exe");
            if self.env.has_command(&exe) {
                self.command = exe;
                self.windows_binary = true;
                return true;
            }
            if !self.props.get_bool(NATIVE_FALLBACK, false) {
                log::debug!("{} not found and native fallback disabled", exe);
                return false;
            }
        }

        if self.env.has_command(tool) {
            self.command = tool.to_string();
            return true;
        }

        log::debug!("{} not found", tool);
        false
    }

    /// Render `dir` the way the resolved executable expects it.
    pub fn command_path(&self, dir: &Path) -> String {
        if self.windows_binary || self.env.goos() == "windows" {
            return self.env.convert_to_windows_path(dir);
        }
        dir.to_string_lossy().into_owned()
    }

    /// Whether the working-copy root matches one of `excluded_folders`.
    ///
    /// Patterns are globs; a leading `~` expands to the home directory.
    pub fn should_ignore_root(&self, dir: &Path) -> bool {
        let home = self.env.home();
        let home = home.to_string_lossy();

        self.props
            .get_string_list(EXCLUDED_FOLDERS, &[])
            .iter()
            .any(|pattern| {
                let expanded = shellexpand::tilde_with_context(pattern, || Some(home.as_ref()));
                match glob::Pattern::new(&expanded) {
                    Ok(glob) => glob.matches_path(dir),
                    Err(e) => {
                        log::debug!("Ignoring invalid excluded folder {}: {}", pattern, e);
                        false
                    }
                }
            })
    }

    /// Run the resolved command, returning trimmed stdout or an empty string
    /// on any failure.
    pub fn output(&self, args: &[&str]) -> String {
        match self.env.run_command(&self.command, args) {
            Ok(output) => output.trim().to_string(),
            Err(e) => {
                log::debug!("{}", e);
                String::new()
            }
        }
    }
}
