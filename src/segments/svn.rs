//! Subversion working-copy segment.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::Segment;
use super::scm::{Scm, ScmStatus};
use crate::env::{Environment, FileInfo};
use crate::properties::{FETCH_STATUS, Properties, STATUS_FORMATS};

static SVNDIR_POINTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^svndir: (.*)$").expect("valid regex"));

pub struct Svn {
    scm: Scm,
    /// Directory holding the svn metadata
    pub main_scm_dir: PathBuf,
    /// Working-copy root
    pub repo_root_dir: PathBuf,
    /// `repo_root_dir` as passed to the svn executable
    pub real_dir: String,
    pub branch: String,
    pub base_rev: u32,
    pub repo: String,
    pub working: Option<ScmStatus>,
}

impl Segment for Svn {
    fn new(props: Properties, env: Arc<dyn Environment>) -> Self {
        Self {
            scm: Scm::new(props, env),
            main_scm_dir: PathBuf::new(),
            repo_root_dir: PathBuf::new(),
            real_dir: String::new(),
            branch: String::new(),
            base_rev: 0,
            repo: String::new(),
            working: None,
        }
    }

    fn enabled(&mut self) -> bool {
        if !self.scm.resolve_command("svn") {
            return false;
        }

        let marker = match self.scm.env.has_parent_file_path(".svn", false) {
            Ok(marker) => marker,
            Err(e) => {
                log::debug!("{}", e);
                return false;
            }
        };

        if self.scm.should_ignore_root(&marker.parent_folder) {
            log::debug!("{} is excluded", marker.parent_folder.display());
            return false;
        }

        if !self.classify_root(marker) {
            return false;
        }

        self.real_dir = self.scm.command_path(&self.repo_root_dir);

        if !self.scm.props.get_bool(FETCH_STATUS, false) {
            self.working = Some(ScmStatus {
                formats: self.scm.props.get_string_map(STATUS_FORMATS),
                ..Default::default()
            });
            return true;
        }

        self.fetch();
        true
    }

    fn template(&self) -> &'static str {
        " \u{e0a0}{{ branch }} r{{ base_rev }} {{ working.string }} "
    }

    fn fields(&self) -> minijinja::Value {
        minijinja::context! {
            branch => self.branch,
            base_rev => self.base_rev,
            repo => self.repo,
            working => minijinja::Value::from_serialize(self.working.clone().unwrap_or_default()),
        }
    }
}

impl Svn {
    /// A `.svn` directory marks the root directly; a `.svn` file points at
    /// the metadata elsewhere with a `svndir: <path>` line.
    fn classify_root(&mut self, marker: FileInfo) -> bool {
        if marker.is_dir {
            self.main_scm_dir = marker.path;
            self.repo_root_dir = marker.parent_folder;
            return true;
        }

        let content = self.scm.env.file_content(&marker.path);
        let pointer = SVNDIR_POINTER
            .captures(&content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|dir| !dir.is_empty());

        match pointer {
            Some(dir) => {
                self.main_scm_dir = PathBuf::from(dir);
                self.repo_root_dir = marker.parent_folder;
                true
            }
            None => {
                log::debug!("{} has no svndir pointer", marker.path.display());
                false
            }
        }
    }

    /// Identity and status queries are independent; each failure degrades
    /// only its own field.
    fn fetch(&mut self) {
        let scm = &self.scm;
        let dir = self.real_dir.as_str();

        let ((revision, relative_url), (root_url, status)) = rayon::join(
            || {
                rayon::join(
                    || scm.output(&["info", dir, "--show-item", "revision"]),
                    || scm.output(&["info", dir, "--show-item", "relative-url"]),
                )
            },
            || {
                rayon::join(
                    || scm.output(&["info", dir, "--show-item", "repos-root-url"]),
                    || scm.output(&["status", dir]),
                )
            },
        );

        let formats = scm.props.get_string_map(STATUS_FORMATS);
        self.base_rev = parse_revision(&revision);
        self.branch = parse_branch(&relative_url);
        self.repo = repo_display_name(&root_url);
        self.working = Some(parse_status(&status, formats));
    }
}

/// Base revision, zero when the output isn't a number.
pub fn parse_revision(output: &str) -> u32 {
    output.trim().parse().unwrap_or(0)
}

/// Branch from `svn info --show-item relative-url`: `^/trunk` becomes `trunk`.
pub fn parse_branch(output: &str) -> String {
    let trimmed = output.trim();
    trimmed.strip_prefix("^/").unwrap_or(trimmed).to_string()
}

/// Short name for a repository root URL.
///
/// The last path segment, or the host when there is no path. A trailing
/// slash makes no difference; unparseable input gives an empty string.
pub fn repo_display_name(root_url: &str) -> String {
    let trimmed = root_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }

    let url = match url::Url::parse(trimmed) {
        Ok(url) => url,
        Err(e) => {
            log::debug!("Unparseable repository root {}: {}", trimmed, e);
            return String::new();
        }
    };

    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .or_else(|| url.host_str())
        .unwrap_or_default()
        .to_string()
}

/// Count `svn status` lines by their first-column code.
///
/// A missing file (`!`) counts as deleted. Unknown codes and blank lines
/// are ignored.
pub fn parse_status(output: &str, formats: BTreeMap<String, String>) -> ScmStatus {
    let mut status = ScmStatus {
        formats,
        ..Default::default()
    };

    for line in output.lines() {
        let Some(code) = line.chars().next() else {
            continue;
        };
        match code {
            '?' => status.untracked += 1,
            '!' | 'D' => status.deleted += 1,
            'A' => status.added += 1,
            'M' => status.modified += 1,
            'C' => status.conflicted += 1,
            'R' => status.moved += 1,
            _ => {}
        }
    }

    status
}
