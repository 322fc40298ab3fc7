
use std::path::{Path, PathBuf};
use std::process::Command;

use insta_cmd::get_cargo_bin;
use tempfile::TempDir;

/// Fixed session so cache scopes are reproducible across runs.
pub const TEST_SESSION_ID: &str = "00000000-0000-4000-8000-000000000000";

/// Isolated sandbox for driving the `promptline` binary.
///
/// Every run gets its own home, config, cache and `bin/` directory. `PATH`
/// contains only `bin/`, so the binary sees exactly the mock tools a test
/// installs and nothing from the host.
pub struct TestEnv {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // Canonicalize to resolve symlinks (important on macOS where /var is symlink to /private/var)
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp path");

        for dir in ["home", "work", "bin", "cache", "config"] {
            std::fs::create_dir_all(root.join(dir)).expect("Failed to create sandbox directory");
        }

        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn home(&self) -> PathBuf {
        self.root.join("home")
    }

    /// Directory the prompt is rendered in.
    pub fn work_dir(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config").join("config.toml")
    }

    pub fn write_config(&self, contents: &str) {
        std::fs::write(self.config_path(), contents).expect("Failed to write config");
    }

    /// Turn the work dir into an svn working copy root.
    pub fn make_working_copy(&self) {
        std::fs::create_dir_all(self.work_dir().join(".svn")).expect("Failed to create .svn");
    }

    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(path, contents).expect("Failed to write file");
    }

    /// A `promptline` invocation with a scrubbed environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(get_cargo_bin("promptline"));
        cmd.env_clear()
            .env("PATH", self.bin_dir())
            .env("HOME", self.home())
            .env("XDG_CONFIG_HOME", self.root.join("config"))
            .env("XDG_CACHE_HOME", self.cache_dir())
            .env("PROMPTLINE_CACHE_DIR", self.cache_dir())
            .env("PROMPTLINE_CONFIG", self.config_path())
            .env("PROMPTLINE_SESSION_ID", TEST_SESSION_ID)
            .env("SOURCE_DATE_EPOCH", "1704067200")
            .current_dir(self.work_dir());
        cmd
    }

    /// Run `promptline print` and return stdout.
    pub fn print(&self, configure: impl FnOnce(&mut Command)) -> String {
        let mut cmd = self.command();
        cmd.arg("print");
        configure(&mut cmd);
        let output = cmd.output().expect("Failed to run promptline");
        assert!(
            output.status.success(),
            "promptline print failed:\nstderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("prompt is not UTF-8")
    }

    /// Paths of the cache files written so far.
    pub fn cache_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.cache_dir())
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files
    }
}
