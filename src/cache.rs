//! Cross-render key/value cache.
//!
//! A prompt is rendered dozens of times per terminal session, so segments
//! that do expensive detection (network lookups) store results here. Each
//! store is scoped by [`cache_scope`]: a hash of the configuration content,
//! the enabled feature set and the shell session id. Editing the config or
//! opening a new terminal therefore starts from an empty scope, while
//! repeated renders in one session share entries.
//!
//! [`FileCache`] keeps one JSON file per scope under the cache directory:
//! `<cache_dir>/promptline/<scope>.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use dashmap::DashMap;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::utils::{get_now, sha256_hex};

/// How long a cache entry stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Expire after this many minutes. Zero means "don't store".
    Minutes(u64),
    /// Live for as long as the scope exists.
    Infinite,
}

impl Ttl {
    fn expires_at(self, now: u64) -> Option<u64> {
        match self {
            Ttl::Minutes(minutes) => Some(now.saturating_add(minutes.saturating_mul(60))),
            Ttl::Infinite => None,
        }
    }
}

/// Key/value store shared by every segment of a render.
///
/// Writes are last-write-wins per key; there is no cross-key transaction.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl: Ttl);
    /// Flush pending writes to the backing store.
    fn persist(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Entry {
    value: String,
    /// Unix timestamp; `None` never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
}

impl Entry {
    fn new(value: &str, ttl: Ttl, now: u64) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.expires_at(now),
        }
    }

    fn is_live(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Derive the scope identifier for a (configuration, features, session)
/// triple.
///
/// Pure: identical inputs always give the same 16 hex characters.
pub fn cache_scope(config_hash: &str, features_hash: &str, session_id: &str) -> String {
    let mut digest = sha256_hex(format!("{config_hash}.{features_hash}.{session_id}"));
    digest.truncate(16);
    digest
}

/// Cache directory: `$PROMPTLINE_CACHE_DIR`, else the platform cache dir.
pub fn default_cache_dir() -> Option<PathBuf> {
    use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

    if let Ok(dir) = std::env::var("PROMPTLINE_CACHE_DIR")
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }

    choose_base_strategy()
        .ok()
        .map(|strategy| strategy.cache_dir().join("promptline"))
}

/// Remove every scope file in `dir`, returning how many were removed.
pub fn clear_all(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == "json" || ext == "lock")
        })
        .filter(|path| fs::remove_file(path).is_ok())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .count()
}

/// In-process cache with no backing file.
///
/// Used when no cache directory can be determined, and in tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        entry.is_live(get_now()).then(|| entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) {
        if ttl == Ttl::Minutes(0) {
            return;
        }
        self.entries
            .insert(key.to_string(), Entry::new(value, ttl, get_now()));
    }

    fn persist(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// File-backed cache for one scope.
///
/// Entries are loaded once when opened. Writes land in memory and are
/// remembered as dirty; [`Cache::persist`] merges them into whatever is on
/// disk at that moment under an exclusive file lock, so concurrent shells
/// writing different keys don't clobber each other.
pub struct FileCache {
    path: PathBuf,
    lock_path: PathBuf,
    entries: DashMap<String, Entry>,
    dirty: DashMap<String, Entry>,
}

impl FileCache {
    /// Open the scope file `<dir>/<scope>.json`. A missing or corrupt file
    /// opens as an empty cache.
    pub fn open(dir: &Path, scope: &str) -> Self {
        let path = dir.join(format!("{scope}.json"));
        let lock_path = dir.join(format!("{scope}.lock"));
        let entries = DashMap::new();
        for (key, entry) in read_entries(&path) {
            entries.insert(key, entry);
        }

        Self {
            path,
            lock_path,
            entries,
            dirty: DashMap::new(),
        }
    }

    /// Location of the scope file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_entries(path: &Path) -> HashMap<String, Entry> {
    let Ok(json) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    serde_json::from_str(&json).unwrap_or_else(|e| {
        log::debug!("Ignoring corrupt cache file {}: {}", path.display(), e);
        HashMap::new()
    })
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        entry.is_live(get_now()).then(|| entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) {
        if ttl == Ttl::Minutes(0) {
            return;
        }
        let entry = Entry::new(value, ttl, get_now());
        self.entries.insert(key.to_string(), entry.clone());
        self.dirty.insert(key.to_string(), entry);
    }

    fn persist(&self) -> anyhow::Result<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        let dir = self
            .path
            .parent()
            .context("Cache file has no parent directory")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;

        let lock = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open {}", self.lock_path.display()))?;
        lock.lock_exclusive()
            .context("Failed to lock cache file")?;

        // Re-read under the lock so writes from other sessions since we
        // opened are kept.
        let mut merged = read_entries(&self.path);
        for item in self.dirty.iter() {
            merged.insert(item.key().clone(), item.value().clone());
        }
        let now = get_now();
        merged.retain(|_, entry| entry.is_live(now));

        let json = serde_json::to_string(&merged).context("Failed to serialize cache")?;

        // Write to temp file first, then rename for atomic update
        let temp_path = self.path.with_extension("json.tmp");
        let written = fs::write(&temp_path, json)
            .with_context(|| format!("Failed to write {}", temp_path.display()))
            .and_then(|()| {
                #[cfg(windows)]
                let _ = fs::remove_file(&self.path);
                fs::rename(&temp_path, &self.path)
                    .with_context(|| format!("Failed to replace {}", self.path.display()))
            });
        if written.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        let _ = FileExt::unlock(&lock);
        written?;

        self.dirty.clear();
        log::debug!("Persisted cache {}", self.path.display());
        Ok(())
    }
}
