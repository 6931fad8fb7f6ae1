//! Remembers which store path holds the tree for a given key, so fetching an input that
//! resolves to an already-seen revision skips the download.

// A BTree keeps the cache file's order stable between runs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use crate::attrs::Attrs;
use crate::error::Result;
use crate::store::StorePath;

const CACHE_FILE_NAME: &str = "git-archive-cache.json";

/// A key-value store from attribute bags to store paths.
pub trait Cache: Send + Sync {
    /// The value and store path recorded for `key`, if any.
    fn lookup(&self, key: &Attrs) -> Result<Option<(Attrs, StorePath)>>;

    /// Record `value` and `path` under `key`. An existing entry is only replaced when
    /// `may_overwrite` is set.
    fn add(&self, key: &Attrs, value: Attrs, path: &StorePath, may_overwrite: bool) -> Result<()>;
}

/// One recorded key with its value and store path.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CacheEntry {
    pub key: Attrs,
    pub value: Attrs,
    pub path: StorePath,
}

/// A [`Cache`] held in memory and persisted as a JSON file, indexed by a digest of each key.
///
/// Entries added through [`Cache::add`] are written back to disk immediately.
#[derive(Debug)]
pub struct FileCache {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
    cache_file: PathBuf,
}

fn digest(key: &Attrs) -> Result<String> {
    Ok(hex::encode(Sha256::digest(serde_json::to_vec(key)?)))
}

impl FileCache {
    /// Load the cache from `cache_dir`, starting empty if it has no cache file yet.
    pub fn load<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_file = cache_dir.as_ref().join(CACHE_FILE_NAME);
        let entries = if cache_file.is_file() {
            serde_json::from_str(&std::fs::read_to_string(&cache_file)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            entries: Mutex::new(entries),
            cache_file,
        })
    }

    /// Whether `cache_dir` holds a cache file.
    pub fn exists<P: AsRef<Path>>(cache_dir: P) -> bool {
        cache_dir.as_ref().join(CACHE_FILE_NAME).is_file()
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Write the cache file, replacing it atomically.
    pub fn save(&self) -> Result<()> {
        let entries = self.lock();
        self.persist(&entries)
    }

    /// A snapshot of every entry, in key-digest order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.lock().values().cloned().collect()
    }

    /// Forget the entry for `key`, returning it if there was one. Not persisted until the
    /// next [`FileCache::save`].
    pub fn remove(&self, key: &Attrs) -> Result<Option<CacheEntry>> {
        let digest = digest(key)?;
        Ok(self.lock().remove(&digest))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Callers hold the lock while writing so snapshots reach the disk in the order they were taken.
    fn persist(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        write_atomically(&self.cache_file, json.as_bytes())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheEntry>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn write_atomically(dest: &Path, contents: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut staged, contents)?;
    staged.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

impl Cache for FileCache {
    fn lookup(&self, key: &Attrs) -> Result<Option<(Attrs, StorePath)>> {
        let digest = digest(key)?;
        Ok(self
            .lock()
            .get(&digest)
            .map(|entry| (entry.value.clone(), entry.path.clone())))
    }

    fn add(&self, key: &Attrs, value: Attrs, path: &StorePath, may_overwrite: bool) -> Result<()> {
        let digest = digest(key)?;
        let mut entries = self.lock();
        if entries.contains_key(&digest) && !may_overwrite {
            tracing::debug!("keeping existing cache entry for {key:?}");
            return Ok(());
        }
        entries.insert(
            digest,
            CacheEntry {
                key: key.clone(),
                value,
                path: path.clone(),
            },
        );
        self.persist(&entries)
    }
}
