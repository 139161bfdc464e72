use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{
    error::Result,
    types::{CachedAnalysis, HistoryEntry},
};

/// One persisted analysis, stored as `<key>.json` in the cache directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub payload: CachedAnalysis,
}

/// Content-addressed store of completed analyses.
///
/// The key is sha256(input :: model :: prompt_hash), so editing the prompt
/// template invalidates every prior entry with no migration step. Writes
/// are idempotent upserts: identical requests overwrite, never duplicate.
pub struct CacheStore {
    dir: PathBuf,
    prompt_hash: String,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, prompt_hash: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prompt_hash: prompt_hash.into(),
        })
    }

    /// Default cache location under the user cache directory.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("storyarc")
    }

    pub fn cache_key(&self, input: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hasher.update(b"::");
        hasher.update(model.as_bytes());
        hasher.update(b"::");
        hasher.update(self.prompt_hash.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn lookup(&self, input: &str, model: &str) -> Option<CachedAnalysis> {
        let key = self.cache_key(input, model);
        let entry = self.read_entry(&self.entry_path(&key)?);
        match &entry {
            Some(_) => debug!(key = %&key[..8], "cache hit"),
            None => debug!(key = %&key[..8], "cache miss"),
        }
        entry.map(|e| e.payload)
    }

    pub fn store(&self, input: &str, model: &str, payload: &CachedAnalysis) -> Result<String> {
        let key = self.cache_key(input, model);
        let entry = CacheEntry {
            key: key.clone(),
            model: model.to_string(),
            timestamp: Utc::now(),
            payload: payload.clone(),
        };
        // Write-then-rename so a crash mid-write never leaves a partial
        // entry that would shadow the key as a permanent miss.
        let path = self.dir.join(format!("{key}.json"));
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        debug!(key = %&key[..8], "cache saved");
        Ok(key)
    }

    pub fn get_by_key(&self, key: &str) -> Option<CachedAnalysis> {
        self.read_entry(&self.entry_path(key)?).map(|e| e.payload)
    }

    /// List stored analyses, newest first. Corrupt entries are skipped so
    /// one bad row cannot break the whole listing.
    pub fn list_entries(&self) -> Vec<HistoryEntry> {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut entries: Vec<HistoryEntry> = dir
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|e| {
                let entry = self.read_entry(&e.path())?;
                Some(HistoryEntry {
                    key: entry.key,
                    title: entry.payload.meta.title,
                    source: entry.payload.meta.source,
                    model: entry.model,
                    timestamp: entry.timestamp,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// Delete the given keys; returns how many entries were removed.
    pub fn delete(&self, keys: &[String]) -> usize {
        keys.iter()
            .filter_map(|key| self.entry_path(key))
            .filter(|path| fs::remove_file(path).is_ok())
            .count()
    }

    /// Keys are hex digests; anything else is rejected before touching the
    /// filesystem so a key can never traverse out of the cache directory.
    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(self.dir.join(format!("{key}.json")))
    }

    fn read_entry(&self, path: &Path) -> Option<CacheEntry> {
        let bytes = fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping corrupt cache entry");
                None
            }
        }
    }
}
