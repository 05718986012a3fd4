//! File-based response cache with TTL support.
//!
//! Entries are JSON files under `<base_dir>/<category>/<key>.json`. The cache
//! is owned by the provider; nothing downstream of it knows it exists.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Cache entry with timestamp
#[derive(Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// What kind of payload an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCategory {
    Schedule,
    Results,
}

impl CacheCategory {
    /// Get directory name for this category
    pub fn dir_name(&self) -> &str {
        match self {
            CacheCategory::Schedule => "schedule",
            CacheCategory::Results => "results",
        }
    }
}

/// File-based cache
#[derive(Debug, Clone)]
pub struct ResponseCache {
    base_dir: PathBuf,
}

impl ResponseCache {
    /// Create a new cache with the given base directory
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn category_dir(&self, category: CacheCategory) -> PathBuf {
        self.base_dir.join(category.dir_name())
    }

    fn cache_path(&self, category: CacheCategory, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.category_dir(category).join(format!("{}.json", safe_key))
    }

    /// Get cached data if it is younger than `max_age`.
    pub fn get<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        key: &str,
        max_age: Duration,
    ) -> Option<T> {
        let path = self.cache_path(category, key);

        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding unreadable cache entry {}: {}", path.display(), e);
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        let elapsed = Utc::now() - entry.cached_at;
        if elapsed > max_age {
            debug!("Cache entry {} expired", path.display());
            let _ = std::fs::remove_file(&path);
            return None;
        }

        debug!("Cache hit: {}/{}", category.dir_name(), key);
        Some(entry.data)
    }

    /// Set cache data
    pub fn set<T: Serialize>(&self, category: CacheCategory, key: &str, data: &T) -> Result<()> {
        let dir = self.category_dir(category);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let entry = CacheEntry {
            data,
            cached_at: Utc::now(),
        };

        let path = self.cache_path(category, key);
        let content = serde_json::to_string_pretty(&entry)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write cache entry {}", path.display()))?;

        Ok(())
    }

    /// Clear all cache
    pub fn clear_all(&self) -> Result<()> {
        if self.base_dir.exists() {
            std::fs::remove_dir_all(&self.base_dir)?;
        }
        Ok(())
    }
}
