//! Opt-in hash reuse for incremental runs.
//!
//! Hashing is the only step of collection that reads whole files. With
//! `trust_mtime = true` a rerun looks up the previous manifest's hash here
//! instead of rereading files that look unchanged.
//!
//! ## Cache keys
//!
//! An entry is keyed by `source_path` and is only a hit when both
//! `size_bytes` and `mtime` match the file as it is now. Tools that preserve
//! timestamps (`cp -p`, `rsync -t`, `exiftool -P`) can change content while
//! keeping both, which is why the cache is off by default: without
//! `trust_mtime` every file is hashed and the manifest hash is always the
//! content hash.
//!
//! ## Bypassing the cache
//!
//! Runs without `trust_mtime`, and forced runs (`--force` or
//! `force_reprocess = true`), use [`HashCache::empty`].

use crate::manifest::Manifest;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
struct CacheEntry {
    size_bytes: u64,
    mtime: f64,
    hash: String,
}

/// Hashes known from a previous manifest, keyed by source path.
#[derive(Debug, Clone, Default)]
pub struct HashCache {
    entries: HashMap<String, CacheEntry>,
}

impl HashCache {
    /// No entries: every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: &Manifest) -> Self {
        let entries = manifest
            .pics
            .iter()
            .map(|pic| {
                (
                    pic.source_path.clone(),
                    CacheEntry {
                        size_bytes: pic.size_bytes,
                        mtime: pic.mtime,
                        hash: pic.hash.clone(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Cached hash for `source_path`, if size and mtime still match.
    pub fn lookup(&self, source_path: &str, size_bytes: u64, mtime: f64) -> Option<&str> {
        let entry = self.entries.get(source_path)?;
        (entry.size_bytes == size_bytes && entry.mtime == mtime).then_some(entry.hash.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How many hashes a run reused versus computed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub reused: usize,
    pub hashed: usize,
}

impl CacheStats {
    pub fn reuse(&mut self) {
        self.reused += 1;
    }

    pub fn hash(&mut self) {
        self.hashed += 1;
    }

    pub fn total(&self) -> usize {
        self.reused + self.hashed
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reused > 0 {
            write!(
                f,
                "{} reused, {} hashed ({} total)",
                self.reused,
                self.hashed,
                self.total()
            )
        } else {
            write!(f, "{} hashed", self.hashed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;
    use crate::test_helpers::*;

    fn cache_with(source: &str, size: u64, mtime: f64, hash: &str) -> HashCache {
        let mut manifest = ManifestBuilder::new(&run_config("")).build(vec![], vec![], 0);
        let mut record = record("a.jpg");
        record.source_path = source.into();
        record.size_bytes = size;
        record.mtime = mtime;
        record.hash = hash.into();
        manifest.pics.push(record);
        HashCache::from_manifest(&manifest)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let cache = HashCache::empty();
        assert!(cache.is_empty());
        assert_eq!(cache.lookup("/src/a.jpg", 1, 1.0), None);
    }

    #[test]
    fn lookup_hit_when_size_and_mtime_match() {
        let cache = cache_with("/src/a.jpg", 100, 1710513022.5, "sha256--abc");
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.lookup("/src/a.jpg", 100, 1710513022.5),
            Some("sha256--abc")
        );
    }

    #[test]
    fn lookup_miss_when_size_changed() {
        let cache = cache_with("/src/a.jpg", 100, 5.0, "sha256--abc");
        assert_eq!(cache.lookup("/src/a.jpg", 101, 5.0), None);
    }

    #[test]
    fn lookup_miss_when_mtime_changed() {
        let cache = cache_with("/src/a.jpg", 100, 5.0, "sha256--abc");
        assert_eq!(cache.lookup("/src/a.jpg", 100, 5.25), None);
    }

    #[test]
    fn lookup_miss_for_other_path() {
        let cache = cache_with("/src/a.jpg", 100, 5.0, "sha256--abc");
        assert_eq!(cache.lookup("/src/b.jpg", 100, 5.0), None);
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn stats_display_with_reuse() {
        let stats = CacheStats {
            reused: 5,
            hashed: 2,
        };
        assert_eq!(stats.to_string(), "5 reused, 2 hashed (7 total)");
    }

    #[test]
    fn stats_display_without_reuse() {
        let mut stats = CacheStats::default();
        stats.hash();
        stats.hash();
        assert_eq!(stats.to_string(), "2 hashed");
    }
}
