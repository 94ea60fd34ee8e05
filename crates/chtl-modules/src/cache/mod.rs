//! In-memory caches
//!
//! Two caches sit in front of the filesystem:
//! - [`RecordCache`]: scanned module records, keyed by path and file type
//! - [`RootsCache`]: the last built search path list (and project folders)
//!
//! Both expire entries after a TTL. Records are also dropped when the file's
//! modification time no longer matches the one seen at insert time.

use crate::record::{FileType, ModuleRecord};
use crate::search_path::{ModuleRoot, SearchContext};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Cached record entry
#[derive(Debug, Clone)]
struct CachedRecord {
    record: ModuleRecord,
    /// Modification time when cached
    mtime: Option<SystemTime>,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct RecordSlots {
    records: FxHashMap<(PathBuf, FileType), CachedRecord>,
    hits: usize,
    misses: usize,
}

/// Memoized module records
#[derive(Debug)]
pub struct RecordCache {
    ttl: Duration,
    slots: Mutex<RecordSlots>,
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl RecordCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(RecordSlots::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check if a cached entry is still valid
    fn is_valid(&self, path: &Path, cached: &CachedRecord) -> bool {
        if cached.inserted_at.elapsed() >= self.ttl {
            return false;
        }
        match cached.mtime {
            Some(cached_mtime) => mtime_of(path) == Some(cached_mtime),
            None => path.exists(),
        }
    }

    /// Get a record from the cache
    ///
    /// Returns `None` if not cached, expired, or the file has been modified.
    pub fn get(&self, path: &Path, file_type: FileType) -> Option<ModuleRecord> {
        let key = (path.to_path_buf(), file_type);
        let mut slots = self.slots.lock();

        let valid = slots
            .records
            .get(&key)
            .map(|cached| self.is_valid(path, cached))
            .unwrap_or(false);

        if valid {
            slots.hits += 1;
            return slots.records.get(&key).map(|c| c.record.clone());
        }

        slots.records.remove(&key);
        slots.misses += 1;
        None
    }

    /// Insert a record, remembering the file's current mtime
    pub fn insert(&self, record: ModuleRecord) {
        let mtime = mtime_of(&record.path);
        let key = (record.path.clone(), record.file_type);
        self.slots.lock().records.insert(
            key,
            CachedRecord {
                record,
                mtime,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Cached record, or the result of `scan` (cached on success)
    ///
    /// `scan` runs without holding the lock.
    pub fn get_or_scan<E>(
        &self,
        path: &Path,
        file_type: FileType,
        scan: impl FnOnce() -> Result<ModuleRecord, E>,
    ) -> Result<ModuleRecord, E> {
        if let Some(record) = self.get(path, file_type) {
            return Ok(record);
        }
        let record = scan()?;
        self.insert(record.clone());
        Ok(record)
    }

    /// Drop every record for `path`
    pub fn invalidate(&self, path: &Path) {
        self.slots.lock().records.retain(|(p, _), _| p != path);
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        slots.records.clear();
        slots.hits = 0;
        slots.misses = 0;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.lock();
        CacheStats {
            entries: slots.records.len(),
            hits: slots.hits,
            misses: slots.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
}

impl CacheStats {
    /// Get cache hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CachedRoots<T> {
    context: SearchContext,
    roots: Arc<Vec<T>>,
    built_at: Instant,
}

/// Memoized directory list derived from a [`SearchContext`]
///
/// Holds the search roots by default; the resolver keeps a second one for
/// the project module folders. The list is replaced wholesale, never edited
/// in place.
#[derive(Debug)]
pub struct RootsCache<T = ModuleRoot> {
    ttl: Duration,
    slot: RwLock<Option<CachedRoots<T>>>,
}

impl<T> RootsCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// List built for `context`, if still fresh
    pub fn get(&self, context: &SearchContext) -> Option<Arc<Vec<T>>> {
        let slot = self.slot.read();
        slot.as_ref()
            .filter(|c| &c.context == context && c.built_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.roots))
    }

    /// Cached list for `context`, building it with `build` on a miss
    pub fn get_or_build(
        &self,
        context: &SearchContext,
        build: impl FnOnce(&SearchContext) -> Vec<T>,
    ) -> Arc<Vec<T>> {
        if let Some(roots) = self.get(context) {
            return roots;
        }
        let roots = Arc::new(build(context));
        *self.slot.write() = Some(CachedRoots {
            context: context.clone(),
            roots: Arc::clone(&roots),
            built_at: Instant::now(),
        });
        roots
    }

    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_path::RootOrigin;
    use std::fs;
    use tempfile::TempDir;

    fn scanned(path: &Path) -> ModuleRecord {
        ModuleRecord::new("Box", FileType::Cmod, path).with_fs_metadata()
    }

    #[test]
    fn test_hit_and_miss() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Box.cmod");
        fs::write(&path, "").unwrap();

        let cache = RecordCache::new(Duration::from_secs(300));
        assert!(cache.get(&path, FileType::Cmod).is_none());

        cache.insert(scanned(&path));
        assert!(cache.get(&path, FileType::Cmod).is_some());
        assert!(cache.get(&path, FileType::Chtl).is_none());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_ratio() - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mtime_change_invalidates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Box.cmod");
        fs::write(&path, "").unwrap();

        let cache = RecordCache::new(Duration::from_secs(300));
        cache.insert(scanned(&path));

        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        assert!(cache.get(&path, FileType::Cmod).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_ttl_expiry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Box.cmod");
        fs::write(&path, "").unwrap();

        let cache = RecordCache::new(Duration::ZERO);
        cache.insert(scanned(&path));
        assert!(cache.get(&path, FileType::Cmod).is_none());
    }

    #[test]
    fn test_get_or_scan_runs_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Box.cmod");
        fs::write(&path, "").unwrap();

        let cache = RecordCache::new(Duration::from_secs(300));
        let mut calls = 0;
        for _ in 0..3 {
            let record = cache
                .get_or_scan(&path, FileType::Cmod, || {
                    calls += 1;
                    Ok::<_, std::io::Error>(scanned(&path))
                })
                .unwrap();
            assert_eq!(record.name, "Box");
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Box.cmod");
        fs::write(&path, "").unwrap();

        let cache = RecordCache::new(Duration::from_secs(300));
        cache.insert(scanned(&path));
        cache.invalidate(&path);
        assert_eq!(cache.stats().entries, 0);

        cache.insert(scanned(&path));
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_roots_cache_keyed_by_context() {
        let cache = RootsCache::new(Duration::from_secs(300));
        let ctx = SearchContext::new("/ws");
        let mut builds = 0;
        let mut build = |_: &SearchContext| {
            builds += 1;
            vec![ModuleRoot {
                path: PathBuf::from("/ws/module"),
                origin: RootOrigin::Workspace,
                rank: 0,
            }]
        };

        let first = cache.get_or_build(&ctx, &mut build);
        let second = cache.get_or_build(&ctx, &mut build);
        assert!(Arc::ptr_eq(&first, &second));

        let mut other = ctx.clone();
        other.active_file_dir = Some(PathBuf::from("/ws/pages"));
        assert!(cache.get(&other).is_none());

        cache.clear();
        assert!(cache.get(&ctx).is_none());
        drop(build);
        assert_eq!(builds, 1);
    }
}
