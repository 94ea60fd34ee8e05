//! Index storage
//!
//! The store owns two indices:
//! - the bundled index, shipped with the engine and loaded once in two
//!   phases (compact document first, full document on a background thread)
//! - the project index, built from the workspace's module folders on first
//!   use and rebuilt whenever it goes stale
//!
//! Both live in `RwLock<Arc<_>>`-style slots. Readers clone the `Arc` and
//! drop the lock before doing any work; writers build a complete
//! replacement and publish it under a short write lock. A generation
//! counter makes sure an older rebuild never overwrites a newer one.
//!
//! Walking the project tree for modification times is the expensive part of
//! a freshness check, so a published project index is trusted for the
//! verify interval. Watcher events and `status()` mark it dirty sooner.

use crate::error::IndexError;
use crate::index::{
    self, CompactIndex, Index, IndexBuilder, IndexStatistics, COMPACT_INDEX_FILE_NAME,
    INDEX_FILE_NAME,
};
use crate::record::{ExportKind, FileType, ModuleKind, ModuleRecord};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Which index a hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrigin {
    Bundled,
    Project,
}

/// A module exporting a looked-up symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportHit {
    pub module_name: String,
    pub module_type: FileType,
    pub module_kind: ModuleKind,
    pub export_type: ExportKind,
    pub origin: IndexOrigin,
}

/// The bundled index in whichever form is loaded
#[derive(Debug, Clone)]
pub enum BundledIndex {
    Compact(Arc<CompactIndex>),
    Full(Arc<Index>),
}

impl BundledIndex {
    pub fn is_full(&self) -> bool {
        matches!(self, BundledIndex::Full(_))
    }

    fn find_module(&self, name: &str) -> Option<ModuleRecord> {
        match self {
            BundledIndex::Compact(c) => c.find_module(name).cloned(),
            BundledIndex::Full(f) => f.find_by_name(name).cloned(),
        }
    }

    fn record_for_path(&self, path: &Path) -> Option<ModuleRecord> {
        match self {
            BundledIndex::Compact(c) => c.record_for_path(path).cloned(),
            BundledIndex::Full(f) => f.record_for_path(path).cloned(),
        }
    }

    fn export_hits(&self, symbol: &str) -> Vec<ExportHit> {
        match self {
            BundledIndex::Compact(c) => c
                .find_by_export(symbol)
                .iter()
                .map(|r| ExportHit {
                    module_name: r.module_name.clone(),
                    module_type: r.module_type,
                    module_kind: c
                        .find_module(&r.module_name)
                        .map(|m| m.kind)
                        .unwrap_or_else(|| r.module_type.module_kind()),
                    export_type: r.export_type,
                    origin: IndexOrigin::Bundled,
                })
                .collect(),
            BundledIndex::Full(f) => export_hits(f, symbol, IndexOrigin::Bundled),
        }
    }

    fn export_names(&self, kind: ExportKind) -> Vec<String> {
        match self {
            BundledIndex::Compact(c) => c.export_names(kind).into_iter().map(str::to_string).collect(),
            BundledIndex::Full(f) => f.export_names(kind).into_iter().map(str::to_string).collect(),
        }
    }

    fn records(&self) -> Vec<ModuleRecord> {
        match self {
            BundledIndex::Compact(c) => c.by_name.values().cloned().collect(),
            BundledIndex::Full(f) => f.entries.clone(),
        }
    }

    fn module_names(&self) -> Vec<String> {
        match self {
            BundledIndex::Compact(c) => c.module_names().map(str::to_string).collect(),
            BundledIndex::Full(f) => f.module_names().into_iter().map(str::to_string).collect(),
        }
    }

    fn statistics(&self) -> IndexStatistics {
        match self {
            BundledIndex::Compact(c) => c.statistics.clone(),
            BundledIndex::Full(f) => IndexStatistics::from_entries(&f.entries),
        }
    }

    fn len(&self) -> usize {
        match self {
            BundledIndex::Compact(c) => c.by_name.len(),
            BundledIndex::Full(f) => f.len(),
        }
    }
}

fn export_hits(index: &Index, symbol: &str, origin: IndexOrigin) -> Vec<ExportHit> {
    index
        .find_by_export(symbol)
        .into_iter()
        .flat_map(|record| {
            record
                .exports
                .iter()
                .filter(|e| e.name == symbol)
                .map(move |e| ExportHit {
                    module_name: record.name.clone(),
                    module_type: record.file_type,
                    module_kind: record.kind,
                    export_type: e.kind,
                    origin,
                })
        })
        .collect()
}

#[derive(Debug, Default)]
struct BundledSlot {
    current: RwLock<Option<BundledIndex>>,
    generation: AtomicU64,
}

/// Handle to a staged bundled load
///
/// The compact document is already published when this is returned;
/// [`BundledLoad::wait`] blocks until the full document has been swapped in.
#[derive(Debug)]
pub struct BundledLoad {
    full_load: Option<JoinHandle<Result<(), IndexError>>>,
}

impl BundledLoad {
    /// Whether a background load of the full document was started
    pub fn is_staged(&self) -> bool {
        self.full_load.is_some()
    }

    /// Wait for the full document
    pub fn wait(self) -> Result<(), IndexError> {
        match self.full_load {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(IndexError::Io(std::io::Error::other(
                    "bundled index loader panicked",
                )))
            }),
            None => Ok(()),
        }
    }
}

/// Point-in-time view of both indices
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub bundled: Option<BundledIndex>,
    pub project: Option<Arc<Index>>,
}

impl IndexSnapshot {
    /// Indexed record for an exact path, bundled index first
    pub fn record_for_path(&self, path: &Path) -> Option<ModuleRecord> {
        self.bundled
            .as_ref()
            .and_then(|b| b.record_for_path(path))
            .or_else(|| {
                self.project
                    .as_ref()
                    .and_then(|p| p.record_for_path(path).cloned())
            })
    }
}

#[derive(Debug, Default)]
struct ProjectSlot {
    index: Option<Arc<Index>>,
    generation: u64,
}

/// State of the bundled index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BundledState {
    NotLoaded,
    Compact,
    Full,
}

/// Snapshot of both indices, for `index status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub bundled: BundledState,
    pub bundled_modules: usize,
    pub project_index_path: PathBuf,
    pub project_modules: Option<usize>,
    pub project_build_date: Option<DateTime<Utc>>,
    pub project_roots: Vec<PathBuf>,
    pub project_stale: bool,
}

/// Default time a verified project index is trusted without a tree walk
pub const DEFAULT_VERIFY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Bundled and project indices
#[derive(Debug)]
pub struct IndexStore {
    bundled: Arc<BundledSlot>,
    project: RwLock<ProjectSlot>,
    project_roots: RwLock<Vec<PathBuf>>,
    project_dir: PathBuf,
    project_generation: AtomicU64,
    project_dirty: AtomicBool,
    warned_stale: AtomicBool,
    verify_interval: Duration,
    verified_at: Mutex<Option<Instant>>,
    tree_scans: AtomicU64,
}

impl IndexStore {
    /// Create a store persisting the project index under `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundled: Arc::new(BundledSlot::default()),
            project: RwLock::new(ProjectSlot::default()),
            project_roots: RwLock::new(Vec::new()),
            project_dir: project_dir.into(),
            project_generation: AtomicU64::new(0),
            project_dirty: AtomicBool::new(false),
            warned_stale: AtomicBool::new(false),
            verify_interval: DEFAULT_VERIFY_INTERVAL,
            verified_at: Mutex::new(None),
            tree_scans: AtomicU64::new(0),
        }
    }

    /// How long a verified project index is answered from without
    /// re-walking its folders
    pub fn with_verify_interval(mut self, interval: Duration) -> Self {
        self.verify_interval = interval;
        self
    }

    /// Number of full modification-time walks over the project folders
    pub fn tree_scans(&self) -> u64 {
        self.tree_scans.load(Ordering::Relaxed)
    }

    fn recently_verified(&self) -> bool {
        self.verified_at
            .lock()
            .is_some_and(|at| at.elapsed() < self.verify_interval)
    }

    fn mark_verified(&self) {
        *self.verified_at.lock() = Some(Instant::now());
    }

    /// Walk the folders of `index`; true when something changed after the build
    fn check_tree(&self, index: &Index) -> bool {
        self.tree_scans.fetch_add(1, Ordering::Relaxed);
        let stale = index.is_stale();
        if stale {
            *self.verified_at.lock() = None;
        } else {
            self.mark_verified();
        }
        stale
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn project_index_path(&self) -> PathBuf {
        self.project_dir.join(INDEX_FILE_NAME)
    }

    /// Load the bundled index from `dir`
    ///
    /// With a compact document present it is published immediately and the
    /// full document follows on a background thread. Otherwise the full
    /// document is loaded before returning.
    pub fn load_bundled(&self, dir: &Path) -> Result<BundledLoad, IndexError> {
        let generation = self.bundled.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let compact_path = dir.join(COMPACT_INDEX_FILE_NAME);
        let full_path = dir.join(INDEX_FILE_NAME);

        if !compact_path.is_file() {
            let full = Index::load(&full_path)?;
            info!("Loaded bundled module index: {} modules", full.len());
            publish_bundled(&self.bundled, generation, BundledIndex::Full(Arc::new(full)));
            return Ok(BundledLoad { full_load: None });
        }

        let compact = CompactIndex::load(&compact_path)?;
        debug!(
            "Loaded compact bundled module index: {} modules",
            compact.by_name.len()
        );
        publish_bundled(
            &self.bundled,
            generation,
            BundledIndex::Compact(Arc::new(compact)),
        );

        let slot = Arc::clone(&self.bundled);
        let handle = std::thread::Builder::new()
            .name("chtl-bundled-index".to_string())
            .spawn(move || match Index::load(&full_path) {
                Ok(full) => {
                    info!("Loaded full bundled module index: {} modules", full.len());
                    publish_bundled(&slot, generation, BundledIndex::Full(Arc::new(full)));
                    Ok(())
                }
                Err(IndexError::NotFound(path)) => {
                    debug!("No full bundled index at {}", path.display());
                    Ok(())
                }
                Err(e) => {
                    warn!("Failed to load full bundled index: {}", e);
                    Err(e)
                }
            })?;

        Ok(BundledLoad {
            full_load: Some(handle),
        })
    }

    /// Current bundled index, if loaded
    pub fn bundled(&self) -> Option<BundledIndex> {
        self.bundled.current.read().clone()
    }

    /// Set the module folders the project index covers
    ///
    /// An index built over a different set of folders counts as stale.
    pub fn set_project_roots(&self, roots: &[PathBuf]) {
        if self.project_roots.read().as_slice() != roots {
            *self.project_roots.write() = roots.to_vec();
        }
    }

    pub fn project_roots(&self) -> Vec<PathBuf> {
        self.project_roots.read().clone()
    }

    /// Force a rebuild on the next project query
    pub fn mark_project_dirty(&self) {
        self.project_dirty.store(true, Ordering::SeqCst);
    }

    /// Project index as currently published, without a freshness check
    pub fn project_index(&self) -> Option<Arc<Index>> {
        self.project.read().index.clone()
    }

    /// Project index, rebuilt first if missing or stale
    ///
    /// Returns `None` when there are no project roots or the rebuild fails.
    pub fn ensure_project_fresh(&self) -> Option<Arc<Index>> {
        let roots = self.project_roots();
        if roots.is_empty() {
            return None;
        }

        let dirty = self.project_dirty.swap(false, Ordering::SeqCst);
        if let Some(current) = self.project_index() {
            if !dirty
                && current.roots == roots
                && (self.recently_verified() || !self.check_tree(&current))
            {
                return Some(current);
            }
        } else if !dirty {
            if let Some(loaded) = self.load_persisted_project(&roots) {
                return Some(self.publish_project(self.next_generation(), loaded));
            }
        }

        if !self.warned_stale.swap(true, Ordering::SeqCst) {
            warn!(
                "Project module index at {} is missing or stale, rebuilding",
                self.project_index_path().display()
            );
        }
        match self.rebuild_project_with(&roots) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Failed to rebuild project module index: {}", e);
                None
            }
        }
    }

    /// Rebuild the project index now and persist it
    pub fn rebuild_project(&self) -> Result<Arc<Index>, IndexError> {
        let roots = self.project_roots();
        self.project_dirty.store(false, Ordering::SeqCst);
        self.rebuild_project_with(&roots)
    }

    fn next_generation(&self) -> u64 {
        self.project_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn rebuild_project_with(&self, roots: &[PathBuf]) -> Result<Arc<Index>, IndexError> {
        let generation = self.next_generation();
        let index = IndexBuilder::new().build_many(roots)?;
        self.mark_verified();
        if let Err(e) = index.save(&self.project_dir) {
            warn!(
                "Failed to save project module index to {}: {}",
                self.project_dir.display(),
                e
            );
        }
        Ok(self.publish_project(generation, index))
    }

    fn load_persisted_project(&self, roots: &[PathBuf]) -> Option<Index> {
        let path = self.project_index_path();
        let loaded = Index::load(&path).ok()?;
        let fresh = loaded.roots == roots
            && roots.iter().all(|r| !index::needs_update(&path, r))
            && !self.check_tree(&loaded);
        if fresh {
            debug!("Loaded project module index from {}", path.display());
            Some(loaded)
        } else {
            None
        }
    }

    /// Publish `index` unless a newer generation is already published
    fn publish_project(&self, generation: u64, index: Index) -> Arc<Index> {
        let index = Arc::new(index);
        let mut slot = self.project.write();
        if generation >= slot.generation {
            slot.index = Some(Arc::clone(&index));
            slot.generation = generation;
            index
        } else {
            debug!("Discarding project index generation {}", generation);
            slot.index.clone().unwrap_or(index)
        }
    }

    /// Look up a module by name, bundled index first
    pub fn find_module(&self, name: &str) -> Option<ModuleRecord> {
        if let Some(found) = self.bundled().and_then(|b| b.find_module(name)) {
            return Some(found);
        }
        self.ensure_project_fresh()
            .and_then(|p| p.find_by_name(name).cloned())
    }

    /// Whether either index has a module named `name`
    pub fn module_exists(&self, name: &str) -> bool {
        self.find_module(name).is_some()
    }

    /// Path of the module named `name`, bundled index first
    pub fn module_path(&self, name: &str) -> Option<PathBuf> {
        self.find_module(name).map(|record| record.path)
    }

    /// Exported symbol names of one kind from both indices, bundled first,
    /// without duplicates
    pub fn export_names(&self, kind: ExportKind) -> Vec<String> {
        let mut names = self
            .bundled()
            .map(|b| b.export_names(kind))
            .unwrap_or_default();
        if let Some(project) = self.ensure_project_fresh() {
            let mut seen: rustc_hash::FxHashSet<String> = names.iter().cloned().collect();
            for name in project.export_names(kind) {
                if seen.insert(name.to_string()) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Both indices as of now, the project index refreshed first
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            bundled: self.bundled(),
            project: self.ensure_project_fresh(),
        }
    }

    /// Indexed record for an exact path
    pub fn record_for_path(&self, path: &Path) -> Option<ModuleRecord> {
        self.snapshot().record_for_path(path)
    }

    /// Every module exporting `symbol`, bundled hits first
    pub fn find_by_export(&self, symbol: &str) -> Vec<ExportHit> {
        let mut hits = self
            .bundled()
            .map(|b| b.export_hits(symbol))
            .unwrap_or_default();
        if let Some(project) = self.ensure_project_fresh() {
            hits.extend(export_hits(&project, symbol, IndexOrigin::Project));
        }
        hits
    }

    pub fn modules_by_type(&self, file_type: FileType) -> Vec<ModuleRecord> {
        let mut records: Vec<ModuleRecord> = self
            .bundled()
            .map(|b| b.records())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.file_type == file_type)
            .collect();
        if let Some(project) = self.ensure_project_fresh() {
            records.extend(project.by_type(file_type).into_iter().cloned());
        }
        records
    }

    pub fn modules_by_origin(&self, origin: IndexOrigin) -> Vec<ModuleRecord> {
        match origin {
            IndexOrigin::Bundled => self.bundled().map(|b| b.records()).unwrap_or_default(),
            IndexOrigin::Project => self
                .ensure_project_fresh()
                .map(|p| p.entries.clone())
                .unwrap_or_default(),
        }
    }

    /// Module names from both indices, bundled first, without duplicates
    pub fn module_names(&self) -> Vec<String> {
        let mut names = self
            .bundled()
            .map(|b| b.module_names())
            .unwrap_or_default();
        if let Some(project) = self.ensure_project_fresh() {
            for name in project.module_names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    pub fn statistics(&self, origin: IndexOrigin) -> IndexStatistics {
        match origin {
            IndexOrigin::Bundled => self.bundled().map(|b| b.statistics()).unwrap_or_default(),
            IndexOrigin::Project => self
                .ensure_project_fresh()
                .map(|p| IndexStatistics::from_entries(&p.entries))
                .unwrap_or_default(),
        }
    }

    /// Snapshot of both indices without triggering a rebuild
    ///
    /// Always walks the project folders; a stale index found this way is
    /// rebuilt by the next query.
    pub fn status(&self) -> IndexStatus {
        let bundled = self.bundled();
        let project = self.project_index();
        let roots = self.project_roots();
        let project_stale = match &project {
            Some(p) => {
                let stale = self.project_dirty.load(Ordering::SeqCst)
                    || p.roots != roots
                    || self.check_tree(p);
                if stale {
                    self.mark_project_dirty();
                }
                stale
            }
            None => !roots.is_empty(),
        };
        IndexStatus {
            bundled: match &bundled {
                None => BundledState::NotLoaded,
                Some(BundledIndex::Compact(_)) => BundledState::Compact,
                Some(BundledIndex::Full(_)) => BundledState::Full,
            },
            bundled_modules: bundled.as_ref().map(|b| b.len()).unwrap_or(0),
            project_index_path: self.project_index_path(),
            project_modules: project.as_ref().map(|p| p.len()),
            project_build_date: project.as_ref().map(|p| p.build_date),
            project_roots: roots,
            project_stale,
        }
    }

    /// Drop the project index so the next query reloads or rebuilds it
    pub fn reset_project(&self) {
        let generation = self.next_generation();
        let mut slot = self.project.write();
        slot.index = None;
        slot.generation = generation;
        *self.verified_at.lock() = None;
        self.warned_stale.store(false, Ordering::SeqCst);
    }
}

fn publish_bundled(slot: &BundledSlot, generation: u64, index: BundledIndex) {
    let mut current = slot.current.write();
    // A newer load_bundled call owns the slot now
    if slot.generation.load(Ordering::SeqCst) != generation {
        return;
    }
    // Never replace a full index with a compact one of the same load
    if index.is_full() || !current.as_ref().is_some_and(BundledIndex::is_full) {
        *current = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn bundled_dir(temp: &TempDir) -> PathBuf {
        let module = temp.path().join("install").join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(
            module.join("Chtholly.cmod"),
            "[Export] { @Style Rounded : .rounded { } }",
        )
        .unwrap();
        let index = IndexBuilder::new().official(true).build(&module).unwrap();
        let out = temp.path().join("bundle");
        index.save(&out).unwrap();
        out
    }

    #[test]
    fn test_staged_bundled_load() {
        let temp = TempDir::new().unwrap();
        let dir = bundled_dir(&temp);

        let store = IndexStore::new(temp.path().join(".chtl"));
        let load = store.load_bundled(&dir).unwrap();
        assert!(load.is_staged());
        // Usable straight away, compact or full
        assert!(store.find_module("Chtholly").is_some());

        load.wait().unwrap();
        assert_eq!(store.status().bundled, BundledState::Full);
        let hits = store.find_by_export("Rounded");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].origin, IndexOrigin::Bundled);
        assert_eq!(hits[0].export_type, ExportKind::Style);
    }

    #[test]
    fn test_bundled_without_compact_loads_synchronously() {
        let temp = TempDir::new().unwrap();
        let dir = bundled_dir(&temp);
        fs::remove_file(dir.join(COMPACT_INDEX_FILE_NAME)).unwrap();

        let store = IndexStore::new(temp.path().join(".chtl"));
        let load = store.load_bundled(&dir).unwrap();
        assert!(!load.is_staged());
        assert_eq!(store.status().bundled, BundledState::Full);
    }

    #[test]
    fn test_bundled_missing() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path().join(".chtl"));
        assert!(matches!(
            store.load_bundled(temp.path()),
            Err(IndexError::NotFound(_))
        ));
        assert_eq!(store.status().bundled, BundledState::NotLoaded);
    }

    #[test]
    fn test_project_index_built_lazily_and_persisted() {
        let temp = TempDir::new().unwrap();
        let module = temp.path().join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("Box.cmod"), "[Export] { Card : @Element }").unwrap();

        let store = IndexStore::new(temp.path().join(".chtl"));
        assert!(store.ensure_project_fresh().is_none());

        store.set_project_roots(&[module.clone()]);
        assert!(store.status().project_stale);
        let record = store.find_module("Box").unwrap();
        assert!(!record.official);
        assert!(store.project_index_path().is_file());
        assert_eq!(store.find_by_export("Card")[0].origin, IndexOrigin::Project);
        assert_eq!(store.module_names(), vec!["Box"]);
    }

    #[test]
    fn test_bundled_wins_over_project() {
        let temp = TempDir::new().unwrap();
        let dir = bundled_dir(&temp);
        let module = temp.path().join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("Chtholly.cmod"), "").unwrap();

        let store = IndexStore::new(temp.path().join(".chtl"));
        store.load_bundled(&dir).unwrap().wait().unwrap();
        store.set_project_roots(&[module]);

        assert!(store.find_module("Chtholly").unwrap().official);
        assert_eq!(store.module_names(), vec!["Chtholly"]);
        assert_eq!(store.modules_by_origin(IndexOrigin::Project).len(), 1);
    }

    #[test]
    fn test_warm_lookups_skip_tree_walk() {
        let temp = TempDir::new().unwrap();
        let module = temp.path().join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("Box.cmod"), "[Export] { Card : @Element }").unwrap();

        let store = IndexStore::new(temp.path().join(".chtl"));
        store.set_project_roots(&[module.clone()]);
        assert!(store.find_module("Box").is_some());
        for _ in 0..20 {
            assert!(store.find_module("Box").is_some());
            assert_eq!(store.find_by_export("Card").len(), 1);
        }
        assert_eq!(store.tree_scans(), 0);

        store.status();
        assert_eq!(store.tree_scans(), 1);
    }

    #[test]
    fn test_zero_interval_walks_every_time() {
        let temp = TempDir::new().unwrap();
        let module = temp.path().join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("Box.cmod"), "").unwrap();

        let store = IndexStore::new(temp.path().join(".chtl")).with_verify_interval(Duration::ZERO);
        store.set_project_roots(&[module]);
        store.find_module("Box");
        store.find_module("Box");
        store.find_module("Box");
        assert_eq!(store.tree_scans(), 2);
    }

    #[test]
    fn test_dirty_mark_forces_rebuild() {
        let temp = TempDir::new().unwrap();
        let module = temp.path().join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(module.join("Box.cmod"), "").unwrap();

        let store = IndexStore::new(temp.path().join(".chtl"));
        store.set_project_roots(&[module.clone()]);
        assert!(!store.module_exists("Card"));

        fs::write(module.join("Card.cmod"), "").unwrap();
        assert!(!store.module_exists("Card"));
        store.mark_project_dirty();
        assert!(store.module_exists("Card"));
        assert_eq!(store.module_path("Card"), Some(module.join("Card.cmod")));
    }

    #[test]
    fn test_export_names_from_both_indices() {
        let temp = TempDir::new().unwrap();
        let dir = bundled_dir(&temp);
        let module = temp.path().join("module");
        fs::create_dir_all(&module).unwrap();
        fs::write(
            module.join("Theme.cmod"),
            "[Export] { @Style Rounded : .r { }\n @Style Flat : .f { }\n @Element Card : div }",
        )
        .unwrap();

        let store = IndexStore::new(temp.path().join(".chtl"));
        store.load_bundled(&dir).unwrap();
        store.set_project_roots(&[module]);

        assert_eq!(store.export_names(ExportKind::Style), vec!["Rounded", "Flat"]);
        assert_eq!(store.export_names(ExportKind::Element), vec!["Card"]);
        assert!(store.export_names(ExportKind::Function).is_empty());
    }

    #[test]
    fn test_older_generation_not_published() {
        let temp = TempDir::new().unwrap();
        let store = IndexStore::new(temp.path().join(".chtl"));

        let older = store.next_generation();
        let newer = store.next_generation();
        store.publish_project(newer, Index::empty());
        let mut stale = Index::empty();
        stale.version = "old".to_string();
        let published = store.publish_project(older, stale);
        assert_eq!(published.version, crate::index::INDEX_FORMAT_VERSION);
        assert_eq!(
            store.project_index().unwrap().version,
            crate::index::INDEX_FORMAT_VERSION
        );
    }
}
