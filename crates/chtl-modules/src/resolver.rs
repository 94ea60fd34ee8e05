//! Import resolution
//!
//! [`ImportResolver`] is the per-workspace entry point. It owns the
//! configuration, the search path and record caches, and the index store,
//! and turns an [`ImportRequest`] into a [`ResolutionResult`].
//!
//! Resolution rules by import kind:
//! - media (`@Html`, `@Style`, `@JavaScript`): only with an `as` clause, and
//!   only in the importing file's directory
//! - modules (`@Chtl`, `@CJmod`): wildcard, absolute path, explicit file
//!   name or bare name, looked up across the search roots in priority order
//! - origin embedding: a named `[Origin]` block in a `.chtl` file

use crate::cache::{CacheStats, RecordCache, RootsCache};
use crate::config::ResolverConfig;
use crate::error::{ConfigError, IndexError, ResolveError};
use crate::index::{Index, COMPACT_INDEX_FILE_NAME, INDEX_FILE_NAME};
use crate::layout;
use crate::origin;
use crate::record::{module_name_of, ExportKind, FileType, ModuleRecord};
use crate::request::{ImportKind, ImportRequest, ResolutionResult};
use crate::scan;
use crate::search_path::{self, ModuleRoot, SearchContext};
use crate::store::{BundledLoad, ExportHit, IndexSnapshot, IndexStatus, IndexStore};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Shape of a module import path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathForm {
    Wildcard,
    Absolute,
    ExplicitFile,
    BareName,
}

impl PathForm {
    fn classify(raw: &str) -> Self {
        if raw.contains('*') {
            PathForm::Wildcard
        } else if is_absolute(raw) {
            PathForm::Absolute
        } else if raw.contains('.') && !raw.ends_with('/') {
            PathForm::ExplicitFile
        } else {
            PathForm::BareName
        }
    }
}

/// Absolute for import purposes: rooted, or carrying a drive/scheme colon
fn is_absolute(raw: &str) -> bool {
    raw.starts_with('/') || raw.contains(':') || Path::new(raw).is_absolute()
}

fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Resolves imports for one workspace
#[derive(Debug)]
pub struct ImportResolver {
    config: RwLock<Arc<ResolverConfig>>,
    active_file_dir: RwLock<Option<PathBuf>>,
    roots: RootsCache,
    project_dirs: RootsCache<PathBuf>,
    records: RecordCache,
    store: RwLock<Arc<IndexStore>>,
}

impl ImportResolver {
    /// Create a resolver; the configuration is validated here
    pub fn new(config: ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ttl = config.cache_ttl();
        let store = IndexStore::new(config.project_index_dir()).with_verify_interval(ttl);
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            active_file_dir: RwLock::new(None),
            roots: RootsCache::new(ttl),
            project_dirs: RootsCache::new(ttl),
            records: RecordCache::new(ttl),
            store: RwLock::new(Arc::new(store)),
        })
    }

    pub fn config(&self) -> Arc<ResolverConfig> {
        self.config.read().clone()
    }

    pub fn store(&self) -> Arc<IndexStore> {
        self.store.read().clone()
    }

    pub fn record_cache_stats(&self) -> CacheStats {
        self.records.stats()
    }

    /// Replace the configuration; every cache is dropped
    pub fn update_config(&self, config: ResolverConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let index_dir_changed = config.project_index_dir() != self.config().project_index_dir();
        *self.config.write() = Arc::new(config);
        if index_dir_changed {
            let config = self.config();
            let store = IndexStore::new(config.project_index_dir())
                .with_verify_interval(config.cache_ttl());
            *self.store.write() = Arc::new(store);
        }
        self.refresh();
        Ok(())
    }

    /// Set the file being edited or compiled; `None` clears it
    pub fn set_active_file(&self, file: Option<&Path>) {
        *self.active_file_dir.write() = file.and_then(Path::parent).map(Path::to_path_buf);
    }

    /// Drop all cached records, roots and the in-memory project index
    pub fn refresh(&self) {
        self.records.clear();
        self.roots.clear();
        self.project_dirs.clear();
        let store = self.store();
        store.reset_project();
        store.mark_project_dirty();
    }

    /// Forget everything cached about `path`
    pub fn invalidate_path(&self, path: &Path) {
        self.records.invalidate(path);
        self.roots.clear();
        self.project_dirs.clear();
        self.store().mark_project_dirty();
    }

    fn context(&self) -> SearchContext {
        SearchContext::from_config(&self.config(), self.active_file_dir.read().clone())
    }

    /// Search roots in priority order
    pub fn search_paths(&self) -> Arc<Vec<ModuleRoot>> {
        self.roots.get_or_build(&self.context(), search_path::build)
    }

    /// Human-readable report of the search roots
    pub fn render_debug_report(&self) -> String {
        search_path::render_debug_report(&self.config().workspace_root, &self.search_paths())
    }

    /// Load the bundled index from the bundled module directory
    ///
    /// Returns `Ok(None)` when that directory holds no index files.
    pub fn load_bundled_index(&self) -> Result<Option<BundledLoad>, IndexError> {
        let Some(dir) = self.context().bundled_dir() else {
            return Ok(None);
        };
        if !dir.join(INDEX_FILE_NAME).is_file() && !dir.join(COMPACT_INDEX_FILE_NAME).is_file() {
            return Ok(None);
        }
        self.store().load_bundled(&dir).map(Some)
    }

    /// Store with its project roots set for the current context
    fn store_with_project_roots(&self) -> Arc<IndexStore> {
        let store = self.store();
        let dirs = self
            .project_dirs
            .get_or_build(&self.context(), search_path::project_module_dirs);
        store.set_project_roots(&dirs);
        store
    }

    /// Store for index queries; `None` when indexing is disabled
    fn indexed_store(&self) -> Option<Arc<IndexStore>> {
        self.config()
            .use_index
            .then(|| self.store_with_project_roots())
    }

    fn index_snapshot(&self) -> IndexSnapshot {
        self.indexed_store()
            .map(|store| store.snapshot())
            .unwrap_or_default()
    }

    /// Status of the bundled and project indices
    pub fn index_status(&self) -> IndexStatus {
        self.store_with_project_roots().status()
    }

    /// Rebuild and persist the project index now
    pub fn rebuild_project_index(&self) -> Result<Arc<Index>, IndexError> {
        self.store_with_project_roots().rebuild_project()
    }

    /// Look up a module by name in the indices
    pub fn find_module(&self, name: &str) -> Option<ModuleRecord> {
        self.indexed_store()?.find_module(name)
    }

    /// Whether an indexed module named `name` exists
    pub fn module_exists(&self, name: &str) -> bool {
        self.find_module(name).is_some()
    }

    /// Path of the indexed module named `name`
    pub fn module_path(&self, name: &str) -> Option<PathBuf> {
        self.indexed_store()?.module_path(name)
    }

    /// Modules exporting `symbol`
    pub fn find_by_export(&self, symbol: &str) -> Vec<ExportHit> {
        self.indexed_store()
            .map(|store| store.find_by_export(symbol))
            .unwrap_or_default()
    }

    /// Names of every indexed module
    pub fn module_names(&self) -> Vec<String> {
        self.indexed_store()
            .map(|store| store.module_names())
            .unwrap_or_default()
    }

    /// Indexed export names of one kind, for completion lists
    pub fn export_names(&self, kind: ExportKind) -> Vec<String> {
        self.indexed_store()
            .map(|store| store.export_names(kind))
            .unwrap_or_default()
    }

    /// Resolve one import
    ///
    /// A missing module is `Ok` with `found == false`; only malformed or
    /// incomplete origin references are errors.
    pub fn resolve(&self, request: &ImportRequest) -> Result<ResolutionResult, ResolveError> {
        let result = match request.kind {
            ImportKind::MediaHtml | ImportKind::MediaStyle | ImportKind::MediaScript => {
                self.resolve_media(request)
            }
            ImportKind::ModuleImport | ImportKind::ExtensionModuleImport => {
                self.resolve_module(request)
            }
            ImportKind::OriginEmbedding => self.resolve_origin(request)?,
        };
        debug!(
            "Resolved {:?} '{}': found={} candidates={}",
            request.kind,
            request.raw_path,
            result.found,
            result.candidates.len()
        );
        Ok(result)
    }

    /// Record for a located file, from the indices or a cached live scan
    fn record_for(
        &self,
        path: &Path,
        file_type: FileType,
        official: bool,
        snapshot: &IndexSnapshot,
    ) -> ModuleRecord {
        // A hybrid directory is indexed once but resolves as either type
        if let Some(record) = snapshot
            .record_for_path(path)
            .filter(|r| r.file_type == file_type)
        {
            return record;
        }
        self.records
            .get_or_scan(path, file_type, || {
                if path.is_dir() {
                    scan::scan_directory_module(path, file_type, official)
                } else {
                    scan::scan_file(path, file_type, official)
                }
            })
            .unwrap_or_else(|e| {
                debug!("Could not scan {}: {}", path.display(), e);
                ModuleRecord::new(module_name_of(path), file_type, path)
                    .with_fs_metadata()
                    .with_official(official)
            })
    }

    fn resolve_media(&self, request: &ImportRequest) -> ResolutionResult {
        if !request.has_alias_clause {
            return ResolutionResult::not_found(Vec::new());
        }

        let allowed = request.kind.allowed_extensions();
        let raw = request.raw_path.as_str();
        let snapshot = IndexSnapshot::default();

        if is_absolute(raw) {
            let path = PathBuf::from(raw);
            if path.is_file() && has_allowed_extension(&path, allowed) {
                return self.single_hit(&path, &snapshot, false, Vec::new());
            }
            return ResolutionResult::not_found(Vec::new());
        }

        let base = request
            .current_file_dir
            .clone()
            .unwrap_or_else(|| self.config().workspace_root.clone());
        let tried = vec![base.clone()];

        let direct = base.join(raw);
        if direct.is_file() && has_allowed_extension(&direct, allowed) {
            return self.single_hit(&direct, &snapshot, false, tried);
        }

        if Path::new(raw).extension().is_none() {
            let with_ext = base.join(format!("{}.{}", raw, allowed[0]));
            if with_ext.is_file() {
                return self.single_hit(&with_ext, &snapshot, false, tried);
            }
        }

        ResolutionResult::not_found(tried)
    }

    fn single_hit(
        &self,
        path: &Path,
        snapshot: &IndexSnapshot,
        official: bool,
        tried: Vec<PathBuf>,
    ) -> ResolutionResult {
        let Some(file_type) = FileType::of_path(path) else {
            return ResolutionResult::not_found(tried);
        };
        let record = self.record_for(path, file_type, official, snapshot);
        ResolutionResult::from_candidates(vec![record], tried)
    }

    fn resolve_module(&self, request: &ImportRequest) -> ResolutionResult {
        let allowed = request.kind.allowed_extensions();
        let raw = request.raw_path.trim();
        let roots = self.search_paths();
        let snapshot = self.index_snapshot();

        match PathForm::classify(raw) {
            PathForm::Wildcard => self.resolve_wildcard(raw, allowed, &roots, &snapshot),
            PathForm::Absolute => {
                let path = PathBuf::from(raw);
                if path.is_file() && has_allowed_extension(&path, allowed) {
                    self.single_hit(&path, &snapshot, false, Vec::new())
                } else {
                    ResolutionResult::not_found(Vec::new())
                }
            }
            PathForm::ExplicitFile => {
                let mut tried = Vec::new();
                for root in roots.iter() {
                    tried.push(root.path.clone());
                    let path = root.path.join(raw);
                    if path.is_file() && has_allowed_extension(&path, allowed) {
                        return self.single_hit(&path, &snapshot, root.is_bundled(), tried);
                    }
                }
                ResolutionResult::not_found(tried)
            }
            PathForm::BareName => self.resolve_bare_name(request.kind, raw, allowed, &roots, &snapshot),
        }
    }

    fn resolve_wildcard(
        &self,
        pattern: &str,
        allowed: &[&str],
        roots: &[ModuleRoot],
        snapshot: &IndexSnapshot,
    ) -> ResolutionResult {
        let mut candidates = Vec::new();
        for root in roots {
            let full = format!(
                "{}/{}",
                glob::Pattern::escape(&root.path.to_string_lossy()),
                pattern
            );
            let Ok(paths) = glob::glob(&full) else {
                debug!("Invalid wildcard pattern: {}", full);
                continue;
            };
            for path in paths.flatten() {
                if !path.is_file() || !has_allowed_extension(&path, allowed) {
                    continue;
                }
                if let Some(file_type) = FileType::of_path(&path) {
                    candidates.push(self.record_for(&path, file_type, root.is_bundled(), snapshot));
                }
            }
        }
        let tried = roots.iter().map(|r| r.path.clone()).collect();
        ResolutionResult::from_candidates(candidates, tried)
    }

    fn resolve_bare_name(
        &self,
        kind: ImportKind,
        name: &str,
        allowed: &[&str],
        roots: &[ModuleRoot],
        snapshot: &IndexSnapshot,
    ) -> ResolutionResult {
        let mut tried = Vec::new();
        let mut candidates = Vec::new();

        for root in roots {
            if candidates.is_empty() {
                tried.push(root.path.clone());
            }
            if let Some(record) = self.find_in_root(kind, name, allowed, root, snapshot) {
                candidates.push(record);
            }
        }
        ResolutionResult::from_candidates(candidates, tried)
    }

    /// First file of an allowed extension named `name` in `root`, else a
    /// directory module of that name
    fn find_in_root(
        &self,
        kind: ImportKind,
        name: &str,
        allowed: &[&str],
        root: &ModuleRoot,
        snapshot: &IndexSnapshot,
    ) -> Option<ModuleRecord> {
        for ext in allowed {
            let path = root.path.join(format!("{}.{}", name, ext));
            if path.is_file() {
                let file_type = FileType::of_path(&path)?;
                return Some(self.record_for(&path, file_type, root.is_bundled(), snapshot));
            }
        }

        let dir = root.path.join(name);
        if !layout::is_directory_module(&dir) {
            return None;
        }
        let has_cmod = layout::cmod_dir(&dir).is_some();
        let has_cjmod = layout::cjmod_dir(&dir).is_some();
        let file_type = match kind {
            ImportKind::ExtensionModuleImport if has_cjmod => FileType::Cjmod,
            ImportKind::ModuleImport if has_cmod || !has_cjmod => FileType::Cmod,
            _ => return None,
        };
        Some(self.record_for(&dir, file_type, root.is_bundled(), snapshot))
    }

    /// Locate the `.chtl` source of an origin import
    fn locate_origin_source(
        &self,
        raw: &str,
        current_dir: Option<&Path>,
    ) -> Result<(PathBuf, Vec<PathBuf>), ResolveError> {
        if let Some(ext) = Path::new(raw).extension() {
            if !ext.eq_ignore_ascii_case(FileType::SOURCE_EXTENSION) {
                return Err(ResolveError::MalformedOriginReference(format!(
                    "origin source '{}' must be a .{} file",
                    raw,
                    FileType::SOURCE_EXTENSION
                )));
            }
        }

        let is_source = |p: &PathBuf| {
            p.is_file() && has_allowed_extension(p, &[FileType::SOURCE_EXTENSION])
        };
        let with_ext = |p: PathBuf| -> [PathBuf; 2] {
            let mut extended = p.clone().into_os_string();
            extended.push(".");
            extended.push(FileType::SOURCE_EXTENSION);
            [p, PathBuf::from(extended)]
        };
        let not_found = || {
            ResolveError::MalformedOriginReference(format!(
                "cannot find origin source file '{}'",
                raw
            ))
        };

        if is_absolute(raw) {
            return with_ext(PathBuf::from(raw))
                .into_iter()
                .find(is_source)
                .map(|p| (p, Vec::new()))
                .ok_or_else(not_found);
        }

        let roots = self.search_paths();
        let dirs = current_dir
            .map(Path::to_path_buf)
            .into_iter()
            .chain(roots.iter().map(|r| r.path.clone()));

        let mut tried = Vec::new();
        for dir in dirs {
            let found = with_ext(dir.join(raw)).into_iter().find(is_source);
            tried.push(dir);
            if let Some(path) = found {
                return Ok((path, tried));
            }
        }
        Err(not_found())
    }

    fn resolve_origin(&self, request: &ImportRequest) -> Result<ResolutionResult, ResolveError> {
        let (Some(tag), Some(block)) = (
            request.origin_type_tag.as_deref(),
            request.origin_block_name.as_deref(),
        ) else {
            return Err(ResolveError::IncompleteOriginRequest(request.raw_path.clone()));
        };
        if request.raw_path.trim().is_empty() {
            return Err(ResolveError::IncompleteOriginRequest(request.raw_path.clone()));
        }

        let (source, tried) =
            self.locate_origin_source(&request.raw_path, request.current_file_dir.as_deref())?;
        let text = read_source(&source)?;

        let content = origin::find_origin_block(&text, tag, block).ok_or_else(|| {
            ResolveError::MalformedOriginReference(format!(
                "no [Origin] {} {} block in {}",
                tag,
                block,
                source.display()
            ))
        })?;

        let record = ModuleRecord::embedded(block, tag, &source, content);
        Ok(ResolutionResult::from_candidates(vec![record], tried))
    }

    /// One record per named `[Origin]` block of a `.chtl` file
    pub fn resolve_all_origins(
        &self,
        raw_path: &str,
        current_file_dir: Option<&Path>,
    ) -> Result<Vec<ModuleRecord>, ResolveError> {
        let (source, _) = self.locate_origin_source(raw_path, current_file_dir)?;
        let text = read_source(&source)?;
        Ok(origin::list_origin_blocks(&text)
            .into_iter()
            .map(|block| ModuleRecord::embedded(block.name, &block.tag, &source, block.content))
            .collect())
    }

    /// Every `.chtl`, `.cmod` and `.cjmod` file under all roots, recursively
    pub fn all_modules(&self) -> Vec<ModuleRecord> {
        let snapshot = self.index_snapshot();
        let mut seen = rustc_hash::FxHashSet::default();
        let mut modules = Vec::new();
        for root in self.search_paths().iter() {
            for path in module_files_under(&root.path) {
                if !seen.insert(path.clone()) {
                    continue;
                }
                if let Some(file_type) = FileType::of_path(&path) {
                    modules.push(self.record_for(&path, file_type, root.is_bundled(), &snapshot));
                }
            }
        }
        modules
    }
}

fn read_source(path: &Path) -> Result<String, ResolveError> {
    fs::read_to_string(path).map_err(|e| {
        ResolveError::MalformedOriginReference(format!(
            "cannot read origin source {}: {}",
            path.display(),
            e
        ))
    })
}

/// Module files under `dir`, recursively, in sorted order
fn module_files_under(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(module_files_under(&path));
        } else if FileType::of_path(&path).is_some_and(|t| t.is_module()) {
            files.push(path);
        }
    }
    files
}
