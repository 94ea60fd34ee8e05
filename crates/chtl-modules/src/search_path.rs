//! Search path assembly
//!
//! Builds the ordered list of directories a module import is looked up in.
//! Roots are tried highest priority first:
//!
//! 1. the bundled (official) module directory
//! 2. the compiler binary's directory's module folder
//! 3. the active file's directory's module folder, then that directory itself
//! 4. module folders under `src`, `source`, `lib` and `app` in the workspace
//! 5. the workspace root's module folder
//! 6. configured extra paths
//!
//! Every module folder found also contributes its CMOD and CJMOD type
//! folders. Missing directories are dropped and duplicates collapse to
//! their first occurrence.

use crate::config::ResolverConfig;
use crate::layout;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};

/// Workspace subfolders probed for module folders
pub const SOURCE_DIR_NAMES: [&str; 4] = ["src", "source", "lib", "app"];

/// Default bundled module folder under the install path
pub const BUNDLED_DIR_NAME: &str = "module";

/// Where a root came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootOrigin {
    Bundled,
    Compiler,
    ActiveFile,
    SourceDir,
    Workspace,
    Config,
}

/// Coarse classification of a root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RootCategory {
    Bundled,
    Project,
    Config,
}

impl RootOrigin {
    pub fn category(&self) -> RootCategory {
        match self {
            RootOrigin::Bundled => RootCategory::Bundled,
            RootOrigin::Config => RootCategory::Config,
            _ => RootCategory::Project,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RootOrigin::Bundled => "bundled",
            RootOrigin::Compiler => "compiler",
            RootOrigin::ActiveFile => "active-file",
            RootOrigin::SourceDir => "source-dir",
            RootOrigin::Workspace => "workspace",
            RootOrigin::Config => "config",
        }
    }
}

impl fmt::Display for RootOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory searched for modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRoot {
    pub path: PathBuf,
    pub origin: RootOrigin,
    /// Position in the search order, 0 is tried first
    pub rank: usize,
}

impl ModuleRoot {
    pub fn is_bundled(&self) -> bool {
        self.origin == RootOrigin::Bundled
    }
}

/// Inputs to the search path build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchContext {
    pub workspace_root: PathBuf,
    pub active_file_dir: Option<PathBuf>,
    pub compiler_path: Option<PathBuf>,
    /// Bundled directory override, placeholders already expanded
    pub official_module_path: Option<PathBuf>,
    /// Engine install path (`${extensionPath}`)
    pub install_path: Option<PathBuf>,
    /// Extra paths, placeholders already expanded
    pub extra_paths: Vec<PathBuf>,
}

impl SearchContext {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }

    /// Context for `config`, with the given active file directory
    pub fn from_config(config: &ResolverConfig, active_file_dir: Option<PathBuf>) -> Self {
        Self {
            workspace_root: config.workspace_root.clone(),
            active_file_dir,
            compiler_path: config.compiler_path.clone(),
            official_module_path: config
                .official_module_path
                .as_deref()
                .and_then(|t| config.expand_placeholders(t)),
            install_path: config.install_path.clone(),
            extra_paths: config
                .search_paths
                .iter()
                .filter_map(|t| config.expand_placeholders(t))
                .collect(),
        }
    }

    /// The bundled module directory: the override, else `<install>/module`
    pub fn bundled_dir(&self) -> Option<PathBuf> {
        self.official_module_path
            .clone()
            .or_else(|| self.install_path.as_ref().map(|p| p.join(BUNDLED_DIR_NAME)))
    }
}

/// Collects roots in order, dropping missing and duplicate directories
struct RootList {
    roots: Vec<ModuleRoot>,
    seen: FxHashSet<PathBuf>,
}

impl RootList {
    fn new() -> Self {
        Self {
            roots: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    fn push(&mut self, path: PathBuf, origin: RootOrigin) {
        if !path.is_dir() {
            return;
        }
        // Canonical form folds symlinks and case-variant spellings
        let key = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if !self.seen.insert(key) {
            return;
        }
        let rank = self.roots.len();
        self.roots.push(ModuleRoot { path, origin, rank });
    }

    /// A module folder and its type folders
    fn push_module_folder(&mut self, module_dir: PathBuf, origin: RootOrigin) {
        let type_dirs = layout::type_dirs(&module_dir);
        self.push(module_dir, origin);
        for dir in type_dirs {
            self.push(dir, origin);
        }
    }

    /// Every module folder spelling under `base`
    fn push_module_folders_under(&mut self, base: &Path, origin: RootOrigin) {
        for module_dir in layout::module_dirs(base) {
            self.push_module_folder(module_dir, origin);
        }
    }
}

/// Build the prioritized root list for `ctx`
pub fn build(ctx: &SearchContext) -> Vec<ModuleRoot> {
    let mut list = RootList::new();

    if let Some(bundled) = ctx.bundled_dir() {
        list.push_module_folder(bundled, RootOrigin::Bundled);
    }

    if let Some(compiler) = ctx.compiler_path.as_deref().filter(|p| p.exists()) {
        if let Some(dir) = compiler.parent() {
            list.push_module_folders_under(dir, RootOrigin::Compiler);
        }
    }

    if let Some(dir) = &ctx.active_file_dir {
        list.push_module_folders_under(dir, RootOrigin::ActiveFile);
        list.push(dir.clone(), RootOrigin::ActiveFile);
    }

    for name in SOURCE_DIR_NAMES {
        list.push_module_folders_under(&ctx.workspace_root.join(name), RootOrigin::SourceDir);
    }

    list.push_module_folders_under(&ctx.workspace_root, RootOrigin::Workspace);

    for extra in &ctx.extra_paths {
        if layout::MODULE_DIR_NAMES
            .iter()
            .any(|n| extra.file_name().is_some_and(|f| f == *n))
        {
            list.push_module_folder(extra.clone(), RootOrigin::Config);
        } else {
            list.push_module_folders_under(extra, RootOrigin::Config);
            list.push(extra.clone(), RootOrigin::Config);
        }
    }

    list.roots
}

/// Workspace module folders covered by the project index
///
/// Spellings that name the same directory collapse to the first one.
pub fn project_module_dirs(ctx: &SearchContext) -> Vec<PathBuf> {
    let mut seen = FxHashSet::default();
    SOURCE_DIR_NAMES
        .iter()
        .map(|name| ctx.workspace_root.join(name))
        .chain(std::iter::once(ctx.workspace_root.clone()))
        .flat_map(|base| layout::module_dirs(&base))
        .filter(|dir| seen.insert(std::fs::canonicalize(dir).unwrap_or_else(|_| dir.clone())))
        .collect()
}

/// Human-readable listing of roots and the search strategy
pub fn render_debug_report(workspace_root: &Path, roots: &[ModuleRoot]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CHTL module search paths");
    let _ = writeln!(out, "Workspace: {}", workspace_root.display());
    let _ = writeln!(out);
    let _ = writeln!(out, "Search paths:");
    if roots.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for root in roots {
        let mark = if root.path.is_dir() { "ok" } else { "missing" };
        let _ = writeln!(
            out,
            "  {}. [{}] {} ({})",
            root.rank + 1,
            root.origin,
            root.path.display(),
            mark
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Search order:");
    let _ = writeln!(out, "  1. bundled module directory");
    let _ = writeln!(out, "  2. module folder next to the compiler binary");
    let _ = writeln!(out, "  3. module folder of the active file's directory, then the directory itself");
    let _ = writeln!(out, "  4. module folders under src, source, lib, app");
    let _ = writeln!(out, "  5. module folder of the workspace root");
    let _ = writeln!(out, "  6. configured extra search paths");
    let _ = writeln!(out);
    let _ = writeln!(out, "Layouts:");
    let _ = writeln!(out, "  mixed: cmod, chtl and cjmod files side by side in the module folder");
    let _ = writeln!(out, "  classified: CMOD/Cmod/cmod and CJMOD/CJmod/cjmod subfolders");
    out
}
