//! CHTL module resolution and indexing
//!
//! This crate locates the module an import statement refers to and keeps
//! the lookup indices editor tooling queries:
//! - Search path construction over bundled, compiler, project and configured roots
//! - Layout detection (classified `CMOD/`+`CJMOD/` folders vs mixed)
//! - Per-kind import resolution (media, modules, `[Origin]` embedding)
//! - Heuristic export, dependency and manifest extraction
//! - Persisted module indices (full and compact) with a two-phase bundled load
//! - Record and search path caches, optionally invalidated by a file watcher

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod origin;
pub mod record;
pub mod request;
pub mod resolver;
pub mod scan;
pub mod search_path;
pub mod store;
pub mod watch;

pub use cache::{CacheStats, RecordCache, RootsCache};
pub use config::ResolverConfig;
pub use error::{ConfigError, IndexError, ResolveError};
pub use index::{CompactIndex, ExportRef, Index, IndexBuilder, IndexStatistics, ModuleCategory};
pub use layout::Structure;
pub use origin::OriginBlock;
pub use record::{ExportEntry, ExportKind, FileType, Location, ModuleKind, ModuleRecord};
pub use request::{ImportKind, ImportRequest, ResolutionResult};
pub use resolver::ImportResolver;
pub use scan::ExportExtractor;
pub use search_path::{ModuleRoot, RootCategory, RootOrigin, SearchContext};
pub use store::{BundledLoad, BundledState, ExportHit, IndexOrigin, IndexStatus, IndexStore};
pub use watch::ModuleWatcher;
