//! File-watch driven invalidation
//!
//! Uses the `notify` crate (v7). Every create, modify or remove event under a
//! watched directory drops the cached record for the touched path, the
//! cached search path list and marks the project index dirty, so the next
//! query sees the change.

use crate::resolver::ImportResolver;
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Watches module folders on behalf of one resolver
///
/// Dropping the watcher stops watching.
pub struct ModuleWatcher {
    /// Kept alive to receive events
    _watcher: notify::RecommendedWatcher,
    dirs: Vec<PathBuf>,
    events: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ModuleWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleWatcher")
            .field("dirs", &self.dirs)
            .field("events", &self.events.load(Ordering::SeqCst))
            .finish()
    }
}

impl ModuleWatcher {
    /// Watch `dirs` recursively; directories that do not exist are skipped
    pub fn start(resolver: Arc<ImportResolver>, dirs: &[PathBuf]) -> notify::Result<Self> {
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if apply_event(&resolver, &event) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
            Err(e) => warn!("Module watcher error: {}", e),
        })?;

        let mut watched = Vec::new();
        for dir in dirs {
            if !dir.is_dir() {
                debug!("Not watching missing directory {}", dir.display());
                continue;
            }
            watcher.watch(dir, RecursiveMode::Recursive)?;
            watched.push(dir.clone());
        }
        debug!("Watching {} module directories", watched.len());

        Ok(Self {
            _watcher: watcher,
            dirs: watched,
            events,
        })
    }

    /// Watch the resolver's current search roots
    pub fn for_search_paths(resolver: Arc<ImportResolver>) -> notify::Result<Self> {
        let dirs: Vec<PathBuf> = resolver
            .search_paths()
            .iter()
            .map(|r| r.path.clone())
            .collect();
        Self::start(resolver, &dirs)
    }

    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Number of events that caused an invalidation so far
    pub fn event_count(&self) -> usize {
        self.events.load(Ordering::SeqCst)
    }
}

/// Invalidate what `event` touched; returns false for ignored event kinds
pub(crate) fn apply_event(resolver: &ImportResolver, event: &Event) -> bool {
    let kind = match event.kind {
        EventKind::Create(_) => "create",
        EventKind::Modify(_) => "modify",
        EventKind::Remove(_) => "remove",
        _ => return false,
    };
    // Writes of the project index itself are not module changes
    let store = resolver.store();
    let paths: Vec<_> = event
        .paths
        .iter()
        .filter(|p| !p.starts_with(store.project_dir()))
        .collect();
    if paths.is_empty() {
        return false;
    }
    for path in paths {
        debug!("Module {} event: {}", kind, path.display());
        resolver.invalidate_path(path);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::request::ImportRequest;
    use notify::event::{AccessKind, CreateKind};
    use std::fs;
    use tempfile::TempDir;

    fn resolver(root: &std::path::Path) -> ImportResolver {
        let mut config = ResolverConfig::new(root);
        config.use_index = false;
        ImportResolver::new(config).unwrap()
    }

    #[test]
    fn test_create_event_invalidates_roots() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(temp.path());
        assert!(resolver.search_paths().is_empty());

        let module_dir = temp.path().join("module");
        fs::create_dir_all(&module_dir).unwrap();
        fs::write(module_dir.join("Box.cmod"), "").unwrap();
        // Cached list still empty until the event arrives
        assert!(resolver.search_paths().is_empty());

        let event = Event::new(EventKind::Create(CreateKind::Folder)).add_path(module_dir.clone());
        assert!(apply_event(&resolver, &event));

        let result = resolver.resolve(&ImportRequest::module("Box")).unwrap();
        assert!(result.found);
    }

    #[test]
    fn test_access_events_ignored() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(temp.path());
        let event = Event::new(EventKind::Access(AccessKind::Any)).add_path(temp.path().to_path_buf());
        assert!(!apply_event(&resolver, &event));
    }

    #[test]
    fn test_index_writes_ignored() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(temp.path());
        let index_file = resolver.store().project_index_path();
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(index_file);
        assert!(!apply_event(&resolver, &event));
    }

    #[test]
    fn test_start_skips_missing_dirs() {
        let temp = TempDir::new().unwrap();
        let resolver = Arc::new(resolver(temp.path()));
        let watcher = ModuleWatcher::start(
            Arc::clone(&resolver),
            &[temp.path().to_path_buf(), temp.path().join("missing")],
        )
        .unwrap();
        assert_eq!(watcher.watched_dirs(), &[temp.path().to_path_buf()]);
    }
}
