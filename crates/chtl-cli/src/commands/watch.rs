//! `chtl-mod watch`: Keep the project index fresh while files change.

use super::Workspace;
use crate::output::StyledOutput;
use anyhow::Context;
use chtl_modules::ModuleWatcher;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs until interrupted
pub fn execute(out: &mut StyledOutput, workspace: &Workspace) -> anyhow::Result<()> {
    let resolver = Arc::new(workspace.resolver()?);
    let watcher = ModuleWatcher::for_search_paths(Arc::clone(&resolver))
        .context("failed to start the file watcher")?;

    if watcher.watched_dirs().is_empty() {
        out.warning("No module folders to watch");
        out.newline();
        return Ok(());
    }
    out.success("Watching ");
    out.plain(&format!("{} module folders", watcher.watched_dirs().len()));
    out.newline();
    for dir in watcher.watched_dirs() {
        out.dim(&format!("  {}", dir.display()));
        out.newline();
    }

    let mut seen = watcher.event_count();
    loop {
        std::thread::sleep(POLL_INTERVAL);
        let count = watcher.event_count();
        if count == seen {
            continue;
        }
        seen = count;
        match resolver.rebuild_project_index() {
            Ok(index) => {
                out.info("Reindexed ");
                out.plain(&format!("{} modules", index.len()));
                out.newline();
            }
            Err(e) => warn!("Failed to rebuild project module index: {}", e),
        }
    }
}
