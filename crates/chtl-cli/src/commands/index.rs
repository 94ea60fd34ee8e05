//! `chtl-mod index`: Build and inspect module indices.

use super::Workspace;
use crate::output::StyledOutput;
use anyhow::Context;
use chtl_modules::{BundledState, CompactIndex, Index, IndexBuilder, IndexStatistics};
use std::path::Path;
use std::time::Instant;

/// Index one module folder and write both documents
pub fn build(
    out: &mut StyledOutput,
    dir: &Path,
    official: bool,
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let index = IndexBuilder::new()
        .official(official)
        .build(dir)
        .with_context(|| format!("failed to index {}", dir.display()))?;

    let target = out_dir.unwrap_or(dir);
    index
        .save(target)
        .with_context(|| format!("failed to write index to {}", target.display()))?;

    print_summary(out, &index, start);
    out.field("written to", &target.display().to_string());
    Ok(())
}

/// Rebuild the workspace's project index
pub fn rebuild_project(out: &mut StyledOutput, workspace: &Workspace) -> anyhow::Result<()> {
    let start = Instant::now();
    let resolver = workspace.resolver()?;
    let index = resolver
        .rebuild_project_index()
        .context("failed to rebuild the project index")?;

    print_summary(out, &index, start);
    out.field(
        "written to",
        &resolver.store().project_dir().display().to_string(),
    );
    Ok(())
}

fn print_summary(out: &mut StyledOutput, index: &Index, start: Instant) {
    let stats = CompactIndex::from_index(index).statistics;
    out.success("Indexed ");
    out.plain(&format!(
        "{} modules, {} exports in {:.2?}",
        index.len(),
        index.search_map.by_export.len(),
        start.elapsed()
    ));
    out.newline();
    out.field("structure", &index.structure.to_string());
    print_statistics(out, &stats);
}

fn print_statistics(out: &mut StyledOutput, stats: &IndexStatistics) {
    out.field(
        "types",
        &format!(
            "{} cmod, {} cjmod, {} chtl",
            stats.cmod_count, stats.cjmod_count, stats.chtl_count
        ),
    );
    out.field(
        "origin",
        &format!("{} official, {} user", stats.official_count, stats.user_count),
    );
    out.field(
        "layout",
        &format!("{} packed, {} source", stats.packed_count, stats.source_count),
    );
    out.field("total size", &format!("{} bytes", stats.total_size));
}

/// Print bundled and project index state without rebuilding anything
pub fn status(out: &mut StyledOutput, workspace: &Workspace) -> anyhow::Result<()> {
    let resolver = workspace.resolver()?;
    let status = resolver.index_status();

    out.bold("Bundled index");
    out.newline();
    let bundled = match status.bundled {
        BundledState::NotLoaded => "not found".to_string(),
        BundledState::Compact => format!("compact, {} modules", status.bundled_modules),
        BundledState::Full => format!("full, {} modules", status.bundled_modules),
    };
    out.field("state", &bundled);

    out.bold("Project index");
    out.newline();
    out.field("file", &status.project_index_path.display().to_string());
    // Nothing is loaded in a fresh process; report the persisted document
    let mut stale = status.project_stale;
    match (status.project_modules, status.project_build_date) {
        (Some(modules), Some(built)) => {
            out.field("modules", &modules.to_string());
            out.field("built", &built.to_rfc3339());
        }
        _ => match Index::load(&status.project_index_path) {
            Ok(saved) => {
                out.field("modules", &saved.len().to_string());
                out.field("built", &saved.build_date.to_rfc3339());
                stale = saved.roots != status.project_roots || saved.is_stale();
            }
            Err(_) => out.field("modules", "not built"),
        },
    }
    if status.project_roots.is_empty() {
        out.field("roots", "(none)");
    }
    for root in &status.project_roots {
        out.field("root", &root.display().to_string());
    }
    if stale {
        out.plain("  ");
        out.warning("stale");
        out.plain(" (rebuilt on next query)");
        out.newline();
    }
    Ok(())
}
