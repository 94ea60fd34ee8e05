//! `chtl-mod resolve`: Resolve one import the way the compiler would.

use super::Workspace;
use crate::output::StyledOutput;
use chtl_modules::{ImportKind, ImportRequest, ResolutionResult};
use serde_json::json;
use std::path::PathBuf;

/// Import kind as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResolveKind {
    Html,
    Style,
    #[value(name = "javascript", alias = "js")]
    JavaScript,
    Chtl,
    Cjmod,
    Origin,
}

impl From<ResolveKind> for ImportKind {
    fn from(kind: ResolveKind) -> Self {
        match kind {
            ResolveKind::Html => ImportKind::MediaHtml,
            ResolveKind::Style => ImportKind::MediaStyle,
            ResolveKind::JavaScript => ImportKind::MediaScript,
            ResolveKind::Chtl => ImportKind::ModuleImport,
            ResolveKind::Cjmod => ImportKind::ExtensionModuleImport,
            ResolveKind::Origin => ImportKind::OriginEmbedding,
        }
    }
}

pub struct ResolveOptions {
    pub kind: ResolveKind,
    pub path: String,
    pub alias: bool,
    pub from: Option<PathBuf>,
    pub tag: Option<String>,
    pub block: Option<String>,
    pub json: bool,
}

impl ResolveOptions {
    fn request(&self) -> ImportRequest {
        let mut request = ImportRequest::new(self.kind.into(), self.path.clone()).with_alias(self.alias);
        request.origin_type_tag = self.tag.clone();
        request.origin_block_name = self.block.clone();
        if let Some(dir) = &self.from {
            request = request.from_dir(dir.clone());
        }
        request
    }
}

/// Returns whether the import was found
pub fn execute(
    out: &mut StyledOutput,
    workspace: &Workspace,
    options: ResolveOptions,
) -> anyhow::Result<bool> {
    let resolver = workspace.resolver()?;
    let result = resolver.resolve(&options.request())?;

    if options.json {
        out.json(&to_json(&result))?;
    } else {
        print_result(out, &options.path, &result);
    }
    Ok(result.found)
}

fn to_json(result: &ResolutionResult) -> serde_json::Value {
    json!({
        "found": result.found,
        "selected": result.selected,
        "candidates": result.candidates,
        "searchPathsTried": result.search_paths_tried,
    })
}

fn print_result(out: &mut StyledOutput, path: &str, result: &ResolutionResult) {
    match &result.selected {
        Some(selected) => {
            out.success("Resolved ");
            out.plain(path);
            out.newline();
            out.record_details(selected);
        }
        None => {
            out.warning("Not found ");
            out.plain(path);
            out.newline();
        }
    }

    if result.candidates.len() > 1 {
        out.dim("  also matched:");
        out.newline();
        for candidate in result.candidates.iter().skip(1) {
            out.plain("    ");
            out.record_line(candidate);
        }
    }

    if !result.search_paths_tried.is_empty() {
        out.dim("  searched:");
        out.newline();
        for dir in &result.search_paths_tried {
            out.plain(&format!("    {}", dir.display()));
            out.newline();
        }
    }
}
