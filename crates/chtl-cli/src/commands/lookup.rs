//! `chtl-mod lookup` / `chtl-mod exports`: Index queries.

use super::Workspace;
use crate::output::StyledOutput;

/// Returns whether the module was found
pub fn module(
    out: &mut StyledOutput,
    workspace: &Workspace,
    name: &str,
    json: bool,
) -> anyhow::Result<bool> {
    let resolver = workspace.resolver()?;
    let Some(record) = resolver.find_module(name) else {
        out.warning("No indexed module named ");
        out.plain(name);
        out.newline();
        return Ok(false);
    };

    if json {
        out.json(&serde_json::to_value(&record)?)?;
    } else {
        out.record_details(&record);
    }
    Ok(true)
}

/// Returns whether any module exports `symbol`
pub fn exports(out: &mut StyledOutput, workspace: &Workspace, symbol: &str) -> anyhow::Result<bool> {
    let resolver = workspace.resolver()?;
    let hits = resolver.find_by_export(symbol);
    if hits.is_empty() {
        out.warning("No module exports ");
        out.plain(symbol);
        out.newline();
        return Ok(false);
    }

    for hit in &hits {
        out.bold(&hit.module_name);
        out.plain(" ");
        out.info(&format!("[{}]", hit.module_type));
        out.plain(&format!(" {} {} ", hit.export_type.as_str(), symbol));
        out.dim(&format!("({:?}, {:?})", hit.module_kind, hit.origin).to_lowercase());
        out.newline();
    }
    Ok(true)
}
