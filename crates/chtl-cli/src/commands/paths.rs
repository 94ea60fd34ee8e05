//! `chtl-mod paths`: Show the module search paths.

use super::Workspace;
use crate::output::StyledOutput;

pub fn execute(out: &mut StyledOutput, workspace: &Workspace) -> anyhow::Result<()> {
    let resolver = workspace.resolver()?;
    out.plain(&resolver.render_debug_report());
    Ok(())
}
