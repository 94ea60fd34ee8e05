//! `chtl-mod list`: List known modules or exported names.

use super::Workspace;
use crate::output::StyledOutput;
use chtl_modules::ExportKind;

/// Export kind as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportKindArg {
    Template,
    Custom,
    Element,
    Style,
    Script,
    #[value(alias = "variable")]
    Var,
    Function,
    Class,
    Interface,
}

impl From<ExportKindArg> for ExportKind {
    fn from(kind: ExportKindArg) -> Self {
        match kind {
            ExportKindArg::Template => ExportKind::Template,
            ExportKindArg::Custom => ExportKind::Custom,
            ExportKindArg::Element => ExportKind::Element,
            ExportKindArg::Style => ExportKind::Style,
            ExportKindArg::Script => ExportKind::Script,
            ExportKindArg::Var => ExportKind::Var,
            ExportKindArg::Function => ExportKind::Function,
            ExportKindArg::Class => ExportKind::Class,
            ExportKindArg::Interface => ExportKind::Interface,
        }
    }
}

pub fn execute(out: &mut StyledOutput, workspace: &Workspace, all: bool) -> anyhow::Result<()> {
    let resolver = workspace.resolver()?;

    if all {
        let modules = resolver.all_modules();
        for record in &modules {
            out.record_line(record);
        }
        out.dim(&format!("{} modules", modules.len()));
        out.newline();
        return Ok(());
    }

    let names = resolver.module_names();
    for name in &names {
        out.plain(name);
        out.newline();
    }
    out.dim(&format!("{} indexed modules", names.len()));
    out.newline();
    Ok(())
}

/// Indexed export names of one kind
pub fn exports(
    out: &mut StyledOutput,
    workspace: &Workspace,
    kind: ExportKindArg,
) -> anyhow::Result<()> {
    let resolver = workspace.resolver()?;
    let kind = ExportKind::from(kind);
    let names = resolver.export_names(kind);
    for name in &names {
        out.plain(name);
        out.newline();
    }
    out.dim(&format!("{} {} exports", names.len(), kind.as_str()));
    out.newline();
    Ok(())
}
