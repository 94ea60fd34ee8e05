//! Subcommand implementations

pub mod index;
pub mod list;
pub mod lookup;
pub mod paths;
pub mod resolve;
pub mod watch;

use anyhow::Context;
use chtl_modules::{ImportResolver, ResolverConfig};
use std::path::PathBuf;
use tracing::debug;

/// Global options shared by every subcommand
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub install_path: Option<PathBuf>,
    pub active_file: Option<PathBuf>,
}

impl Workspace {
    /// Configuration from `--config`, else `chtl.toml` in the workspace,
    /// with command-line overrides applied
    pub fn load_config(&self) -> anyhow::Result<ResolverConfig> {
        let root = std::path::absolute(&self.root)
            .with_context(|| format!("invalid workspace path {}", self.root.display()))?;
        let mut config = match &self.config {
            Some(path) => ResolverConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ResolverConfig::discover(&root)?,
        };
        if let Some(install) = &self.install_path {
            config.install_path = Some(install.clone());
        }
        debug!("Workspace root: {}", config.workspace_root.display());
        Ok(config)
    }

    /// Resolver for this workspace, bundled index loaded when present
    pub fn resolver(&self) -> anyhow::Result<ImportResolver> {
        let resolver = ImportResolver::new(self.load_config()?)?;
        if let Some(file) = &self.active_file {
            resolver.set_active_file(Some(file));
        }
        if let Some(load) = resolver
            .load_bundled_index()
            .context("failed to load the bundled module index")?
        {
            load.wait()?;
        }
        Ok(resolver)
    }
}
