//! Resolver configuration
//!
//! Every option the resolver understands, with its default. Loaded from the
//! `[modules]` table of `chtl.toml` or built in code, then validated once
//! when an [`crate::ImportResolver`] is constructed.
//!
//! ```toml
//! [modules]
//! install-path = "/opt/chtl"
//! compiler-path = "/opt/chtl/bin/chtl"
//! search-paths = ["${workspaceFolder}/vendor", "${extensionPath}/extra"]
//! cache-ttl-secs = 300
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "chtl.toml";

/// Default lifetime of cached records and search paths
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Directory (under the workspace) holding the project index
pub const DEFAULT_INDEX_DIR: &str = ".chtl";

const EXTENSION_PATH_PLACEHOLDER: &str = "${extensionPath}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Workspace root; relative paths in other options resolve against it
    pub workspace_root: PathBuf,

    /// Engine installation directory (`${extensionPath}`); its `module`
    /// folder is the bundled module directory
    pub install_path: Option<PathBuf>,

    /// Override for the bundled module directory (may hold placeholders)
    pub official_module_path: Option<String>,

    /// Path of the compiler binary
    pub compiler_path: Option<PathBuf>,

    /// Extra search path templates, lowest priority
    pub search_paths: Vec<String>,

    /// Lifetime of cached records and search paths, in seconds
    pub cache_ttl_secs: u64,

    /// Directory where the project index is persisted
    pub index_dir: Option<PathBuf>,

    /// Consult persisted indices before scanning
    pub use_index: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::new(),
            install_path: None,
            official_module_path: None,
            compiler_path: None,
            search_paths: Vec::new(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            index_dir: None,
            use_index: true,
        }
    }
}

/// Wrapper matching the layout of `chtl.toml`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    modules: Option<ResolverConfig>,
}

impl ResolverConfig {
    /// Configuration for a workspace with every other option defaulted
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }

    /// Parse the `[modules]` table of a `chtl.toml` file
    ///
    /// A missing `workspace-root` defaults to the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if config.workspace_root.as_os_str().is_empty() {
            if let Some(dir) = path.parent() {
                config.workspace_root = dir.to_path_buf();
            }
        }
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.modules.unwrap_or_default())
    }

    /// Load `<workspace>/chtl.toml` if present, else defaults for `workspace`
    pub fn discover(workspace: &Path) -> Result<Self, ConfigError> {
        let path = workspace.join(CONFIG_FILE_NAME);
        if path.is_file() {
            let mut config = Self::from_file(&path)?;
            if config.workspace_root.is_relative() {
                config.workspace_root = workspace.join(&config.workspace_root);
            }
            Ok(config)
        } else {
            Ok(Self::new(workspace))
        }
    }

    /// Check option consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "workspace-root cannot be empty".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache-ttl-secs must be greater than zero".to_string(),
            ));
        }
        if let Some(template) = self.search_paths.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "search-paths contains an empty entry: {:?}",
                template
            )));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Directory where the project index lives
    pub fn project_index_dir(&self) -> PathBuf {
        match &self.index_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.workspace_root.join(dir),
            None => self.workspace_root.join(DEFAULT_INDEX_DIR),
        }
    }

    /// Substitute `${workspaceFolder}`, `${workspaceRoot}` and `${extensionPath}`
    ///
    /// Returns `None` for a template naming `${extensionPath}` when no
    /// install path is set.
    pub fn expand_placeholders(&self, template: &str) -> Option<PathBuf> {
        let workspace = self.workspace_root.to_string_lossy();
        let mut expanded = template
            .replace("${workspaceFolder}", &workspace)
            .replace("${workspaceRoot}", &workspace);

        if expanded.contains(EXTENSION_PATH_PLACEHOLDER) {
            let install = self.install_path.as_deref()?.to_string_lossy();
            expanded = expanded.replace(EXTENSION_PATH_PLACEHOLDER, &install);
        }

        let path = PathBuf::from(expanded);
        if path.is_relative() {
            Some(self.workspace_root.join(path))
        } else {
            Some(path)
        }
    }
}
