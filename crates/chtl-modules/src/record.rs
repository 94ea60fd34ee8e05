//! Module records
//!
//! A `ModuleRecord` is what every lookup hands back: a resolved file,
//! a directory-form module, or an origin block synthesized from a source
//! file. The serde shape is the persisted index format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// The two shippable module kinds, plus directories bundling both
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKind {
    /// CMOD: source-level module (`.cmod`, `.chtl`)
    #[default]
    SourceModule,
    /// CJMOD: extension module (`.cjmod`)
    ExtensionModule,
    /// A directory module carrying both CMOD and CJMOD parts
    Hybrid,
}

/// Concrete file type of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Chtl,
    Cmod,
    Cjmod,
    Html,
    Css,
    Js,
    /// Origin block of a tag other than `@Html`, `@Style` or `@JavaScript`
    Origin,
}

impl FileType {
    /// The one source-file extension origin embeddings may come from
    pub const SOURCE_EXTENSION: &'static str = "chtl";

    /// Map a file extension (without the dot) to a file type
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "chtl" => Some(FileType::Chtl),
            "cmod" => Some(FileType::Cmod),
            "cjmod" => Some(FileType::Cjmod),
            "html" | "htm" => Some(FileType::Html),
            "css" => Some(FileType::Css),
            "js" => Some(FileType::Js),
            _ => None,
        }
    }

    /// File type of a path, by its extension
    pub fn of_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension for this type
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Chtl => "chtl",
            FileType::Cmod => "cmod",
            FileType::Cjmod => "cjmod",
            FileType::Html => "html",
            FileType::Css => "css",
            FileType::Js => "js",
            FileType::Origin => "origin",
        }
    }

    /// Module kind a file of this type belongs to
    pub fn module_kind(&self) -> ModuleKind {
        match self {
            FileType::Cjmod => ModuleKind::ExtensionModule,
            _ => ModuleKind::SourceModule,
        }
    }

    /// Whether this is one of the indexable module file types
    pub fn is_module(&self) -> bool {
        matches!(self, FileType::Chtl | FileType::Cmod | FileType::Cjmod)
    }

    /// Map an origin type tag (`@Html`, `@Style`, ...) to the record type
    pub fn from_origin_tag(tag: &str) -> Self {
        match tag.trim_start_matches('@').to_ascii_lowercase().as_str() {
            "html" => FileType::Html,
            "style" | "css" => FileType::Css,
            "javascript" | "script" | "js" => FileType::Js,
            _ => FileType::Origin,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where a record's content lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    #[default]
    File,
    Directory,
    /// Extracted from an `[Origin]` block inside a source file
    Embedded,
}

/// Kind of an exported symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Template,
    Custom,
    Element,
    Style,
    Script,
    Var,
    Function,
    Class,
    Interface,
}

impl ExportKind {
    /// Map a `@Type` hint (without the `@`) to an export kind
    pub fn from_type_hint(hint: &str) -> Self {
        match hint {
            "Element" => ExportKind::Element,
            "Template" => ExportKind::Template,
            "Custom" => ExportKind::Custom,
            "Style" => ExportKind::Style,
            "Script" => ExportKind::Script,
            "Function" => ExportKind::Function,
            "Class" => ExportKind::Class,
            "Interface" => ExportKind::Interface,
            _ => ExportKind::Var,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Template => "template",
            ExportKind::Custom => "custom",
            ExportKind::Element => "element",
            ExportKind::Style => "style",
            ExportKind::Script => "script",
            ExportKind::Var => "var",
            ExportKind::Function => "function",
            ExportKind::Class => "class",
            ExportKind::Interface => "interface",
        }
    }
}

/// A symbol exported by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ExportKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,

    #[serde(default, rename = "returnType", skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

impl ExportEntry {
    pub fn new(name: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            name: name.into(),
            kind,
            signature: None,
            description: None,
            parameters: Vec::new(),
            return_type: None,
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A located module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Module name (file stem or directory name)
    #[serde(rename = "moduleName")]
    pub name: String,

    #[serde(rename = "moduleType")]
    pub file_type: FileType,

    #[serde(default)]
    pub kind: ModuleKind,

    #[serde(default)]
    pub location: Location,

    /// Absolute path of the file or directory (for embedded records: the
    /// source file the block came from)
    #[serde(rename = "filePath")]
    pub path: PathBuf,

    #[serde(rename = "isOfficial", default)]
    pub official: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub exports: Vec<ExportEntry>,

    /// Modification time (epoch milliseconds)
    #[serde(rename = "lastModified", default)]
    pub last_modified: u64,

    #[serde(rename = "fileSize", default)]
    pub size_bytes: u64,

    /// SHA-256 content hash (directory modules)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Extracted block text for embedded records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl ModuleRecord {
    /// Create a bare record for a file; exports and metadata start empty
    pub fn new(name: impl Into<String>, file_type: FileType, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file_type,
            kind: file_type.module_kind(),
            location: Location::File,
            path: path.into(),
            official: false,
            version: None,
            description: None,
            dependencies: Vec::new(),
            exports: Vec::new(),
            last_modified: 0,
            size_bytes: 0,
            hash: None,
            payload: None,
        }
    }

    /// Record for an `[Origin]` block extracted from `source`
    pub fn embedded(name: impl Into<String>, tag: &str, source: &Path, content: String) -> Self {
        let mut record = Self::new(name, FileType::from_origin_tag(tag), source);
        record.location = Location::Embedded;
        record.size_bytes = content.len() as u64;
        record.payload = Some(content);
        record
    }

    /// Fill size and mtime from the filesystem; missing metadata leaves zeros
    pub fn with_fs_metadata(mut self) -> Self {
        if let Ok(meta) = std::fs::metadata(&self.path) {
            self.size_bytes = meta.len();
            self.last_modified = meta.modified().map(epoch_millis).unwrap_or(0);
        }
        self
    }

    pub fn with_official(mut self, official: bool) -> Self {
        self.official = official;
        self
    }

    /// Whether this record exports `symbol`
    pub fn exports_symbol(&self, symbol: &str) -> bool {
        self.exports.iter().any(|e| e.name == symbol)
    }
}

/// Module name for a path: the file stem, or the directory name
pub fn module_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Convert a `SystemTime` to epoch milliseconds
pub fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
