//! Import requests and resolution results

use crate::record::{FileType, ModuleRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

/// Kind of an import statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `[Import] @Html from ...`
    MediaHtml,
    /// `[Import] @Style from ...`
    MediaStyle,
    /// `[Import] @JavaScript from ...`
    MediaScript,
    /// `[Import] @Chtl from ...`
    ModuleImport,
    /// `[Import] @CJmod from ...`
    ExtensionModuleImport,
    /// `[Import] [Origin] @Tag Name from ...`
    OriginEmbedding,
}

impl ImportKind {
    /// Extensions a located file must carry for this kind
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            ImportKind::MediaHtml => &["html"],
            ImportKind::MediaStyle => &["css"],
            ImportKind::MediaScript => &["js"],
            ImportKind::ModuleImport => &["cmod", "chtl"],
            ImportKind::ExtensionModuleImport => &["cjmod"],
            ImportKind::OriginEmbedding => &[FileType::SOURCE_EXTENSION],
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(
            self,
            ImportKind::MediaHtml | ImportKind::MediaStyle | ImportKind::MediaScript
        )
    }

    /// Map an import type keyword (`@Html`, `@Chtl`, ...) to a kind
    pub fn from_type_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim_start_matches('@').to_ascii_lowercase().as_str() {
            "html" => Some(ImportKind::MediaHtml),
            "style" => Some(ImportKind::MediaStyle),
            "javascript" => Some(ImportKind::MediaScript),
            "chtl" => Some(ImportKind::ModuleImport),
            "cjmod" => Some(ImportKind::ExtensionModuleImport),
            _ => None,
        }
    }
}

/// A single import to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub kind: ImportKind,
    /// Path or name as written in the statement
    pub raw_path: String,
    /// Whether the statement carried an `as Name` clause
    pub has_alias_clause: bool,
    /// Origin type tag, e.g. `@Style`
    pub origin_type_tag: Option<String>,
    /// Origin block name
    pub origin_block_name: Option<String>,
    /// Directory of the file containing the import
    pub current_file_dir: Option<PathBuf>,
}

static IMPORT_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\[Import\]\s*(?:\[Origin\]\s*(@\w+)\s+(\w+)|(@\w+))\s+from\s+(?:"([^"]+)"|'([^']+)'|([^\s;]+))(?:\s+as\s+(\w+))?"#,
    )
    .expect("import statement pattern")
});

impl ImportRequest {
    pub fn new(kind: ImportKind, raw_path: impl Into<String>) -> Self {
        Self {
            kind,
            raw_path: raw_path.into(),
            has_alias_clause: false,
            origin_type_tag: None,
            origin_block_name: None,
            current_file_dir: None,
        }
    }

    /// `[Import] @Chtl from <path>`
    pub fn module(raw_path: impl Into<String>) -> Self {
        Self::new(ImportKind::ModuleImport, raw_path)
    }

    /// `[Import] @CJmod from <path>`
    pub fn extension_module(raw_path: impl Into<String>) -> Self {
        Self::new(ImportKind::ExtensionModuleImport, raw_path)
    }

    /// `[Import] [Origin] <tag> <block> from <path>`
    pub fn origin(raw_path: impl Into<String>, tag: impl Into<String>, block: impl Into<String>) -> Self {
        let mut request = Self::new(ImportKind::OriginEmbedding, raw_path);
        request.origin_type_tag = Some(tag.into());
        request.origin_block_name = Some(block.into());
        request
    }

    pub fn with_alias(mut self, has_alias: bool) -> Self {
        self.has_alias_clause = has_alias;
        self
    }

    pub fn from_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_file_dir = Some(dir.into());
        self
    }

    /// Parse one `[Import] ...` statement
    ///
    /// Returns `None` for statements of an unrecognized import type.
    pub fn parse_statement(statement: &str) -> Option<Self> {
        let caps = IMPORT_STATEMENT.captures(statement)?;
        let path = caps
            .get(4)
            .or_else(|| caps.get(5))
            .or_else(|| caps.get(6))?
            .as_str()
            .to_string();
        let has_alias = caps.get(7).is_some();

        if let (Some(tag), Some(block)) = (caps.get(1), caps.get(2)) {
            return Some(Self::origin(path, tag.as_str(), block.as_str()).with_alias(has_alias));
        }

        let kind = ImportKind::from_type_keyword(caps.get(3)?.as_str())?;
        Some(Self::new(kind, path).with_alias(has_alias))
    }
}

/// Outcome of resolving one import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    pub found: bool,
    pub selected: Option<ModuleRecord>,
    /// Every match seen, `selected` first
    pub candidates: Vec<ModuleRecord>,
    /// Directories consulted, in priority order
    pub search_paths_tried: Vec<PathBuf>,
}

impl ResolutionResult {
    pub fn not_found(search_paths_tried: Vec<PathBuf>) -> Self {
        Self {
            found: false,
            selected: None,
            candidates: Vec::new(),
            search_paths_tried,
        }
    }

    /// First candidate becomes the selection
    pub fn from_candidates(candidates: Vec<ModuleRecord>, search_paths_tried: Vec<PathBuf>) -> Self {
        Self {
            found: !candidates.is_empty(),
            selected: candidates.first().cloned(),
            candidates,
            search_paths_tried,
        }
    }

    /// Path of the selected record, if any
    pub fn selected_path(&self) -> Option<&std::path::Path> {
        self.selected.as_ref().map(|r| r.path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_import() {
        let request = ImportRequest::parse_statement("[Import] @Chtl from Chtholly").unwrap();
        assert_eq!(request.kind, ImportKind::ModuleImport);
        assert_eq!(request.raw_path, "Chtholly");
        assert!(!request.has_alias_clause);
    }

    #[test]
    fn test_parse_media_import_with_alias() {
        let request =
            ImportRequest::parse_statement(r#"[Import] @Style from "theme.css" as theme"#).unwrap();
        assert_eq!(request.kind, ImportKind::MediaStyle);
        assert_eq!(request.raw_path, "theme.css");
        assert!(request.has_alias_clause);
    }

    #[test]
    fn test_parse_origin_import() {
        let request =
            ImportRequest::parse_statement("[Import] [Origin] @Style box from 'page.chtl'").unwrap();
        assert_eq!(request.kind, ImportKind::OriginEmbedding);
        assert_eq!(request.origin_type_tag.as_deref(), Some("@Style"));
        assert_eq!(request.origin_block_name.as_deref(), Some("box"));
        assert_eq!(request.raw_path, "page.chtl");
    }

    #[test]
    fn test_parse_unknown_type() {
        assert!(ImportRequest::parse_statement("[Import] @Vue from x").is_none());
        assert!(ImportRequest::parse_statement("not an import").is_none());
    }

    #[test]
    fn test_from_candidates_selects_first() {
        let a = ModuleRecord::new("a", FileType::Cmod, "/r1/a.cmod");
        let b = ModuleRecord::new("a", FileType::Cmod, "/r2/a.cmod");
        let result = ResolutionResult::from_candidates(vec![a.clone(), b], vec![]);
        assert!(result.found);
        assert_eq!(result.selected, Some(a));
        assert_eq!(result.candidates.len(), 2);
    }
}
