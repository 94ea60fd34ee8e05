//! Compact index projection
//!
//! Holds just enough to answer name and export lookups and to print
//! statistics, so editor tooling can start answering before the full
//! document is parsed.

use super::Index;
use crate::error::IndexError;
use crate::record::{ExportKind, FileType, Location, ModuleRecord};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether a module ships with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleCategory {
    Official,
    User,
}

impl ModuleCategory {
    pub fn of(record: &ModuleRecord) -> Self {
        if record.official {
            ModuleCategory::Official
        } else {
            ModuleCategory::User
        }
    }
}

/// Which module provides an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRef {
    pub module_name: String,
    pub module_type: FileType,
    pub export_type: ExportKind,
    pub category: ModuleCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexStatistics {
    pub total_modules: usize,
    pub total_size: u64,
    pub cmod_count: usize,
    pub cjmod_count: usize,
    pub chtl_count: usize,
    pub official_count: usize,
    pub user_count: usize,
    /// Single-file `.cmod`/`.cjmod` modules
    pub packed_count: usize,
    /// Directory-form modules
    pub source_count: usize,
}

impl IndexStatistics {
    pub fn from_entries(entries: &[ModuleRecord]) -> Self {
        let mut stats = IndexStatistics {
            total_modules: entries.len(),
            ..Default::default()
        };
        for record in entries {
            stats.total_size += record.size_bytes;
            match record.file_type {
                FileType::Cmod => stats.cmod_count += 1,
                FileType::Cjmod => stats.cjmod_count += 1,
                FileType::Chtl => stats.chtl_count += 1,
                _ => {}
            }
            match ModuleCategory::of(record) {
                ModuleCategory::Official => stats.official_count += 1,
                ModuleCategory::User => stats.user_count += 1,
            }
            match record.location {
                Location::Directory => stats.source_count += 1,
                Location::File if record.file_type != FileType::Chtl => stats.packed_count += 1,
                _ => {}
            }
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactIndex {
    pub version: String,
    #[serde(alias = "timestamp")]
    pub build_date: DateTime<Utc>,
    #[serde(default)]
    pub by_name: BTreeMap<String, ModuleRecord>,
    #[serde(default)]
    pub by_export: BTreeMap<String, Vec<ExportRef>>,
    #[serde(default)]
    pub statistics: IndexStatistics,

    /// Record path to module name
    #[serde(skip)]
    by_path: FxHashMap<PathBuf, String>,
}

impl CompactIndex {
    /// Project a full index
    pub fn from_index(index: &Index) -> Self {
        let by_name = index
            .search_map
            .by_name
            .iter()
            .filter_map(|(name, &i)| index.entries.get(i).map(|r| (name.clone(), r.clone())))
            .collect();

        let mut by_export: BTreeMap<String, Vec<ExportRef>> = BTreeMap::new();
        for record in &index.entries {
            for export in &record.exports {
                by_export.entry(export.name.clone()).or_default().push(ExportRef {
                    module_name: record.name.clone(),
                    module_type: record.file_type,
                    export_type: export.kind,
                    category: ModuleCategory::of(record),
                });
            }
        }

        let mut compact = Self {
            version: index.version.clone(),
            build_date: index.build_date,
            by_name,
            by_export,
            statistics: IndexStatistics::from_entries(&index.entries),
            by_path: FxHashMap::default(),
        };
        compact.rebuild_paths();
        compact
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.is_file() {
            return Err(IndexError::NotFound(path.to_path_buf()));
        }
        let content = fs::read(path)?;
        let mut compact: CompactIndex = serde_json::from_slice(&content)?;
        compact.rebuild_paths();
        Ok(compact)
    }

    fn rebuild_paths(&mut self) {
        self.by_path = self
            .by_name
            .iter()
            .map(|(name, record)| (record.path.clone(), name.clone()))
            .collect();
    }

    pub fn find_module(&self, name: &str) -> Option<&ModuleRecord> {
        self.by_name.get(name)
    }

    /// Record whose path is exactly `path`
    pub fn record_for_path(&self, path: &Path) -> Option<&ModuleRecord> {
        self.by_path.get(path).and_then(|name| self.by_name.get(name))
    }

    pub fn find_by_export(&self, symbol: &str) -> &[ExportRef] {
        self.by_export.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Exported symbol names of one kind, sorted
    pub fn export_names(&self, kind: ExportKind) -> Vec<&str> {
        self.by_export
            .iter()
            .filter(|(_, refs)| refs.iter().any(|r| r.export_type == kind))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Structure;
    use crate::record::ExportEntry;

    fn index() -> Index {
        let mut button = ModuleRecord::new("Button", FileType::Cmod, "/m/Button.cmod").with_official(true);
        button.size_bytes = 100;
        button.exports.push(ExportEntry::new("Primary", ExportKind::Style));

        let mut util = ModuleRecord::new("Util", FileType::Cjmod, "/m/Util.cjmod");
        util.size_bytes = 50;
        util.exports.push(ExportEntry::new("Primary", ExportKind::Function));

        let mut theme = ModuleRecord::new("Theme", FileType::Cmod, "/m/Theme");
        theme.location = Location::Directory;

        let page = ModuleRecord::new("page", FileType::Chtl, "/m/page.chtl");

        Index::new(Structure::Mixed, vec![], vec![button, util, theme, page])
    }

    #[test]
    fn test_statistics() {
        let stats = CompactIndex::from_index(&index()).statistics;
        assert_eq!(stats.total_modules, 4);
        assert_eq!(stats.total_size, 150);
        assert_eq!(stats.cmod_count, 2);
        assert_eq!(stats.cjmod_count, 1);
        assert_eq!(stats.chtl_count, 1);
        assert_eq!(stats.official_count, 1);
        assert_eq!(stats.user_count, 3);
        assert_eq!(stats.packed_count, 2);
        assert_eq!(stats.source_count, 1);
    }

    #[test]
    fn test_export_refs() {
        let compact = CompactIndex::from_index(&index());
        let refs = compact.find_by_export("Primary");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].module_name, "Button");
        assert_eq!(refs[0].category, ModuleCategory::Official);
        assert_eq!(refs[1].export_type, ExportKind::Function);
        assert!(compact.find_by_export("Missing").is_empty());
    }

    #[test]
    fn test_record_for_path_after_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("compact.json");
        fs::write(&path, serde_json::to_vec(&CompactIndex::from_index(&index())).unwrap()).unwrap();

        let compact = CompactIndex::load(&path).unwrap();
        let record = compact.record_for_path(Path::new("/m/Util.cjmod")).unwrap();
        assert_eq!(record.name, "Util");
        assert!(compact.record_for_path(Path::new("/m/Gone.cmod")).is_none());
    }

    #[test]
    fn test_export_names_by_kind() {
        let compact = CompactIndex::from_index(&index());
        assert_eq!(compact.export_names(ExportKind::Style), vec!["Primary"]);
        assert_eq!(compact.export_names(ExportKind::Function), vec!["Primary"]);
        assert!(compact.export_names(ExportKind::Var).is_empty());
    }

    #[test]
    fn test_persisted_shape() {
        let compact = CompactIndex::from_index(&index());
        let json = serde_json::to_value(&compact).unwrap();
        assert!(json.get("buildDate").is_some());
        assert_eq!(json["byName"]["Util"]["moduleType"], "cjmod");
        assert_eq!(json["byExport"]["Primary"][0]["moduleName"], "Button");
        assert_eq!(json["byExport"]["Primary"][0]["category"], "official");
        assert_eq!(json["statistics"]["cjmodCount"], 1);
    }
}
