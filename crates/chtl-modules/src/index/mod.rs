//! Persisted module index
//!
//! An [`Index`] is the flat list of records found under one or more module
//! folders plus four lookup maps built from it. It is saved as two JSON
//! artifacts: the full document (`module-index.json`) and a compact
//! projection (`module-index.compact.json`) that loads quickly.

pub mod builder;
pub mod compact;

pub use builder::IndexBuilder;
pub use compact::{CompactIndex, ExportRef, IndexStatistics, ModuleCategory};

use crate::error::IndexError;
use crate::layout::Structure;
use crate::record::{ExportKind, FileType, ModuleRecord};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File name of the full index document
pub const INDEX_FILE_NAME: &str = "module-index.json";

/// File name of the compact index document
pub const COMPACT_INDEX_FILE_NAME: &str = "module-index.compact.json";

/// Format version written into new indices
pub const INDEX_FORMAT_VERSION: &str = "1.0.0";

/// Entries split by officiality
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialitySplit {
    pub official: Vec<usize>,
    pub project: Vec<usize>,
}

/// Lookup maps over an index's entries (values are entry positions)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMap {
    pub by_name: BTreeMap<String, usize>,
    pub by_export: BTreeMap<String, Vec<usize>>,
    pub by_type: BTreeMap<String, Vec<usize>>,
    pub by_official: OfficialitySplit,
}

impl SearchMap {
    /// Build the maps from a flat entry list
    ///
    /// A name shared by several entries maps to the first of them.
    pub fn from_entries(entries: &[ModuleRecord]) -> Self {
        let mut map = SearchMap::default();
        for (i, record) in entries.iter().enumerate() {
            map.by_name.entry(record.name.clone()).or_insert(i);
            for export in &record.exports {
                let slots = map.by_export.entry(export.name.clone()).or_default();
                if !slots.contains(&i) {
                    slots.push(i);
                }
            }
            map.by_type
                .entry(record.file_type.to_string())
                .or_default()
                .push(i);
            if record.official {
                map.by_official.official.push(i);
            } else {
                map.by_official.project.push(i);
            }
        }
        map
    }
}

/// A module index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub version: String,

    #[serde(alias = "timestamp")]
    pub build_date: DateTime<Utc>,

    #[serde(default)]
    pub structure: Structure,

    /// Module folders the index was built from
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    #[serde(rename = "modules", alias = "entries", default)]
    pub entries: Vec<ModuleRecord>,

    #[serde(default)]
    pub search_map: SearchMap,

    #[serde(skip)]
    by_path: FxHashMap<PathBuf, usize>,
}

impl Index {
    pub fn new(structure: Structure, roots: Vec<PathBuf>, entries: Vec<ModuleRecord>) -> Self {
        let mut index = Self {
            version: INDEX_FORMAT_VERSION.to_string(),
            build_date: Utc::now(),
            structure,
            roots,
            entries,
            search_map: SearchMap::default(),
            by_path: FxHashMap::default(),
        };
        index.rebuild_maps();
        index
    }

    pub fn with_build_date(mut self, build_date: DateTime<Utc>) -> Self {
        self.build_date = build_date;
        self
    }

    /// An index with no entries
    pub fn empty() -> Self {
        Self::new(Structure::Mixed, Vec::new(), Vec::new())
    }

    /// Recompute every lookup map from `entries`
    pub fn rebuild_maps(&mut self) {
        self.search_map = SearchMap::from_entries(&self.entries);
        self.by_path = FxHashMap::default();
        for (i, record) in self.entries.iter().enumerate() {
            self.by_path.entry(record.path.clone()).or_insert(i);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn at(&self, slots: &[usize]) -> Vec<&ModuleRecord> {
        slots.iter().filter_map(|&i| self.entries.get(i)).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ModuleRecord> {
        self.search_map
            .by_name
            .get(name)
            .and_then(|&i| self.entries.get(i))
    }

    pub fn find_by_export(&self, symbol: &str) -> Vec<&ModuleRecord> {
        self.search_map
            .by_export
            .get(symbol)
            .map(|slots| self.at(slots))
            .unwrap_or_default()
    }

    pub fn by_type(&self, file_type: FileType) -> Vec<&ModuleRecord> {
        self.search_map
            .by_type
            .get(file_type.extension())
            .map(|slots| self.at(slots))
            .unwrap_or_default()
    }

    pub fn official(&self) -> Vec<&ModuleRecord> {
        self.at(&self.search_map.by_official.official)
    }

    pub fn project(&self) -> Vec<&ModuleRecord> {
        self.at(&self.search_map.by_official.project)
    }

    /// Record whose path is exactly `path`
    pub fn record_for_path(&self, path: &Path) -> Option<&ModuleRecord> {
        self.by_path.get(path).and_then(|&i| self.entries.get(i))
    }

    /// Exported symbol names of one kind, sorted
    pub fn export_names(&self, kind: ExportKind) -> Vec<&str> {
        self.search_map
            .by_export
            .iter()
            .filter(|(symbol, slots)| {
                self.at(slots)
                    .iter()
                    .flat_map(|r| r.exports.iter())
                    .any(|e| e.kind == kind && &e.name == *symbol)
            })
            .map(|(symbol, _)| symbol.as_str())
            .collect()
    }

    /// Module names in entry order, without duplicates
    pub fn module_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, r)| self.search_map.by_name.get(&r.name) == Some(i))
            .map(|(_, r)| r.name.as_str())
            .collect()
    }

    /// Whether anything under the index's roots changed after the build
    pub fn is_stale(&self) -> bool {
        let built: SystemTime = self.build_date.into();
        self.roots
            .iter()
            .any(|root| !root.is_dir() || newer_than(root, built))
    }

    /// Write the full and compact documents into `dir`
    ///
    /// Both files are written to a temporary name first and renamed into
    /// place.
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir)?;
        let full = serde_json::to_vec_pretty(self)?;
        write_atomic(&dir.join(INDEX_FILE_NAME), &full)?;

        let compact = serde_json::to_vec(&CompactIndex::from_index(self))?;
        write_atomic(&dir.join(COMPACT_INDEX_FILE_NAME), &compact)?;

        tracing::debug!(
            "Saved module index ({} modules) to {}",
            self.entries.len(),
            dir.display()
        );
        Ok(())
    }

    /// Load a full index document; lookup maps are rebuilt from entries
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.is_file() {
            return Err(IndexError::NotFound(path.to_path_buf()));
        }
        let content = fs::read(path)?;
        let mut index: Index = serde_json::from_slice(&content)?;
        index.rebuild_maps();
        Ok(index)
    }
}

/// Whether `dir`, or anything beneath it, was modified after `time`
pub(crate) fn newer_than(dir: &Path, time: SystemTime) -> bool {
    let modified_after = |p: &Path| {
        fs::metadata(p)
            .and_then(|m| m.modified())
            .map(|m| m > time)
            .unwrap_or(false)
    };
    if modified_after(dir) {
        return true;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let path = entry.path();
        if path.is_dir() {
            newer_than(&path, time)
        } else {
            modified_after(&path)
        }
    })
}

/// Whether the index file at `index_path` is missing or older than the
/// module folder `modules_dir`
pub fn needs_update(index_path: &Path, modules_dir: &Path) -> bool {
    let mtime = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (mtime(index_path), mtime(modules_dir)) {
        (None, _) => true,
        (Some(index), Some(modules)) => modules > index,
        (Some(_), None) => false,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let tmp_path = path.with_extension("json.tmp");
    let mut tmp_file = fs::File::create(&tmp_path)?;
    tmp_file.write_all(bytes)?;
    tmp_file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExportEntry;
    use std::time::Duration;
    use tempfile::TempDir;

    fn record(name: &str, file_type: FileType, path: &str, exports: &[&str]) -> ModuleRecord {
        let mut record = ModuleRecord::new(name, file_type, path);
        record.exports = exports
            .iter()
            .map(|e| ExportEntry::new(*e, ExportKind::Var))
            .collect();
        record
    }

    fn sample() -> Index {
        Index::new(
            Structure::Mixed,
            vec![],
            vec![
                record("Button", FileType::Cmod, "/m/Button.cmod", &["Primary", "Shared"]),
                record("Util", FileType::Cjmod, "/m/Util.cjmod", &["Shared"]),
                record("Button", FileType::Chtl, "/m/Button.chtl", &[]).with_official(true),
            ],
        )
    }

    #[test]
    fn test_name_map_first_entry_wins() {
        let index = sample();
        let found = index.find_by_name("Button").unwrap();
        assert_eq!(found.path, PathBuf::from("/m/Button.cmod"));
        assert_eq!(index.module_names(), vec!["Button", "Util"]);
    }

    #[test]
    fn test_export_and_type_maps() {
        let index = sample();
        assert_eq!(index.find_by_export("Shared").len(), 2);
        assert_eq!(index.find_by_export("Primary").len(), 1);
        assert!(index.find_by_export("Nope").is_empty());
        assert_eq!(index.by_type(FileType::Cjmod).len(), 1);
        assert_eq!(index.official().len(), 1);
        assert_eq!(index.project().len(), 2);
    }

    #[test]
    fn test_export_names_by_kind() {
        let mut index = sample();
        index.entries[1].exports[0].kind = ExportKind::Function;
        index.rebuild_maps();
        assert_eq!(index.export_names(ExportKind::Var), vec!["Primary", "Shared"]);
        assert_eq!(index.export_names(ExportKind::Function), vec!["Shared"]);
        assert!(index.export_names(ExportKind::Class).is_empty());
    }

    #[test]
    fn test_record_for_path() {
        let index = sample();
        let record = index.record_for_path(Path::new("/m/Util.cjmod")).unwrap();
        assert_eq!(record.name, "Util");
        assert!(index.record_for_path(Path::new("/m/None.cmod")).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let index = sample();
        index.save(temp.path()).unwrap();

        assert!(temp.path().join(INDEX_FILE_NAME).is_file());
        assert!(temp.path().join(COMPACT_INDEX_FILE_NAME).is_file());

        let loaded = Index::load(&temp.path().join(INDEX_FILE_NAME)).unwrap();
        assert_eq!(loaded, index);
        assert!(loaded.record_for_path(Path::new("/m/Button.chtl")).is_some());
    }

    #[test]
    fn test_load_legacy_field_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(INDEX_FILE_NAME);
        fs::write(
            &path,
            r#"{
                "version": "1.0.0",
                "timestamp": "2024-01-01T00:00:00Z",
                "structure": "classified",
                "entries": [
                    {"moduleName": "Box", "moduleType": "cmod", "filePath": "/m/Box.cmod",
                     "isOfficial": true, "dependencies": [], "exports": [],
                     "lastModified": 0, "fileSize": 12}
                ]
            }"#,
        )
        .unwrap();

        let index = Index::load(&path).unwrap();
        assert_eq!(index.structure, Structure::Classified);
        assert_eq!(index.find_by_name("Box").unwrap().size_bytes, 12);
        assert_eq!(index.official().len(), 1);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(INDEX_FILE_NAME);
        assert!(matches!(Index::load(&path), Err(IndexError::NotFound(_))));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Index::load(&path), Err(IndexError::Json(_))));
    }

    #[test]
    fn test_staleness_follows_mtime() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("Box.cmod");
        fs::write(&file, "").unwrap();

        let index = Index::new(Structure::Mixed, vec![temp.path().to_path_buf()], vec![]);
        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(past)
            .unwrap();
        fs::File::open(temp.path()).unwrap().set_modified(past).unwrap();
        assert!(!index.is_stale());

        let future = SystemTime::now() + Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(future)
            .unwrap();
        assert!(index.is_stale());
    }

    #[test]
    fn test_needs_update() {
        let temp = TempDir::new().unwrap();
        let modules = temp.path().join("module");
        fs::create_dir_all(&modules).unwrap();
        let index_path = temp.path().join(INDEX_FILE_NAME);
        assert!(needs_update(&index_path, &modules));

        fs::write(&index_path, "{}").unwrap();
        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::open(&modules).unwrap().set_modified(past).unwrap();
        assert!(!needs_update(&index_path, &modules));
    }
}
