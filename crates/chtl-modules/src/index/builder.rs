//! Index construction
//!
//! Walks module folders according to their layout and scans every module
//! file and directory module found. Entries are visited in sorted order, so
//! two builds over the same tree produce the same maps.

use super::Index;
use crate::error::IndexError;
use crate::layout::{self, Structure};
use crate::record::{module_name_of, FileType, Location, ModuleRecord};
use crate::scan;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Builds an [`Index`] from one or more module folders
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    official: bool,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every record as official (bundled with the engine)
    pub fn official(mut self, official: bool) -> Self {
        self.official = official;
        self
    }

    /// Build an index over a single module folder
    pub fn build(&self, root: &Path) -> Result<Index, IndexError> {
        self.build_many(&[root.to_path_buf()])
    }

    /// Build one index over several module folders, in order
    ///
    /// The recorded structure is that of the first folder. The build date is
    /// taken before the walk, so a file changed mid-build leaves the index
    /// stale.
    pub fn build_many(&self, roots: &[PathBuf]) -> Result<Index, IndexError> {
        if let Some(missing) = roots.iter().find(|r| !r.is_dir()) {
            return Err(IndexError::MissingRoot(missing.clone()));
        }

        let start = Instant::now();
        let started_at = Utc::now();
        let structure = roots
            .first()
            .map(|r| layout::detect_structure(r))
            .unwrap_or_default();

        let mut entries = Vec::new();
        for root in roots {
            info!("Building module index for {}", root.display());
            self.walk_root(root, &mut entries)?;
        }

        let index = Index::new(structure, roots.to_vec(), entries).with_build_date(started_at);
        info!(
            "Module index built: {} modules, {} exports ({:?})",
            index.len(),
            index.search_map.by_export.len(),
            start.elapsed()
        );
        Ok(index)
    }

    fn walk_root(&self, root: &Path, entries: &mut Vec<ModuleRecord>) -> Result<(), IndexError> {
        let structure = layout::detect_structure(root);
        debug!("{} has {} structure", root.display(), structure);

        match structure {
            Structure::Classified => {
                if let Some(dir) = layout::cmod_dir(root) {
                    self.scan_folder(&dir, &[FileType::Cmod, FileType::Chtl], FileType::Cmod, entries)?;
                }
                if let Some(dir) = layout::cjmod_dir(root) {
                    self.scan_folder(&dir, &[FileType::Cjmod], FileType::Cjmod, entries)?;
                }
            }
            Structure::Mixed => {
                self.scan_folder(
                    root,
                    &[FileType::Cmod, FileType::Chtl, FileType::Cjmod],
                    FileType::Cmod,
                    entries,
                )?;
            }
        }
        Ok(())
    }

    /// Scan the direct children of `dir`
    fn scan_folder(
        &self,
        dir: &Path,
        accepted: &[FileType],
        directory_type: FileType,
        entries: &mut Vec<ModuleRecord>,
    ) -> Result<(), IndexError> {
        let mut children: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        children.sort();

        for path in children {
            if path.is_file() {
                let Some(file_type) = FileType::of_path(&path).filter(|t| accepted.contains(t)) else {
                    continue;
                };
                entries.push(self.scan_file(&path, file_type));
            } else if layout::is_directory_module(&path) {
                let file_type = directory_module_type(&path, directory_type);
                entries.push(self.scan_directory(&path, file_type));
            }
        }
        Ok(())
    }

    fn scan_file(&self, path: &Path, file_type: FileType) -> ModuleRecord {
        scan::scan_file(path, file_type, self.official).unwrap_or_else(|e| {
            warn!("Failed to scan module file {}: {}", path.display(), e);
            ModuleRecord::new(module_name_of(path), file_type, path)
                .with_fs_metadata()
                .with_official(self.official)
        })
    }

    fn scan_directory(&self, path: &Path, file_type: FileType) -> ModuleRecord {
        scan::scan_directory_module(path, file_type, self.official).unwrap_or_else(|e| {
            warn!("Failed to scan directory module {}: {}", path.display(), e);
            let mut record = ModuleRecord::new(module_name_of(path), file_type, path)
                .with_official(self.official);
            record.location = Location::Directory;
            record
        })
    }
}

/// File type of a directory module found in a folder holding `default`
/// modules: a module carrying only a CJMOD part is an extension module
fn directory_module_type(dir: &Path, default: FileType) -> FileType {
    if layout::cjmod_dir(dir).is_some() && layout::cmod_dir(dir).is_none() {
        FileType::Cjmod
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModuleKind;
    use tempfile::TempDir;

    #[test]
    fn test_mixed_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("Button.cmod"), "[Export] { Primary : .btn { } }").unwrap();
        fs::write(root.join("Util.cjmod"), "#define UTIL_MAX 4\n").unwrap();
        fs::write(root.join("page.chtl"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let index = IndexBuilder::new().build(root).unwrap();
        assert_eq!(index.structure, Structure::Mixed);
        let names: Vec<_> = index.entries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Button", "Util", "page"]);
        assert_eq!(index.find_by_export("UTIL_MAX")[0].name, "Util");
    }

    #[test]
    fn test_build_date_precedes_walk_end() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("module");
        fs::create_dir_all(&root).unwrap();
        let file = root.join("Box.cmod");
        fs::write(&file, "").unwrap();
        let past = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        fs::File::options().write(true).open(&file).unwrap().set_modified(past).unwrap();
        fs::File::open(&root).unwrap().set_modified(past).unwrap();

        let before = Utc::now();
        let index = IndexBuilder::new().build(&root).unwrap();
        let finished = Utc::now();
        assert!(before <= index.build_date && index.build_date <= finished);
        assert!(!index.is_stale());

        // A write landing as the walk ends is newer than the build date
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(finished.into())
            .unwrap();
        if finished > index.build_date {
            assert!(index.is_stale());
        }
    }

    #[test]
    fn test_classified_root_ignores_misplaced_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("CMOD")).unwrap();
        fs::create_dir_all(root.join("CJMOD")).unwrap();
        fs::write(root.join("CMOD").join("Box.cmod"), "").unwrap();
        fs::write(root.join("CMOD").join("Stray.cjmod"), "").unwrap();
        fs::write(root.join("CJMOD").join("Ext.cjmod"), "").unwrap();
        fs::write(root.join("Loose.cmod"), "").unwrap();

        let index = IndexBuilder::new().official(true).build(root).unwrap();
        assert_eq!(index.structure, Structure::Classified);
        let names: Vec<_> = index.entries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Box", "Ext"]);
        assert!(index.entries.iter().all(|r| r.official));
    }

    #[test]
    fn test_directory_modules() {
        let temp = TempDir::new().unwrap();
        let unit = temp.path().join("Chtholly");
        fs::create_dir_all(unit.join("info")).unwrap();
        fs::create_dir_all(unit.join("CMOD")).unwrap();
        fs::create_dir_all(unit.join("CJMOD")).unwrap();
        fs::write(unit.join("info").join("Chtholly.chtl"), "[Info] {}").unwrap();
        fs::create_dir_all(temp.path().join("not-a-module")).unwrap();

        let index = IndexBuilder::new().build(temp.path()).unwrap();
        assert_eq!(index.len(), 1);
        let record = &index.entries[0];
        assert_eq!(record.location, Location::Directory);
        assert_eq!(record.kind, ModuleKind::Hybrid);
        assert_eq!(record.file_type, FileType::Cmod);
    }

    #[test]
    fn test_unreadable_file_still_listed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Packed.cmod"), [0xff, 0xfe, 0x00]).unwrap();

        let index = IndexBuilder::new().build(temp.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.entries[0].exports.is_empty());
        assert_eq!(index.entries[0].size_bytes, 3);
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            IndexBuilder::new().build(&missing),
            Err(IndexError::MissingRoot(p)) if p == missing
        ));
    }
}
