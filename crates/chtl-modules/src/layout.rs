//! On-disk layout conventions
//!
//! A module folder is either *mixed* (CMOD and CJMOD files side by side)
//! or *classified* (separate `CMOD/` and `CJMOD/` subfolders). A single
//! directory-form module is *hybrid* when it carries both subfolders itself.
//!
//! ```text
//! module/                 module/
//! ├── Button.cmod         ├── CMOD/
//! ├── Box.chtl            │   └── Button.cmod
//! └── Util.cjmod          └── CJMOD/
//!      (mixed)                └── Util.cjmod   (classified)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Accepted spellings of the module-root folder
pub const MODULE_DIR_NAMES: [&str; 4] = ["module", "modules", "Module", "Modules"];

/// Accepted spellings of the CMOD type folder
pub const CMOD_DIR_NAMES: [&str; 3] = ["CMOD", "Cmod", "cmod"];

/// Accepted spellings of the CJMOD type folder
pub const CJMOD_DIR_NAMES: [&str; 3] = ["CJMOD", "CJmod", "cjmod"];

/// Folder holding a directory module's manifest
pub const INFO_DIR: &str = "info";

/// Folder holding a directory module's sources
pub const SRC_DIR: &str = "src";

/// Layout of a module folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Structure {
    Classified,
    #[default]
    Mixed,
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structure::Classified => f.write_str("classified"),
            Structure::Mixed => f.write_str("mixed"),
        }
    }
}

/// First existing subfolder of `dir` among `names`
fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.is_dir())
}

/// Every existing subfolder of `dir` among `names`, in `names` order
fn all_existing(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| dir.join(n)).filter(|p| p.is_dir()).collect()
}

/// The CMOD type folder under `dir`, if any
pub fn cmod_dir(dir: &Path) -> Option<PathBuf> {
    first_existing(dir, &CMOD_DIR_NAMES)
}

/// The CJMOD type folder under `dir`, if any
pub fn cjmod_dir(dir: &Path) -> Option<PathBuf> {
    first_existing(dir, &CJMOD_DIR_NAMES)
}

/// Every module-root folder under `base`
pub fn module_dirs(base: &Path) -> Vec<PathBuf> {
    all_existing(base, &MODULE_DIR_NAMES)
}

/// Every type folder under a module folder: CMOD spellings, then CJMOD
pub fn type_dirs(module_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = all_existing(module_dir, &CMOD_DIR_NAMES);
    dirs.extend(all_existing(module_dir, &CJMOD_DIR_NAMES));
    dirs
}

/// Classify a module folder
pub fn detect_structure(module_dir: &Path) -> Structure {
    if cmod_dir(module_dir).is_some() && cjmod_dir(module_dir).is_some() {
        Structure::Classified
    } else {
        Structure::Mixed
    }
}

/// Whether a directory-form module bundles both kinds
pub fn is_hybrid(module_unit: &Path) -> bool {
    detect_structure(module_unit) == Structure::Classified
}

/// Manifest path of a directory-form module: `<dir>/info/<Name>.chtl`
pub fn info_manifest(module_unit: &Path) -> Option<PathBuf> {
    let name = module_unit.file_name()?;
    let manifest = module_unit
        .join(INFO_DIR)
        .join(format!("{}.chtl", name.to_string_lossy()));
    manifest.is_file().then_some(manifest)
}

/// Whether `dir` is a directory-form module
pub fn is_directory_module(dir: &Path) -> bool {
    dir.is_dir() && info_manifest(dir).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classified_needs_both_kinds() {
        let temp = TempDir::new().unwrap();
        let module = temp.path().join("module");
        fs::create_dir_all(module.join("Cmod")).unwrap();
        assert_eq!(detect_structure(&module), Structure::Mixed);

        fs::create_dir_all(module.join("cjmod")).unwrap();
        assert_eq!(detect_structure(&module), Structure::Classified);
    }

    #[test]
    fn test_files_do_not_count_as_type_dirs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("CMOD"), "").unwrap();
        fs::create_dir_all(temp.path().join("CJMOD")).unwrap();
        assert_eq!(detect_structure(temp.path()), Structure::Mixed);
    }

    #[test]
    fn test_hybrid_module() {
        let temp = TempDir::new().unwrap();
        let unit = temp.path().join("Chtholly");
        fs::create_dir_all(unit.join("CMOD")).unwrap();
        assert!(!is_hybrid(&unit));
        fs::create_dir_all(unit.join("CJMOD")).unwrap();
        assert!(is_hybrid(&unit));
    }

    #[test]
    fn test_info_manifest() {
        let temp = TempDir::new().unwrap();
        let unit = temp.path().join("Yuigahama");
        fs::create_dir_all(unit.join("info")).unwrap();
        assert!(!is_directory_module(&unit));

        fs::write(unit.join("info").join("Yuigahama.chtl"), "[Info] {}").unwrap();
        assert!(is_directory_module(&unit));
        assert_eq!(
            info_manifest(&unit),
            Some(unit.join("info").join("Yuigahama.chtl"))
        );
    }

    #[test]
    fn test_type_dirs_order() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("CJMOD")).unwrap();
        fs::create_dir_all(temp.path().join("CMOD")).unwrap();

        let dirs = type_dirs(temp.path());
        assert_eq!(dirs.len(), 2);
        assert!(dirs[0].ends_with("CMOD"));
        assert!(dirs[1].ends_with("CJMOD"));
    }
}
