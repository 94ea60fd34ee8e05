//! Heuristic module scanning
//!
//! Exports, dependencies and metadata are pulled out of module text with
//! regular expressions, not a parser. Anything the patterns do not
//! recognize is silently left out, so exports may be under-reported.

use crate::layout;
use crate::origin::balanced_body;
use crate::record::{
    epoch_millis, module_name_of, ExportEntry, ExportKind, FileType, Location, ModuleKind,
    ModuleRecord,
};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extracts exported symbols from module text
pub trait ExportExtractor: Send + Sync {
    fn extract_exports(&self, text: &str) -> Vec<ExportEntry>;
}

/// Export scanner for CMOD and CHTL sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceModuleScanner;

/// Export scanner for CJMOD (C++) sources
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionModuleScanner;

/// The scanner for a module file type
pub fn extractor_for(file_type: FileType) -> Option<&'static dyn ExportExtractor> {
    match file_type {
        FileType::Chtl | FileType::Cmod => Some(&SourceModuleScanner),
        FileType::Cjmod => Some(&ExtensionModuleScanner),
        _ => None,
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("scanner pattern")
}

static EXPORT_BLOCK_OPEN: Lazy<Regex> = Lazy::new(|| pattern(r"\[Export\]\s*\{"));

static TAGGED_EXPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    pattern(r"^@(Template|Custom|Element|Style|Script|Var)\s+([\w-]+)\s*:\s*(.+)$")
});

static PLAIN_EXPORT_LINE: Lazy<Regex> = Lazy::new(|| pattern(r"^([\w-]+)\s*:\s*(.+)$"));

static INLINE_COMMENT: Lazy<Regex> = Lazy::new(|| pattern(r"//\s*(.+)$"));

static IMPLICIT_DEFINITION: Lazy<Regex> =
    Lazy::new(|| pattern(r"\[(Template|Custom|Style|Script)\]\s*@(\w+)\s+(\w+)\s*\{"));

static EXTERN_C_BLOCK: Lazy<Regex> = Lazy::new(|| pattern(r#"extern\s+"C"\s*\{([^}]*)\}"#));

static C_FUNCTION: Lazy<Regex> =
    Lazy::new(|| pattern(r"(\w+\s*\*?\s*)\s+(\w+)\s*\(([^)]*)\)\s*;?"));

static CLASS_DECL: Lazy<Regex> = Lazy::new(|| pattern(r"class\s+(\w+)[^{;]*\{"));

static NAMESPACE_DECL: Lazy<Regex> = Lazy::new(|| pattern(r"namespace\s+(\w+)\s*\{"));

static MACRO_DEFINE: Lazy<Regex> = Lazy::new(|| pattern(r"#define\s+(\w+)(?:\([^)]*\))?(?:\s|$)"));

static IMPORT_DEPENDENCY: Lazy<Regex> =
    Lazy::new(|| pattern(r#"\[Import\]\s*@\w+\s+from\s+['"]([^'"]+)['"]"#));

static VERSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r#"(?i)version\s*[:=]\s*['"]([^'"]+)['"]"#),
        pattern(r"(?i)@version\s+(\S+)"),
    ]
});

static DESCRIPTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        pattern(r#"(?i)description\s*[:=]\s*['"]([^'"]+)['"]"#),
        pattern(r"(?i)@description\s+(.+)"),
        pattern(r"/\*\*\s*\n\s*\*\s*(.+?)\s*\n\s*\*"),
    ]
});

/// `key: value` or `key = "value";` line of an info manifest
fn manifest_field(key: &str) -> Regex {
    RegexBuilder::new(&format!(
        r#"^\s*{}\s*[:=]\s*"?([^";\r\n]*[^";\s])"?\s*;?\s*$"#,
        key
    ))
    .case_insensitive(true)
    .multi_line(true)
    .build()
    .expect("manifest field pattern")
}

static MANIFEST_NAME: Lazy<Regex> = Lazy::new(|| manifest_field("name"));
static MANIFEST_VERSION: Lazy<Regex> = Lazy::new(|| manifest_field("version"));
static MANIFEST_DESCRIPTION: Lazy<Regex> = Lazy::new(|| manifest_field("description"));
static MANIFEST_AUTHOR: Lazy<Regex> = Lazy::new(|| manifest_field("author"));

impl SourceModuleScanner {
    /// Parse one line of an `[Export]` block
    pub fn parse_export_line(line: &str) -> Option<ExportEntry> {
        let description = INLINE_COMMENT
            .captures(line)
            .map(|c| c[1].trim().to_string());
        let body = match INLINE_COMMENT.find(line) {
            Some(m) => line[..m.start()].trim_end(),
            None => line,
        };

        let (tag, name, signature) = if let Some(caps) = TAGGED_EXPORT_LINE.captures(body) {
            (Some(caps[1].to_string()), caps[2].to_string(), caps[3].trim().to_string())
        } else {
            let caps = PLAIN_EXPORT_LINE.captures(body)?;
            (None, caps[1].to_string(), caps[2].trim().to_string())
        };

        let kind = match tag {
            Some(tag) => ExportKind::from_type_hint(&tag),
            None => infer_kind_from_signature(&signature),
        };

        let mut entry = ExportEntry::new(name, kind).with_signature(signature);
        entry.description = description;
        Some(entry)
    }

    fn implicit_exports(text: &str) -> Vec<ExportEntry> {
        IMPLICIT_DEFINITION
            .captures_iter(text)
            .map(|caps| {
                let hint = &caps[2];
                let name = &caps[3];
                ExportEntry::new(name, ExportKind::from_type_hint(hint))
                    .with_signature(format!("{} {}", hint, name))
                    .with_description(format!("implicit {} export", hint))
            })
            .collect()
    }
}

fn infer_kind_from_signature(signature: &str) -> ExportKind {
    if signature.contains("=>") || signature.contains("function") {
        ExportKind::Function
    } else if signature.contains("class") {
        ExportKind::Class
    } else if signature.contains("interface") {
        ExportKind::Interface
    } else if signature.contains('{') && signature.contains('}') {
        ExportKind::Style
    } else {
        ExportKind::Var
    }
}

impl ExportExtractor for SourceModuleScanner {
    fn extract_exports(&self, text: &str) -> Vec<ExportEntry> {
        let explicit: Vec<ExportEntry> = EXPORT_BLOCK_OPEN
            .find_iter(text)
            .filter_map(|m| balanced_body(text, m.end() - 1))
            .flat_map(|body| {
                body.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with("//"))
                    .filter_map(Self::parse_export_line)
                    .collect::<Vec<_>>()
            })
            .collect();

        if explicit.is_empty() {
            Self::implicit_exports(text)
        } else {
            explicit
        }
    }
}

impl ExtensionModuleScanner {
    /// Whether `class_name` has a factory-looking function in `text`
    fn has_factory(text: &str, class_name: &str) -> bool {
        let name = regex::escape(class_name);
        [
            format!("create{}", name),
            format!("new{}", name),
            format!(r"{}\s*\*\s*\w+\s*\(", name),
        ]
        .iter()
        .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
        .any(|re| re.is_match(text))
    }
}

fn parse_parameters(params: &str) -> Vec<String> {
    params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "void")
        .map(str::to_string)
        .collect()
}

impl ExportExtractor for ExtensionModuleScanner {
    fn extract_exports(&self, text: &str) -> Vec<ExportEntry> {
        let mut exports = Vec::new();

        for block in EXTERN_C_BLOCK.captures_iter(text) {
            for caps in C_FUNCTION.captures_iter(&block[1]) {
                let return_type = caps[1].trim().to_string();
                let name = caps[2].trim().to_string();
                let params = caps[3].trim();
                let mut entry = ExportEntry::new(name.clone(), ExportKind::Function)
                    .with_signature(format!("{} {}({})", return_type, name, params))
                    .with_description("extension function");
                entry.parameters = parse_parameters(params);
                entry.return_type = Some(return_type);
                exports.push(entry);
            }
        }

        for caps in CLASS_DECL.captures_iter(text) {
            let class_name = &caps[1];
            if Self::has_factory(text, class_name) {
                exports.push(
                    ExportEntry::new(class_name, ExportKind::Class)
                        .with_signature(format!("class {}", class_name))
                        .with_description("extension class"),
                );
            }
        }

        for caps in NAMESPACE_DECL.captures_iter(text) {
            let ns = &caps[1];
            exports.push(
                ExportEntry::new(ns, ExportKind::Interface)
                    .with_signature(format!("namespace {}", ns))
                    .with_description("extension namespace"),
            );
        }

        for caps in MACRO_DEFINE.captures_iter(text) {
            let macro_name = &caps[1];
            if macro_name.to_uppercase() == macro_name && !macro_name.starts_with('_') {
                exports.push(
                    ExportEntry::new(macro_name, ExportKind::Var)
                        .with_signature(format!("#define {}", macro_name))
                        .with_description("extension macro"),
                );
            }
        }

        exports
    }
}

/// `[Import] @Kind from "x"` targets, deduplicated in first-seen order
pub fn extract_dependencies(text: &str) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    for caps in IMPORT_DEPENDENCY.captures_iter(text) {
        let dep = &caps[1];
        if !deps.iter().any(|d| d == dep) {
            deps.push(dep.to_string());
        }
    }
    deps
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].trim().to_string())
}

pub fn extract_version(text: &str) -> Option<String> {
    first_capture(&VERSION_PATTERNS, text)
}

pub fn extract_description(text: &str) -> Option<String> {
    first_capture(&DESCRIPTION_PATTERNS, text)
}

/// Fields of a directory module's `info/<Name>.chtl`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub exports: Vec<ExportEntry>,
}

pub fn parse_info_manifest(text: &str) -> InfoManifest {
    let field = |re: &Regex| re.captures(text).map(|c| c[1].trim().to_string());
    InfoManifest {
        name: field(&MANIFEST_NAME),
        version: field(&MANIFEST_VERSION).or_else(|| extract_version(text)),
        description: field(&MANIFEST_DESCRIPTION).or_else(|| extract_description(text)),
        author: field(&MANIFEST_AUTHOR),
        exports: SourceModuleScanner.extract_exports(text),
    }
}

/// Scan a single module file into a record
///
/// Fails only when the file cannot be read as text.
pub fn scan_file(path: &Path, file_type: FileType, official: bool) -> io::Result<ModuleRecord> {
    let text = fs::read_to_string(path)?;
    let mut record = ModuleRecord::new(module_name_of(path), file_type, path)
        .with_fs_metadata()
        .with_official(official);

    if let Some(extractor) = extractor_for(file_type) {
        record.exports = extractor.extract_exports(&text);
    }
    record.dependencies = extract_dependencies(&text);
    record.version = extract_version(&text);
    record.description = extract_description(&text);
    Ok(record)
}

/// Files under `dir`, recursively, sorted by relative path
fn walk_sorted(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            files.extend(walk_sorted(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

/// SHA-256 over the sorted relative names and contents of every file
pub fn directory_hash(dir: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    for file in walk_sorted(dir)? {
        let relative = file.strip_prefix(dir).unwrap_or(&file);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(fs::read(&file)?);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Scan a directory-form module (`<Name>/info/<Name>.chtl`)
pub fn scan_directory_module(
    dir: &Path,
    file_type: FileType,
    official: bool,
) -> io::Result<ModuleRecord> {
    let manifest_path = layout::info_manifest(dir).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no info manifest in {}", dir.display()),
        )
    })?;
    let manifest_text = fs::read_to_string(&manifest_path)?;
    let manifest = parse_info_manifest(&manifest_text);

    let files = walk_sorted(dir)?;
    let mut record = ModuleRecord::new(
        manifest.name.clone().unwrap_or_else(|| module_name_of(dir)),
        file_type,
        dir,
    )
    .with_official(official);
    record.location = Location::Directory;
    if layout::is_hybrid(dir) {
        record.kind = ModuleKind::Hybrid;
    }
    record.version = manifest.version;
    record.description = manifest.description;
    record.exports = manifest.exports;

    let mut newest = 0;
    for file in &files {
        let meta = fs::metadata(file)?;
        record.size_bytes += meta.len();
        newest = newest.max(meta.modified().map(epoch_millis).unwrap_or(0));
        if FileType::of_path(file) == Some(FileType::Chtl) {
            let text = fs::read_to_string(file)?;
            for dep in extract_dependencies(&text) {
                if !record.dependencies.contains(&dep) {
                    record.dependencies.push(dep);
                }
            }
        }
    }
    record.last_modified = newest;
    record.hash = Some(directory_hash(dir)?);
    Ok(record)
}
