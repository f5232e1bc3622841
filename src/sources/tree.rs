//! Module-tree scanner.
//!
//! Walks a kernel-version-qualified directory (typically
//! `/lib/modules/<release>`) and enumerates module files, compressed or not.
//! The walk is symlink-loop safe: each directory is visited at most once,
//! keyed on its canonicalized path. Unreadable subdirectories are reported
//! as warnings and skipped, never fatal.

use crate::models::{SourceWarning, WarningKind};
use crate::sources::normalize_name;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Recognized module-file suffixes, compressed variants first so that
/// `.ko.zst` is not mistaken for a `.ko` with an odd base name.
pub const MODULE_SUFFIXES: &[&str] = &[".ko.zst", ".ko.xz", ".ko.gz", ".ko"];

/// One module file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFile {
    /// Normalized module name (suffix stripped, hyphens as underscores).
    pub name: String,
    pub path: PathBuf,
    /// True when the base name matches a currently loaded module; such
    /// files are on disk *and* loaded, not "unloaded".
    pub loaded: bool,
}

/// Extract the module name from a file name, if it carries a known suffix.
pub fn module_name_from_file(file_name: &str) -> Option<&str> {
    MODULE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
}

/// Recursively enumerate module files under `root`.
///
/// `loaded` holds the normalized names of currently loaded modules and only
/// affects the `loaded` classification flag; matching files are still
/// returned so their paths can enrich live records.
///
/// Results are sorted by name, then path, for deterministic output.
pub fn scan_module_tree(
    root: &Path,
    loaded: &HashSet<String>,
) -> (Vec<ModuleFile>, Vec<SourceWarning>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        // Cycle guard: a symlinked directory resolves to a path we have
        // already walked.
        match fs::canonicalize(&dir) {
            Ok(resolved) => {
                if !visited.insert(resolved) {
                    continue;
                }
            }
            Err(err) => {
                warnings.push(SourceWarning::new(
                    WarningKind::SourceUnavailable,
                    format!("cannot resolve directory {}: {}", dir.display(), err),
                ));
                continue;
            }
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("skipping unreadable directory {}: {}", dir.display(), err);
                warnings.push(SourceWarning::new(
                    WarningKind::SourceUnavailable,
                    format!("unreadable directory {}: {}", dir.display(), err),
                ));
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warnings.push(SourceWarning::new(
                        WarningKind::SourceUnavailable,
                        format!("error listing {}: {}", dir.display(), err),
                    ));
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(base) = module_name_from_file(file_name) {
                let name = normalize_name(base);
                let is_loaded = loaded.contains(&name);
                files.push(ModuleFile {
                    name,
                    path,
                    loaded: is_loaded,
                });
            }
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
    (files, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        File::create(path).unwrap();
    }

    #[test]
    fn test_module_name_from_file() {
        assert_eq!(module_name_from_file("ahci.ko"), Some("ahci"));
        assert_eq!(module_name_from_file("ext4.ko.zst"), Some("ext4"));
        assert_eq!(module_name_from_file("btrfs.ko.xz"), Some("btrfs"));
        assert_eq!(module_name_from_file("loop.ko.gz"), Some("loop"));
        assert_eq!(module_name_from_file("README"), None);
        assert_eq!(module_name_from_file("notes.txt"), None);
    }

    #[test]
    fn test_scan_finds_nested_modules() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("kernel/fs/ext4");
        fs::create_dir_all(&nested).unwrap();
        touch(&nested.join("ext4.ko.zst"));
        touch(&tmp.path().join("ahci.ko"));
        touch(&tmp.path().join("modules.builtin"));

        let (files, warnings) = scan_module_tree(tmp.path(), &HashSet::new());
        assert!(warnings.is_empty());
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ahci", "ext4"]);
        assert!(files.iter().all(|f| !f.loaded));
    }

    #[test]
    fn test_loaded_modules_are_flagged_not_dropped() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("ahci.ko"));
        touch(&tmp.path().join("loop.ko"));

        let loaded: HashSet<String> = ["ahci".to_string()].into_iter().collect();
        let (files, _) = scan_module_tree(tmp.path(), &loaded);
        assert_eq!(files.len(), 2);
        assert!(files.iter().find(|f| f.name == "ahci").unwrap().loaded);
        assert!(!files.iter().find(|f| f.name == "loop").unwrap().loaded);
    }

    #[test]
    fn test_hyphenated_file_matches_underscored_loaded_name() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("usb-storage.ko"));

        let loaded: HashSet<String> = ["usb_storage".to_string()].into_iter().collect();
        let (files, _) = scan_module_tree(tmp.path(), &loaded);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "usb_storage");
        assert!(files[0].loaded);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_terminates() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("drivers");
        fs::create_dir(&sub).unwrap();
        touch(&sub.join("ahci.ko"));
        // drivers/loop -> tmp root, forming a cycle
        std::os::unix::fs::symlink(tmp.path(), sub.join("loop")).unwrap();

        let (files, _) = scan_module_tree(tmp.path(), &HashSet::new());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "ahci");
    }

    #[test]
    fn test_missing_root_yields_warning_not_panic() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("nope");
        let (files, warnings) = scan_module_tree(&gone, &HashSet::new());
        assert!(files.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::SourceUnavailable);
    }
}
