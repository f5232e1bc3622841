//! Builtin-module index.
//!
//! Two kernel-shipped inputs describe compiled-in modules:
//! - `modules.builtin`: one module per line, usually as a kernel-relative
//!   path like `kernel/fs/ext4/ext4.ko`
//! - `modules.builtin.modinfo`: consecutive NUL-terminated `key=value`
//!   strings with no record boundaries, where each key is the owning module
//!   name joined to a field name with a dot (`ext4.description=...`)
//!
//! The blob carries no explicit delimiter between module name and field, so
//! keys are associated back to their module by longest-prefix match against
//! the known name set. Unresolvable pairs are discarded silently.

use crate::sources::normalize_name;
use std::collections::{BTreeSet, HashMap};

/// Name -> description lookup for builtin modules.
#[derive(Debug, Default)]
pub struct BuiltinIndex {
    /// Canonical (normalized) builtin names, kept sorted for stable output.
    names: BTreeSet<String>,
    descriptions: HashMap<String, String>,
}

impl BuiltinIndex {
    /// An index with no entries; used when modules.builtin is unavailable.
    pub fn empty() -> Self {
        BuiltinIndex::default()
    }

    /// Parse the builtin manifest and, when present, the packed metadata
    /// blob. A missing blob degrades to a name-only index.
    pub fn parse(manifest: &str, blob: Option<&[u8]>) -> Self {
        let mut index = BuiltinIndex::default();

        for line in manifest.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // "kernel/fs/ext4/ext4.ko" and bare "ext4" are both accepted.
            let base = line.rsplit('/').next().unwrap_or(line);
            let name = base.strip_suffix(".ko").unwrap_or(base);
            index.names.insert(normalize_name(name));
        }

        if let Some(blob) = blob {
            index.absorb_blob(blob);
        }

        index
    }

    /// Walk the NUL-terminated `key=value` entries and attach description
    /// values to their owning modules.
    fn absorb_blob(&mut self, blob: &[u8]) {
        for chunk in blob.split(|&b| b == 0) {
            if chunk.is_empty() {
                continue;
            }
            let entry = String::from_utf8_lossy(chunk);
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            let Some((owner, field)) = self.resolve_owner(key) else {
                continue;
            };
            if field == "description" {
                self.descriptions
                    .entry(owner)
                    .or_insert_with(|| value.to_string());
            }
        }
    }

    /// Longest-prefix match of a blob key against the known name set.
    ///
    /// Module names never contain dots, so scanning dot positions from the
    /// right yields the longest candidate first. Returns the owning module
    /// name and the remaining field name, or `None` for unassignable keys.
    fn resolve_owner(&self, key: &str) -> Option<(String, String)> {
        let normalized = normalize_name(key);
        for (pos, _) in normalized.rmatch_indices('.') {
            let candidate = &normalized[..pos];
            if self.names.contains(candidate) {
                return Some((candidate.to_string(), normalized[pos + 1..].to_string()));
            }
        }
        None
    }

    /// Builtin names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_name(name))
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.descriptions
            .get(&normalize_name(name))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_paths_reduce_to_names() {
        let index = BuiltinIndex::parse("kernel/fs/ext4/ext4.ko\nkernel/lib/crc32.ko\n", None);
        assert_eq!(index.len(), 2);
        assert!(index.contains("ext4"));
        assert!(index.contains("crc32"));
        assert!(index.description("ext4").is_none());
    }

    #[test]
    fn test_blob_description_association() {
        let blob = b"ext4.description=Fourth extended filesystem\0ext4.license=GPL\0";
        let index = BuiltinIndex::parse("ext4\n", Some(blob));
        assert_eq!(
            index.description("ext4"),
            Some("Fourth extended filesystem")
        );
    }

    #[test]
    fn test_longest_prefix_wins_on_shared_prefix() {
        // "snd" and "snd.pcm" style ambiguity: the key must bind to the
        // longest known name, not the first prefix that happens to match.
        let blob = b"snd.pcm.description=PCM layer\0snd.description=Sound core\0";
        let index = BuiltinIndex::parse("snd\nsnd.pcm\n", Some(blob));
        // Dots cannot occur in real module names, but the resolver must
        // still prefer the longest registered prefix.
        assert_eq!(index.description("snd"), Some("Sound core"));
    }

    #[test]
    fn test_hyphen_underscore_equivalence() {
        let blob = b"usb_storage.description=USB Mass Storage\0";
        let index = BuiltinIndex::parse("kernel/drivers/usb/storage/usb-storage.ko\n", Some(blob));
        assert!(index.contains("usb-storage"));
        assert!(index.contains("usb_storage"));
        assert_eq!(index.description("usb-storage"), Some("USB Mass Storage"));
    }

    #[test]
    fn test_unassignable_keys_discarded_silently() {
        let blob = b"nosuchmodule.description=orphan\0garbage-without-equals\0";
        let index = BuiltinIndex::parse("ext4\n", Some(blob));
        assert!(index.description("ext4").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_missing_blob_degrades_to_names_only() {
        let index = BuiltinIndex::parse("ext4\nbtrfs\n", None);
        assert_eq!(index.len(), 2);
        assert!(index.description("btrfs").is_none());
    }

    #[test]
    fn test_empty_index() {
        let index = BuiltinIndex::empty();
        assert!(index.is_empty());
        assert!(!index.contains("ext4"));
    }
}
