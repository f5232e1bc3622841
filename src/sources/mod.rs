//! Module source readers.
//!
//! Each submodule parses one of the three disjoint views the kernel exposes:
//! - **proc_modules**: the live module table (/proc/modules)
//! - **builtin**: the builtin manifest and its packed metadata blob
//! - **tree**: the on-disk module file hierarchy under /lib/modules
//!
//! All three are pure parsers over injected content or paths; none of them
//! aborts on per-item failures. They report contained problems as
//! SourceWarning values for the fusion engine to carry forward.

pub mod builtin;
pub mod proc_modules;
pub mod tree;

pub use builtin::BuiltinIndex;
pub use proc_modules::{parse_live_table, LoadedModule};
pub use tree::{scan_module_tree, ModuleFile};

/// Kernel module names use underscores; file names on disk may use hyphens
/// interchangeably. Normalize to the kernel spelling before comparing.
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}
