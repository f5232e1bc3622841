//! kmod-inventory
//!
//! Inventories Linux kernel modules by reconciling three disjoint sources:
//! the live module table (/proc/modules), compiled-in builtin modules
//! (modules.builtin plus its packed metadata blob), and on-disk module
//! files under /lib/modules. The fusion engine merges all three into one
//! alphabetically ordered collection of ModuleRecords, enriching each
//! record with ELF `.modinfo` metadata (decompressing transparently and
//! detecting appended signatures) and degrading gracefully whenever a
//! source, privilege, or tool is missing.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Core data structures and types
//! - **sources**: Live-table, builtin, and module-tree readers
//! - **metadata**: Binary extraction and the modinfo(8) fallback
//! - **fusion**: The orchestrating engine and its worker pool
//! - **filters** / **formatters**: Collaborators over the fused records
//! - **logging**: Stderr sink for the `log` facade
//!
//! ```no_run
//! use kmod_inventory::{fuse, FusionOptions, SourceSet};
//!
//! let inventory = fuse(&SourceSet::from_system(), &FusionOptions::default())?;
//! for record in &inventory.records {
//!     println!("{} [{}]", record.name, record.status);
//! }
//! # Ok::<(), kmod_inventory::InventoryError>(())
//! ```

// Core foundational modules
pub mod error;
pub mod models;

// Per-source readers
pub mod sources;

// Binary metadata extraction and external-tool fallback
pub mod metadata;

// The orchestrating fusion engine
pub mod fusion;

// Collaborators over the fused record stream
pub mod filters;
pub mod formatters;

// Stderr sink for the log facade
pub mod logging;

// Re-export the log crate for macro usage
pub use log;

// Re-export error types for easy access
pub use error::{ExtractError, InventoryError, SourceError};

// Re-export model types for easy access
pub use models::{
    ModuleRecord, ModuleStatus, RawMetadata, SignatureState, SourceWarning, WarningKind,
};

// Re-export the engine surface
pub use fusion::{fuse, FusionOptions, Inventory, SourceSet};

// Re-export collaborator types
pub use filters::{sort_records, FilterCriteria, SortKey};
pub use formatters::{render, OutputFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
