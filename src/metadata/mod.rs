//! Per-module metadata extraction.
//!
//! Two strategies produce the same `RawMetadata` shape, tried in order:
//! - **extract**: open the module file itself, decompress if needed, locate
//!   the ELF `.modinfo` section and decode its packed key=value entries
//!   (also detecting an appended-signature marker)
//! - **fallback**: shell out to `modinfo(8)` and normalize its line-oriented
//!   output
//!
//! Both are stateless functions over a path; failure of either is a typed
//! outcome the fusion engine degrades through, never a crash.

pub mod compress;
pub mod elf;
pub mod extract;
pub mod fallback;

pub use extract::{extract_module_info, ExtractOutcome, SIGNATURE_MARKER};
pub use fallback::{resolve_via_modinfo, ResolveOutcome};
