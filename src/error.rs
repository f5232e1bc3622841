//! Unified error type hierarchy for kmod-inventory
//!
//! Provides structured error handling with SourceError, ExtractError and
//! InventoryError. Per-line and per-module failures are contained at the
//! smallest scope (they surface as warnings on the fused inventory); only
//! InventoryError ever aborts a run.

use std::io;
use thiserror::Error;

/// Errors raised while reading or parsing one of the module sources.
///
/// These never abort fusion. The fusion engine converts them into
/// [`crate::models::SourceWarning`] annotations and continues with the
/// remaining lines and sources.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("malformed line {line_no}: {reason}")]
    MalformedLine { line_no: usize, reason: String },

    #[error("source '{source_name}' unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },
}

/// Binary metadata extraction errors, scoped to one module file.
///
/// Any of these triggers the fallback resolver for that module; if the
/// fallback is also unavailable the record's description stays absent and
/// its signature state stays Unknown.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error reading module file: {0}")]
    Io(#[from] io::Error),

    #[error("not an ELF object")]
    NotElf,

    #[error("malformed ELF container: {0}")]
    Malformed(&'static str),

    #[error("unsupported compression suffix '{0}'")]
    UnsupportedCompression(String),

    #[error("decompression failed: {0}")]
    Decompress(String),
}

/// Top-level fusion errors.
///
/// Fusion prefers partial results over no results, so this is raised only
/// when both the live module table and the on-disk module tree are absent
/// and there is nothing at all to report.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("no usable module source: {0}")]
    NoUsableSource(String),
}
