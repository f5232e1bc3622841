//! Binary metadata extractor.
//!
//! Reads a module file (decompressing first when needed), locates the ELF
//! `.modinfo` section, decodes its packed key=value entries, and detects
//! whether a cryptographic signature was appended. Detection only; the
//! signature is never verified.

use crate::error::ExtractError;
use crate::metadata::compress::{self, Compression};
use crate::metadata::elf;
use crate::models::{RawMetadata, SignatureState};
use std::fs;
use std::path::Path;

/// Marker the kernel appends after a module signature. Its literal bytes
/// terminate every signed module image.
pub const SIGNATURE_MARKER: &[u8] = b"~Module signature appended~\n";

/// Result of inspecting one module file.
#[derive(Debug)]
pub enum ExtractOutcome {
    /// The `.modinfo` section was found and decoded.
    Extracted {
        metadata: RawMetadata,
        signed: SignatureState,
    },
    /// A well-formed ELF without a `.modinfo` section; the caller should
    /// fall back to the external resolver.
    SectionMissing,
    /// I/O, decompression, or container parse failure for this file only.
    Failed(ExtractError),
}

/// Inspect one module file. Never panics; every failure mode is a typed
/// outcome the fusion engine can degrade through.
pub fn extract_module_info(path: &Path) -> ExtractOutcome {
    match try_extract(path) {
        Ok(Some((metadata, signed))) => ExtractOutcome::Extracted { metadata, signed },
        Ok(None) => ExtractOutcome::SectionMissing,
        Err(err) => ExtractOutcome::Failed(err),
    }
}

fn try_extract(path: &Path) -> Result<Option<(RawMetadata, SignatureState)>, ExtractError> {
    let compression = compress::detect(path);

    // (data, whether we inspected the on-disk byte stream itself)
    let (data, direct) = match compression {
        Compression::None => (fs::read(path)?, true),
        _ => {
            // The guard deletes the artifact when this function returns,
            // on success and failure alike.
            let temp = compress::decompress_to_temp(path, compression)?;
            (fs::read(temp.path())?, false)
        }
    };

    let Some(section) = elf::find_section(&data, ".modinfo")? else {
        return Ok(None);
    };
    let metadata = elf::parse_modinfo(section);
    let signed = detect_signature(&data, &metadata, direct);
    Ok(Some((metadata, signed)))
}

/// Signature detection.
///
/// Positive evidence: the trailing marker bytes at end of image, or the
/// marker text inside a decoded metadata value. A clean negative is only
/// reported when the on-disk byte stream itself was inspected; after
/// decompression the original file tail was not seen, so the absence of a
/// marker stays Unknown rather than becoming a false "unsigned".
fn detect_signature(data: &[u8], metadata: &RawMetadata, direct: bool) -> SignatureState {
    if data.ends_with(SIGNATURE_MARKER) {
        return SignatureState::Signed;
    }
    let marker_text = "Module signature appended";
    if metadata.values().any(|v| v.contains(marker_text)) {
        return SignatureState::Signed;
    }
    if direct {
        SignatureState::Unsigned
    } else {
        SignatureState::Unknown
    }
}
