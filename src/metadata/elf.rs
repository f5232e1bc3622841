//! Minimal ELF section-table reader.
//!
//! Just enough of the ELF format to locate one named section in a module
//! image: header identification, the section header table, and the section
//! name string table. Handles 32- and 64-bit objects in either byte order.
//! Everything is bounds-checked; a truncated image is a typed error, never
//! a panic.

use crate::error::ExtractError;
use crate::models::RawMetadata;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

/// Field decoder for one object's class and byte order.
#[derive(Debug, Clone, Copy)]
struct Layout {
    is_64: bool,
    little_endian: bool,
}

impl Layout {
    fn u16_at(&self, data: &[u8], offset: usize) -> Result<u16, ExtractError> {
        let bytes: [u8; 2] = data
            .get(offset..offset + 2)
            .and_then(|s| s.try_into().ok())
            .ok_or(ExtractError::Malformed("header field out of bounds"))?;
        Ok(if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn u32_at(&self, data: &[u8], offset: usize) -> Result<u32, ExtractError> {
        let bytes: [u8; 4] = data
            .get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(ExtractError::Malformed("header field out of bounds"))?;
        Ok(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn u64_at(&self, data: &[u8], offset: usize) -> Result<u64, ExtractError> {
        let bytes: [u8; 8] = data
            .get(offset..offset + 8)
            .and_then(|s| s.try_into().ok())
            .ok_or(ExtractError::Malformed("header field out of bounds"))?;
        Ok(if self.little_endian {
            u64::from_le_bytes(bytes)
        } else {
            u64::from_be_bytes(bytes)
        })
    }

    /// Class-dependent "word": u32 in ELF32, u64 in ELF64.
    fn word_at(&self, data: &[u8], offset: usize) -> Result<u64, ExtractError> {
        if self.is_64 {
            self.u64_at(data, offset)
        } else {
            self.u32_at(data, offset).map(u64::from)
        }
    }
}

/// A section's file-offset extent.
struct SectionHeader {
    name_offset: u32,
    offset: u64,
    size: u64,
}

/// Locate a named section and return its raw bytes, or `None` when the
/// image has no such section (a valid outcome for `.modinfo`).
pub fn find_section<'a>(data: &'a [u8], wanted: &str) -> Result<Option<&'a [u8]>, ExtractError> {
    let layout = identify(data)?;

    // e_shoff / e_shentsize / e_shnum / e_shstrndx live at class-dependent
    // offsets in the ELF header.
    let (shoff_at, shentsize_at, shnum_at, shstrndx_at) = if layout.is_64 {
        (0x28, 0x3a, 0x3c, 0x3e)
    } else {
        (0x20, 0x2e, 0x30, 0x32)
    };

    let shoff = layout.word_at(data, shoff_at)? as usize;
    let shentsize = layout.u16_at(data, shentsize_at)? as usize;
    let shnum = layout.u16_at(data, shnum_at)? as usize;
    let shstrndx = layout.u16_at(data, shstrndx_at)? as usize;

    if shoff == 0 || shnum == 0 {
        return Ok(None);
    }
    let min_entry = if layout.is_64 { 64 } else { 40 };
    if shentsize < min_entry {
        return Err(ExtractError::Malformed("section header entry too small"));
    }
    if shstrndx >= shnum {
        return Err(ExtractError::Malformed("string table index out of range"));
    }

    let header_at = |index: usize| -> Result<SectionHeader, ExtractError> {
        let overflow = || ExtractError::Malformed("section header offset overflow");
        let base = index
            .checked_mul(shentsize)
            .and_then(|delta| shoff.checked_add(delta))
            .ok_or_else(overflow)?;
        let (off_delta, size_delta) = if layout.is_64 {
            (0x18usize, 0x20usize)
        } else {
            (0x10, 0x14)
        };
        let off_at = base.checked_add(off_delta).ok_or_else(overflow)?;
        let size_at = base.checked_add(size_delta).ok_or_else(overflow)?;
        Ok(SectionHeader {
            name_offset: layout.u32_at(data, base)?,
            offset: layout.word_at(data, off_at)?,
            size: layout.word_at(data, size_at)?,
        })
    };

    let strtab = header_at(shstrndx)?;
    let names = section_bytes(data, &strtab)
        .ok_or(ExtractError::Malformed("string table out of bounds"))?;

    for index in 0..shnum {
        let header = header_at(index)?;
        if name_at(names, header.name_offset as usize) == Some(wanted) {
            let bytes = section_bytes(data, &header)
                .ok_or(ExtractError::Malformed("section data out of bounds"))?;
            return Ok(Some(bytes));
        }
    }

    Ok(None)
}

/// Validate the ELF identification bytes and derive the field layout.
fn identify(data: &[u8]) -> Result<Layout, ExtractError> {
    if data.len() < 6 || &data[0..4] != ELF_MAGIC {
        return Err(ExtractError::NotElf);
    }
    let is_64 = match data[4] {
        ELFCLASS32 => false,
        ELFCLASS64 => true,
        _ => return Err(ExtractError::Malformed("unknown ELF class")),
    };
    let little_endian = match data[5] {
        ELFDATA2LSB => true,
        ELFDATA2MSB => false,
        _ => return Err(ExtractError::Malformed("unknown ELF byte order")),
    };
    Ok(Layout {
        is_64,
        little_endian,
    })
}

fn section_bytes<'a>(data: &'a [u8], header: &SectionHeader) -> Option<&'a [u8]> {
    let start = usize::try_from(header.offset).ok()?;
    let len = usize::try_from(header.size).ok()?;
    data.get(start..start.checked_add(len)?)
}

/// NUL-terminated string at `offset` within the section-name table.
fn name_at(names: &[u8], offset: usize) -> Option<&str> {
    let tail = names.get(offset..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&tail[..end]).ok()
}

/// Decode a `.modinfo` section: NUL-terminated `key=value` strings with no
/// count prefix. Entries without an `=` are skipped individually; repeated
/// keys keep their first value.
pub fn parse_modinfo(section: &[u8]) -> RawMetadata {
    let mut metadata = RawMetadata::new();
    for chunk in section.split(|&b| b == 0) {
        if chunk.is_empty() {
            continue;
        }
        let entry = String::from_utf8_lossy(chunk);
        if let Some((key, value)) = entry.split_once('=') {
            metadata
                .entry(key.trim().to_string())
                .or_insert_with(|| value.to_string());
        }
    }
    metadata
}
