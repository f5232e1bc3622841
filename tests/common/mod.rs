//! Shared fixtures for integration tests: synthetic ELF module images and
//! on-disk module trees.

use std::fs;
use std::path::{Path, PathBuf};

/// Build a minimal ELF64 little-endian module image whose `.modinfo`
/// section holds the given NUL-terminated entries.
pub fn elf_with_modinfo(entries: &[u8]) -> Vec<u8> {
    let shstrtab: &[u8] = b"\0.modinfo\0.shstrtab\0";

    let mut image = vec![0u8; 64];
    image[0..4].copy_from_slice(b"\x7fELF");
    image[4] = 2; // ELFCLASS64
    image[5] = 1; // little endian
    image[6] = 1; // EV_CURRENT

    let modinfo_offset = image.len() as u64;
    image.extend_from_slice(entries);
    let strtab_offset = image.len() as u64;
    image.extend_from_slice(shstrtab);

    let shoff = image.len() as u64;
    let mut push_shdr = |image: &mut Vec<u8>, name_off: u32, offset: u64, size: u64| {
        let mut shdr = vec![0u8; 64];
        shdr[0..4].copy_from_slice(&name_off.to_le_bytes());
        shdr[24..32].copy_from_slice(&offset.to_le_bytes());
        shdr[32..40].copy_from_slice(&size.to_le_bytes());
        image.extend_from_slice(&shdr);
    };
    push_shdr(&mut image, 0, 0, 0);
    push_shdr(&mut image, 1, modinfo_offset, entries.len() as u64);
    push_shdr(&mut image, 10, strtab_offset, shstrtab.len() as u64);

    image[0x28..0x30].copy_from_slice(&shoff.to_le_bytes());
    image[0x3a..0x3c].copy_from_slice(&64u16.to_le_bytes());
    image[0x3c..0x3e].copy_from_slice(&3u16.to_le_bytes());
    image[0x3e..0x40].copy_from_slice(&2u16.to_le_bytes());
    image
}

/// Write `bytes` to `dir/name`, creating parent directories as needed.
pub fn write_module(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

/// Write a plain `.ko` whose modinfo description is `description`.
pub fn write_ko(dir: &Path, name: &str, description: &str) -> PathBuf {
    let entries = format!("description={}\0license=GPL\0", description);
    write_module(dir, &format!("{}.ko", name), &elf_with_modinfo(entries.as_bytes()))
}

/// Write a zstd-compressed `.ko.zst` with the given description.
pub fn write_ko_zst(dir: &Path, name: &str, description: &str) -> PathBuf {
    let entries = format!("description={}\0license=GPL\0", description);
    let image = elf_with_modinfo(entries.as_bytes());
    let compressed = zstd::encode_all(&image[..], 0).unwrap();
    write_module(dir, &format!("{}.ko.zst", name), &compressed)
}
