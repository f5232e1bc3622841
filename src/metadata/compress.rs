//! Transparent decompression of compressed module files.
//!
//! Distributions ship modules as plain `.ko` or compressed `.ko.zst` /
//! `.ko.xz` / `.ko.gz`. Before ELF inspection the compressed variants are
//! expanded into a private, uniquely named temporary file; the temporary
//! artifact is removed on every exit path by tying its lifetime to a
//! `NamedTempFile` guard.

use crate::error::ExtractError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Compression layer detected from a module file's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zstd,
    /// Recognized by the scanner but not decodable here; the extractor
    /// reports it as a typed failure so the fallback resolver can run.
    Xz,
}

/// Detect the compression layer from the file name alone.
pub fn detect(path: &Path) -> Compression {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Compression::None;
    };
    if name.ends_with(".ko.zst") {
        Compression::Zstd
    } else if name.ends_with(".ko.xz") {
        Compression::Xz
    } else if name.ends_with(".ko.gz") {
        Compression::Gzip
    } else {
        Compression::None
    }
}

/// Expand a compressed module into a scoped temporary file.
///
/// The returned guard deletes the artifact when dropped, whether the caller
/// succeeds, fails, or returns early. Each call gets its own uniquely named
/// file, so concurrent extraction tasks never collide.
pub fn decompress_to_temp(
    path: &Path,
    compression: Compression,
) -> Result<NamedTempFile, ExtractError> {
    let mut temp = NamedTempFile::new()?;

    match compression {
        Compression::Gzip => {
            let file = File::open(path)?;
            let mut decoder = GzDecoder::new(file);
            io::copy(&mut decoder, temp.as_file_mut())
                .map_err(|e| ExtractError::Decompress(format!("gzip: {}", e)))?;
        }
        Compression::Zstd => {
            let bytes = std::fs::read(path)?;
            let decoded = zstd::decode_all(&bytes[..])
                .map_err(|e| ExtractError::Decompress(format!("zstd: {}", e)))?;
            temp.as_file_mut().write_all(&decoded)?;
        }
        Compression::Xz => {
            return Err(ExtractError::UnsupportedCompression(".ko.xz".to_string()));
        }
        Compression::None => {
            return Err(ExtractError::Decompress(
                "file is not compressed".to_string(),
            ));
        }
    }

    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_detect_by_suffix() {
        assert_eq!(detect(&PathBuf::from("/x/ahci.ko")), Compression::None);
        assert_eq!(detect(&PathBuf::from("/x/ext4.ko.zst")), Compression::Zstd);
        assert_eq!(detect(&PathBuf::from("/x/btrfs.ko.xz")), Compression::Xz);
        assert_eq!(detect(&PathBuf::from("/x/loop.ko.gz")), Compression::Gzip);
    }

    #[test]
    fn test_zstd_round_trip() {
        let payload = b"pretend this is an ELF image";
        let compressed = zstd::encode_all(&payload[..], 0).unwrap();
        let mut src = NamedTempFile::new().unwrap();
        src.write_all(&compressed).unwrap();

        let temp = decompress_to_temp(src.path(), Compression::Zstd).unwrap();
        let restored = std::fs::read(temp.path()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_gzip_round_trip() {
        let payload = b"gzip wrapped module bytes";
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();
        let mut src = NamedTempFile::new().unwrap();
        src.write_all(&compressed).unwrap();

        let temp = decompress_to_temp(src.path(), Compression::Gzip).unwrap();
        let restored = std::fs::read(temp.path()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_corrupt_zstd_is_typed_failure() {
        let mut src = NamedTempFile::new().unwrap();
        src.write_all(b"definitely not a zstd frame").unwrap();
        let err = decompress_to_temp(src.path(), Compression::Zstd).unwrap_err();
        assert!(matches!(err, ExtractError::Decompress(_)));
    }

    #[test]
    fn test_xz_is_unsupported() {
        let src = NamedTempFile::new().unwrap();
        let err = decompress_to_temp(src.path(), Compression::Xz).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedCompression(_)));
    }

    #[test]
    fn test_temp_artifact_removed_on_drop() {
        let payload = zstd::encode_all(&b"bytes"[..], 0).unwrap();
        let mut src = NamedTempFile::new().unwrap();
        src.write_all(&payload).unwrap();

        let temp = decompress_to_temp(src.path(), Compression::Zstd).unwrap();
        let temp_path = temp.path().to_path_buf();
        assert!(temp_path.exists());
        drop(temp);
        assert!(!temp_path.exists());
    }
}
