//! Core data types for kmod-inventory.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle state of a kernel module across all three sources.
///
/// `Live`, `Dead` and `Unloading` come from the live module table and take
/// precedence over everything else. `Builtin` means compiled into the kernel
/// image with no live entry; `Unloaded` means a module file exists on disk
/// but is not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ModuleStatus {
    Live,
    Dead,
    Unloading,
    Builtin,
    Unloaded,
    Unknown,
}

impl ModuleStatus {
    /// Map the primary status word of a live-table line to its enum value.
    /// Unrecognized words map to `Unknown` rather than failing the line.
    pub fn from_live_token(token: &str) -> ModuleStatus {
        match token {
            "Live" => ModuleStatus::Live,
            "Dead" => ModuleStatus::Dead,
            "Unloading" => ModuleStatus::Unloading,
            _ => ModuleStatus::Unknown,
        }
    }

    /// True for states reported by the live module table.
    pub fn is_loaded(&self) -> bool {
        matches!(
            self,
            ModuleStatus::Live | ModuleStatus::Dead | ModuleStatus::Unloading
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Live => "Live",
            ModuleStatus::Dead => "Dead",
            ModuleStatus::Unloading => "Unloading",
            ModuleStatus::Builtin => "Builtin",
            ModuleStatus::Unloaded => "Unloaded",
            ModuleStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" => Ok(ModuleStatus::Live),
            "dead" => Ok(ModuleStatus::Dead),
            "unloading" => Ok(ModuleStatus::Unloading),
            "builtin" => Ok(ModuleStatus::Builtin),
            "unloaded" => Ok(ModuleStatus::Unloaded),
            "unknown" => Ok(ModuleStatus::Unknown),
            _ => Err(format!("unknown module status '{}'", s)),
        }
    }
}

/// Tri-state signature presence flag.
///
/// Only the binary metadata extractor may set `Signed`/`Unsigned`; every
/// other path leaves the default `Unknown` in place. Absence of evidence is
/// not evidence of absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SignatureState {
    Signed,
    Unsigned,
    #[default]
    Unknown,
}

impl SignatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureState::Signed => "yes",
            SignatureState::Unsigned => "no",
            SignatureState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SignatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient key/value metadata produced by the extractor or the fallback
/// resolver. Never exposed outside the fusion engine.
pub type RawMetadata = HashMap<String, String>;

/// One fused record per distinct module name.
///
/// Optional fields stay `None` when the owning source did not report them;
/// a missing value is never replaced by a zero or fabricated stand-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    /// Module name, unique within the fused collection.
    pub name: String,
    /// Size in bytes; absent for builtin and unloaded modules.
    pub size: Option<u64>,
    /// Reference count; only meaningful while loaded.
    pub ref_count: Option<u32>,
    /// Declared dependencies, order preserved. Dangling names are valid.
    pub dependencies: Vec<String>,
    pub status: ModuleStatus,
    /// Bracketed marker trailing the live-table status word, e.g. "[permanent]".
    pub status_annotation: Option<String>,
    /// Hexadecimal load address; absent when not loaded or privilege-masked.
    pub address: Option<String>,
    /// Absolute path to the .ko file; absent for builtins with no file.
    pub file_path: Option<PathBuf>,
    pub description: Option<String>,
    pub signed: SignatureState,
}

impl ModuleRecord {
    /// Create a record with only name and status set; all optional fields
    /// start absent and `signed` starts Unknown.
    pub fn new(name: impl Into<String>, status: ModuleStatus) -> Self {
        ModuleRecord {
            name: name.into(),
            size: None,
            ref_count: None,
            dependencies: Vec::new(),
            status,
            status_annotation: None,
            address: None,
            file_path: None,
            description: None,
            signed: SignatureState::Unknown,
        }
    }
}

/// Category of a contained, non-fatal problem encountered during fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    /// One input line was unparseable and was skipped.
    MalformedLine,
    /// An entire optional source was missing or unreadable.
    SourceUnavailable,
    /// Binary metadata extraction failed for one module file.
    ExtractionFailed,
}

/// Per-source / per-module annotation attached to the fused inventory.
/// Formatters may surface or suppress these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceWarning {
    pub kind: WarningKind,
    pub detail: String,
}

impl SourceWarning {
    pub fn new(kind: WarningKind, detail: impl Into<String>) -> Self {
        SourceWarning {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_live_token() {
        assert_eq!(ModuleStatus::from_live_token("Live"), ModuleStatus::Live);
        assert_eq!(ModuleStatus::from_live_token("Dead"), ModuleStatus::Dead);
        assert_eq!(
            ModuleStatus::from_live_token("Unloading"),
            ModuleStatus::Unloading
        );
        assert_eq!(
            ModuleStatus::from_live_token("Permanent"),
            ModuleStatus::Unknown
        );
    }

    #[test]
    fn test_status_is_loaded() {
        assert!(ModuleStatus::Live.is_loaded());
        assert!(ModuleStatus::Unloading.is_loaded());
        assert!(!ModuleStatus::Builtin.is_loaded());
        assert!(!ModuleStatus::Unloaded.is_loaded());
    }

    #[test]
    fn test_status_from_str_case_insensitive() {
        assert_eq!("live".parse::<ModuleStatus>().unwrap(), ModuleStatus::Live);
        assert_eq!(
            "BUILTIN".parse::<ModuleStatus>().unwrap(),
            ModuleStatus::Builtin
        );
        assert!("bogus".parse::<ModuleStatus>().is_err());
    }

    #[test]
    fn test_signature_state_default_is_unknown() {
        assert_eq!(SignatureState::default(), SignatureState::Unknown);
        assert_eq!(SignatureState::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_new_record_has_absent_optionals() {
        let rec = ModuleRecord::new("ext4", ModuleStatus::Builtin);
        assert_eq!(rec.name, "ext4");
        assert_eq!(rec.status, ModuleStatus::Builtin);
        assert!(rec.size.is_none());
        assert!(rec.ref_count.is_none());
        assert!(rec.dependencies.is_empty());
        assert!(rec.address.is_none());
        assert!(rec.file_path.is_none());
        assert!(rec.description.is_none());
        assert_eq!(rec.signed, SignatureState::Unknown);
    }
}
