//! Loaded-module parser for the live kernel module table.
//!
//! Parses the /proc/modules text format: one module per line, six
//! whitespace-delimited positional fields
//! (`name size ref_count dependencies status address`), with an optional
//! bracketed annotation after the status word. Malformed lines are skipped
//! individually and reported as warnings; the parse never aborts.

use crate::error::SourceError;
use crate::models::{ModuleStatus, SourceWarning, WarningKind};
use std::fmt;

/// One base record parsed from a live-table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub name: String,
    pub size: u64,
    pub ref_count: u32,
    /// Declared dependencies in table order; empty when the field is "-".
    pub dependencies: Vec<String>,
    pub status: ModuleStatus,
    /// Bracketed marker such as "[permanent]", preserved verbatim.
    pub annotation: Option<String>,
    /// Load address; `None` when masked to all zeroes for unprivileged readers.
    pub address: Option<String>,
}

impl fmt::Display for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes, {} refs)", self.name, self.size, self.ref_count)
    }
}

/// Parse the full content of the live module table.
///
/// Empty input is valid (no modules loaded). Each malformed line produces
/// one `MalformedLine` warning and is skipped; well-formed lines are never
/// affected by their neighbours.
pub fn parse_live_table(content: &str) -> (Vec<LoadedModule>, Vec<SourceWarning>) {
    let mut modules = Vec::new();
    let mut warnings = Vec::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(module) => modules.push(module),
            Err(reason) => {
                let err = SourceError::MalformedLine {
                    line_no: idx + 1,
                    reason,
                };
                log::debug!("skipping live-table entry: {}", err);
                warnings.push(SourceWarning::new(
                    WarningKind::MalformedLine,
                    format!("live table: {}", err),
                ));
            }
        }
    }

    (modules, warnings)
}

/// Parse one non-empty live-table line, or explain why it is malformed.
fn parse_line(line: &str) -> Result<LoadedModule, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    }

    let name = fields[0].to_string();
    let size: u64 = fields[1]
        .parse()
        .map_err(|_| format!("size '{}' is not an integer", fields[1]))?;
    let ref_count: u32 = fields[2]
        .parse()
        .map_err(|_| format!("ref count '{}' is not an integer", fields[2]))?;
    let dependencies = parse_dependencies(fields[3]);

    let (status_word, mut annotation) = split_status(fields[4]);
    let status = ModuleStatus::from_live_token(status_word);

    let address = parse_address(fields[5])?;

    // Taint/permanence markers can also trail the address as a seventh token.
    if annotation.is_none() {
        if let Some(extra) = fields.get(6) {
            if extra.starts_with('[') || extra.starts_with('(') {
                annotation = Some((*extra).to_string());
            }
        }
    }

    Ok(LoadedModule {
        name,
        size,
        ref_count,
        dependencies,
        status,
        annotation,
        address,
    })
}

/// Split the comma-separated dependency field. The sentinel "-" means no
/// dependencies; empty segments and stray bracketed markers are dropped.
fn parse_dependencies(field: &str) -> Vec<String> {
    if field == "-" {
        return Vec::new();
    }
    field
        .split(',')
        .map(str::trim)
        .filter(|dep| !dep.is_empty() && !dep.starts_with('['))
        .map(str::to_string)
        .collect()
}

/// Separate the primary status word from an appended bracketed annotation,
/// e.g. "Live[permanent]" -> ("Live", Some("[permanent]")).
fn split_status(field: &str) -> (&str, Option<String>) {
    match field.find('[') {
        Some(pos) if pos > 0 => (&field[..pos], Some(field[pos..].to_string())),
        _ => (field, None),
    }
}

/// Validate the hexadecimal load address field.
///
/// The kernel reports all zeroes to unprivileged readers; that is
/// privilege masking, represented as `None` rather than an error.
fn parse_address(field: &str) -> Result<Option<String>, String> {
    let hex = field
        .strip_prefix("0x")
        .ok_or_else(|| format!("address '{}' lacks 0x prefix", field))?;
    let value = u64::from_str_radix(hex, 16)
        .map_err(|_| format!("address '{}' is not hexadecimal", field))?;
    if value == 0 {
        Ok(None)
    } else {
        Ok(Some(field.to_string()))
    }
}
