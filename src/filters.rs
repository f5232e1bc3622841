//! Filtering and sorting over fused module records.
//!
//! These operate on already-fused, read-only records and never reach back
//! into the engine. Name matching uses shell-style wildcards (`*` and `?`).

use crate::models::{ModuleRecord, ModuleStatus};
use std::str::FromStr;

/// Criteria for selecting a subset of records. Unset fields match
/// everything; records lacking an optional value (e.g. builtin modules
/// with no size) pass the corresponding bound rather than being judged on
/// data they never had.
#[derive(Debug, Default, Clone)]
pub struct FilterCriteria {
    pub name_glob: Option<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub min_refs: Option<u32>,
    pub status: Option<ModuleStatus>,
}

impl FilterCriteria {
    pub fn matches(&self, record: &ModuleRecord) -> bool {
        if let Some(pattern) = &self.name_glob {
            if !glob_match(pattern, &record.name) {
                return false;
            }
        }
        if let (Some(min), Some(size)) = (self.min_size, record.size) {
            if size < min {
                return false;
            }
        }
        if let (Some(max), Some(size)) = (self.max_size, record.size) {
            if size > max {
                return false;
            }
        }
        if let (Some(min), Some(refs)) = (self.min_refs, record.ref_count) {
            if refs < min {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, records: &[ModuleRecord]) -> Vec<ModuleRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

/// Field to order records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Refs,
    Status,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "refs" => Ok(SortKey::Refs),
            "status" => Ok(SortKey::Status),
            _ => Err(format!("unknown sort key '{}'", s)),
        }
    }
}

/// Sort records in place. Absent sizes and ref counts sort before present
/// ones; name breaks ties so the order stays total and stable.
pub fn sort_records(records: &mut [ModuleRecord], key: SortKey, reverse: bool) {
    records.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name)),
            SortKey::Refs => a
                .ref_count
                .cmp(&b.ref_count)
                .then_with(|| a.name.cmp(&b.name)),
            SortKey::Status => a.status.cmp(&b.status).then_with(|| a.name.cmp(&b.name)),
        };
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Shell-style wildcard match: `*` spans any run, `?` one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative matcher with single-star backtracking.
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
