//! Fusion engine.
//!
//! Merges the three module sources into one alphabetically ordered
//! collection of ModuleRecords:
//! - live table records seed the working table (highest precedence)
//! - builtin names absent from the table are inserted as Builtin
//! - on-disk files absent from the table are inserted as Unloaded
//! - every record with a file path is enriched via the binary extractor,
//!   falling back to modinfo(8), falling back to absent/Unknown
//!
//! Per-module extraction runs on a bounded worker pool; results are
//! collected over a channel and applied by the orchestrating thread only,
//! so the working table is never mutated concurrently. Failure in any one
//! source or module never aborts the others; the only hard failure is the
//! total absence of both the live table and the module tree.

use crate::error::{InventoryError, SourceError};
use crate::metadata::extract::{extract_module_info, ExtractOutcome};
use crate::metadata::fallback::{resolve_via_modinfo, ModinfoTarget, ResolveOutcome};
use crate::models::{
    ModuleRecord, ModuleStatus, RawMetadata, SignatureState, SourceWarning, WarningKind,
};
use crate::sources::{self, BuiltinIndex};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Raw inputs for one fusion pass. Every field is optional so tests can
/// inject fixtures and so any missing source degrades instead of failing.
#[derive(Debug, Default, Clone)]
pub struct SourceSet {
    /// Content of the live module table (/proc/modules).
    pub live_table: Option<String>,
    /// Content of the builtin manifest (modules.builtin).
    pub builtin_names: Option<String>,
    /// Raw bytes of the packed builtin metadata blob
    /// (modules.builtin.modinfo).
    pub builtin_blob: Option<Vec<u8>>,
    /// Root of the on-disk module tree (/lib/modules/<release>).
    pub tree_root: Option<PathBuf>,
    /// Kernel release string, used when the fallback tool resolves by name.
    pub kernel_release: Option<String>,
}

impl SourceSet {
    /// Read the running system's sources. Each unreadable piece becomes
    /// `None` here and a warning during fusion; nothing fails yet.
    pub fn from_system() -> SourceSet {
        let kernel_release = fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|s| s.trim().to_string());

        let module_dir = kernel_release
            .as_deref()
            .map(|release| PathBuf::from("/lib/modules").join(release));

        let live_table = fs::read_to_string("/proc/modules").ok();
        let builtin_names = module_dir
            .as_ref()
            .and_then(|dir| fs::read_to_string(dir.join("modules.builtin")).ok());
        let builtin_blob = module_dir
            .as_ref()
            .and_then(|dir| fs::read(dir.join("modules.builtin.modinfo")).ok());
        let tree_root = module_dir.filter(|dir| dir.is_dir());

        SourceSet {
            live_table,
            builtin_names,
            builtin_blob,
            tree_root,
            kernel_release,
        }
    }
}

/// Tunables for one fusion pass.
#[derive(Debug, Clone)]
pub struct FusionOptions {
    /// Extraction worker pool size.
    pub workers: usize,
    /// Deadline for one modinfo(8) invocation.
    pub modinfo_timeout: Duration,
    /// Whether to consult modinfo(8) when binary extraction fails.
    pub use_fallback_tool: bool,
    /// Cooperative early-termination flag: once set, no new extraction
    /// tasks are started. In-flight tasks run to completion.
    pub cancel: Arc<AtomicBool>,
}

impl Default for FusionOptions {
    fn default() -> Self {
        FusionOptions {
            workers: num_cpus::get().max(1),
            modinfo_timeout: Duration::from_secs(5),
            use_fallback_tool: true,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// The fused result: records ordered by name, plus the contained problems
/// encountered along the way. Formatters may surface or suppress warnings.
#[derive(Debug)]
pub struct Inventory {
    pub records: Vec<ModuleRecord>,
    pub warnings: Vec<SourceWarning>,
}

/// One unit of work for the extraction pool. A task without a path
/// belongs to a file-less builtin and can only be resolved by name.
struct ExtractTask {
    name: String,
    path: Option<PathBuf>,
}

/// What one extraction task reports back to the orchestrator.
struct ExtractResult {
    name: String,
    metadata: Option<RawMetadata>,
    signed: SignatureState,
    warning: Option<SourceWarning>,
}

/// Run one full fusion pass over the given sources.
pub fn fuse(sources: &SourceSet, options: &FusionOptions) -> Result<Inventory, InventoryError> {
    let tree_usable = sources
        .tree_root
        .as_ref()
        .map(|root| root.is_dir())
        .unwrap_or(false);
    if sources.live_table.is_none() && !tree_usable {
        return Err(InventoryError::NoUsableSource(
            "live module table and module tree are both absent".to_string(),
        ));
    }

    let mut warnings = Vec::new();
    let mut table: BTreeMap<String, ModuleRecord> = BTreeMap::new();
    let mut loaded_names: HashSet<String> = HashSet::new();

    // 1. Live table seeds the working table; its statuses outrank all
    //    other sources.
    match &sources.live_table {
        Some(content) => {
            let (loaded, live_warnings) = sources::parse_live_table(content);
            warnings.extend(live_warnings);
            for module in loaded {
                loaded_names.insert(sources::normalize_name(&module.name));
                let mut record = ModuleRecord::new(module.name, module.status);
                record.size = Some(module.size);
                record.ref_count = Some(module.ref_count);
                record.dependencies = module.dependencies;
                record.status_annotation = module.annotation;
                record.address = module.address;
                table.insert(record.name.clone(), record);
            }
        }
        None => {
            let err = SourceError::Unavailable {
                source_name: "live module table".to_string(),
                reason: "not readable".to_string(),
            };
            warnings.push(SourceWarning::new(
                WarningKind::SourceUnavailable,
                err.to_string(),
            ));
        }
    }

    // 2. Builtin names without a live entry become Builtin records.
    let index = match &sources.builtin_names {
        Some(manifest) => BuiltinIndex::parse(manifest, sources.builtin_blob.as_deref()),
        None => {
            let err = SourceError::Unavailable {
                source_name: "builtin manifest".to_string(),
                reason: "not readable".to_string(),
            };
            warnings.push(SourceWarning::new(
                WarningKind::SourceUnavailable,
                err.to_string(),
            ));
            BuiltinIndex::empty()
        }
    };
    for name in index.names() {
        if !table.contains_key(name) && !loaded_names.contains(name) {
            let mut record = ModuleRecord::new(name, ModuleStatus::Builtin);
            record.description = index.description(name).map(str::to_string);
            table.insert(record.name.clone(), record);
        }
    }

    // 3. On-disk files: attach paths to known records, insert the rest as
    //    Unloaded.
    match sources.tree_root.as_ref() {
        Some(root) if tree_usable => {
            let (files, scan_warnings) = sources::scan_module_tree(root, &loaded_names);
            warnings.extend(scan_warnings);
            for file in files {
                match table.get_mut(&file.name) {
                    Some(record) => {
                        if record.file_path.is_none() {
                            record.file_path = Some(file.path);
                        }
                    }
                    None => {
                        let mut record = ModuleRecord::new(file.name, ModuleStatus::Unloaded);
                        record.file_path = Some(file.path);
                        table.insert(record.name.clone(), record);
                    }
                }
            }
        }
        Some(root) => {
            let err = SourceError::Unavailable {
                source_name: "module tree".to_string(),
                reason: format!("{} is not a directory", root.display()),
            };
            warnings.push(SourceWarning::new(
                WarningKind::SourceUnavailable,
                err.to_string(),
            ));
        }
        None => {
            let err = SourceError::Unavailable {
                source_name: "module tree".to_string(),
                reason: "not readable".to_string(),
            };
            warnings.push(SourceWarning::new(
                WarningKind::SourceUnavailable,
                err.to_string(),
            ));
        }
    }

    // 4. Enrich the records. Anything with a file on disk goes through the
    //    binary extractor; file-less builtins that the index left without a
    //    description can still be asked about by name, fallback tool only.
    let mut tasks: Vec<ExtractTask> = Vec::new();
    for record in table.values() {
        if let Some(path) = &record.file_path {
            tasks.push(ExtractTask {
                name: record.name.clone(),
                path: Some(path.clone()),
            });
        } else if options.use_fallback_tool && record.description.is_none() {
            tasks.push(ExtractTask {
                name: record.name.clone(),
                path: None,
            });
        }
    }

    let mut results = run_extraction_pool(tasks, sources.kernel_release.as_deref(), options);
    // Channel arrival order is nondeterministic; fix it so repeated runs
    // over unchanged sources produce identical output.
    results.sort_by(|a, b| a.name.cmp(&b.name));

    for result in results {
        if let Some(warning) = result.warning {
            warnings.push(warning);
        }
        let Some(record) = table.get_mut(&result.name) else {
            continue;
        };
        record.signed = result.signed;
        if record.description.is_none() {
            if let Some(metadata) = &result.metadata {
                record.description = metadata.get("description").cloned();
            }
        }
    }

    Ok(Inventory {
        records: table.into_values().collect(),
        warnings,
    })
}

/// Dispatch one extraction task per module over a bounded worker pool and
/// collect the results. The working table is untouched here; callers apply
/// results single-threaded.
fn run_extraction_pool(
    tasks: Vec<ExtractTask>,
    kernel_release: Option<&str>,
    options: &FusionOptions,
) -> Vec<ExtractResult> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let workers = options.workers.max(1).min(tasks.len());
    log::debug!(
        "extracting metadata for {} modules on {} workers",
        tasks.len(),
        workers
    );

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<ExtractTask>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<ExtractResult>();
    for task in tasks {
        let _ = job_tx.send(task);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = Arc::clone(&options.cancel);
            let release = kernel_release.map(str::to_string);
            let timeout = options.modinfo_timeout;
            let use_fallback = options.use_fallback_tool;
            scope.spawn(move || {
                while let Ok(task) = job_rx.recv() {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let result = extract_one(task, release.as_deref(), timeout, use_fallback);
                    let _ = result_tx.send(result);
                }
            });
        }
    });
    drop(result_tx);

    result_rx.iter().collect()
}

/// Extract metadata for one module: binary extractor first, external tool
/// second, absent/Unknown last. Independent of every other module.
fn extract_one(
    task: ExtractTask,
    kernel_release: Option<&str>,
    timeout: Duration,
    use_fallback: bool,
) -> ExtractResult {
    let ExtractTask { name, path } = task;
    let mut warning = None;

    if let Some(path) = &path {
        match extract_module_info(path) {
            ExtractOutcome::Extracted { metadata, signed } => {
                return ExtractResult {
                    name,
                    metadata: Some(metadata),
                    signed,
                    warning,
                };
            }
            ExtractOutcome::SectionMissing => {
                log::debug!("{}: no .modinfo section, trying fallback", name);
            }
            ExtractOutcome::Failed(err) => {
                log::debug!("{}: binary extraction failed: {}", name, err);
                warning = Some(SourceWarning::new(
                    WarningKind::ExtractionFailed,
                    format!("{}: {}", name, err),
                ));
            }
        }
    }

    let metadata = if use_fallback {
        let target = match &path {
            Some(path) => ModinfoTarget::Path(path),
            None => ModinfoTarget::Name {
                name: &name,
                release: kernel_release,
            },
        };
        match resolve_via_modinfo(target, timeout) {
            ResolveOutcome::Resolved(metadata) => Some(metadata),
            ResolveOutcome::Unavailable { reason } => {
                log::debug!("{}: fallback unavailable: {}", name, reason);
                None
            }
        }
    } else {
        None
    };

    // The fallback tool never inspected the binary itself, so the
    // signature state stays Unknown.
    ExtractResult {
        name,
        metadata,
        signed: SignatureState::Unknown,
        warning,
    }
}
