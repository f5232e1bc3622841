//! kmod-inventory CLI.
//!
//! Thin collaborator around the fusion engine: parses arguments, runs one
//! fusion pass over the system sources, applies filters/sorting, and
//! renders the records. All machine output goes to stdout; diagnostics go
//! to stderr through the log sink.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use kmod_inventory::{
    fuse, logging, render, sort_records, FilterCriteria, FusionOptions, ModuleStatus,
    OutputFormat, SortKey, SourceSet,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Table,
    Json,
    Csv,
    Html,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Html => OutputFormat::Html,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Name,
    Size,
    Refs,
    Status,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortKey::Name,
            SortArg::Size => SortKey::Size,
            SortArg::Refs => SortKey::Refs,
            SortArg::Status => SortKey::Status,
        }
    }
}

/// List kernel modules from all sources: loaded, builtin, and on disk.
#[derive(Debug, Parser)]
#[command(name = "kmod-inventory", version)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: FormatArg,

    /// Only show modules whose name matches this wildcard pattern
    #[arg(long, value_name = "GLOB")]
    filter: Option<String>,

    /// Only show modules with this status (live, builtin, unloaded, ...)
    #[arg(long)]
    status: Option<String>,

    /// Minimum size in bytes (modules without a size are kept)
    #[arg(long, value_name = "BYTES")]
    min_size: Option<u64>,

    /// Maximum size in bytes
    #[arg(long, value_name = "BYTES")]
    max_size: Option<u64>,

    /// Minimum reference count
    #[arg(long, value_name = "N")]
    min_refs: Option<u32>,

    /// Sort records by this field
    #[arg(long, value_enum, default_value = "name")]
    sort: SortArg,

    /// Reverse the sort order
    #[arg(long)]
    reverse: bool,

    /// Override the module tree root (default: /lib/modules/<release>)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Extraction worker count (default: CPU count)
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Deadline in seconds for each modinfo(8) invocation
    #[arg(long, default_value_t = 5, value_name = "SECS")]
    tool_timeout: u64,

    /// Never shell out to modinfo(8) when binary extraction fails
    #[arg(long)]
    no_fallback: bool,

    /// Increase diagnostic verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut sources = SourceSet::from_system();
    if let Some(root) = cli.root.clone() {
        sources.tree_root = Some(root);
    }

    let mut options = FusionOptions::default();
    if let Some(jobs) = cli.jobs {
        options.workers = jobs.max(1);
    }
    options.modinfo_timeout = Duration::from_secs(cli.tool_timeout);
    options.use_fallback_tool = !cli.no_fallback;

    let inventory = fuse(&sources, &options).context("module inventory failed")?;

    let status = cli
        .status
        .as_deref()
        .map(|s| s.parse::<ModuleStatus>().map_err(|e| anyhow!(e)))
        .transpose()?;
    let criteria = FilterCriteria {
        name_glob: cli.filter.clone(),
        min_size: cli.min_size,
        max_size: cli.max_size,
        min_refs: cli.min_refs,
        status,
    };
    let mut records = criteria.apply(&inventory.records);
    sort_records(&mut records, cli.sort.into(), cli.reverse);

    print!(
        "{}",
        render(&records, &inventory.warnings, cli.format.into())
    );
    Ok(())
}
