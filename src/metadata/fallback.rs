//! Fallback metadata resolver.
//!
//! When the binary extractor cannot inspect a module file (missing section,
//! unsupported compression, unreadable file), `modinfo(8)` is asked instead
//! and its line-oriented output is normalized into the same RawMetadata
//! shape. This is the terminal fallback: if the tool is missing, exits
//! non-zero, prints nothing, or exceeds the deadline, the outcome is an
//! explicit Unavailable and the module's fields stay absent/Unknown.

use crate::models::RawMetadata;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// What to ask the external tool about.
#[derive(Debug, Clone, Copy)]
pub enum ModinfoTarget<'a> {
    /// A module file path; works for unloaded and compressed files.
    Path(&'a Path),
    /// A module name, optionally pinned to a kernel release via `-k`.
    Name {
        name: &'a str,
        release: Option<&'a str>,
    },
}

/// Outcome of one resolver invocation. `Unavailable` never carries
/// fabricated values.
#[derive(Debug)]
pub enum ResolveOutcome {
    Resolved(RawMetadata),
    Unavailable { reason: String },
}

impl ResolveOutcome {
    fn unavailable(reason: impl Into<String>) -> Self {
        ResolveOutcome::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Run `modinfo` for one module with a bounded deadline.
///
/// A deadline overrun yields `Unavailable` for this module only; the child
/// process is left to finish on its own since it touches nothing shared.
pub fn resolve_via_modinfo(target: ModinfoTarget<'_>, timeout: Duration) -> ResolveOutcome {
    let mut command = Command::new("modinfo");
    match target {
        ModinfoTarget::Path(path) => {
            command.arg(path);
        }
        ModinfoTarget::Name { name, release } => {
            if let Some(release) = release {
                command.args(["-k", release]);
            }
            command.arg(name);
        }
    }
    run_resolver(command, timeout)
}

fn run_resolver(mut command: Command, timeout: Duration) -> ResolveOutcome {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            log::debug!("modinfo not runnable: {}", err);
            return ResolveOutcome::unavailable(format!("modinfo not runnable: {}", err));
        }
    };

    // Wait on a helper thread so the deadline applies to the whole
    // invocation. On timeout the child keeps running detached; it only
    // touches its own stdout pipe.
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });

    let output = match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return ResolveOutcome::unavailable(format!("modinfo failed: {}", err));
        }
        Err(_) => {
            log::warn!("modinfo timed out after {:?}", timeout);
            return ResolveOutcome::unavailable(format!("modinfo timed out after {:?}", timeout));
        }
    };

    if !output.status.success() {
        return ResolveOutcome::unavailable(format!("modinfo exited with {}", output.status));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let metadata = parse_tool_output(&stdout);
    if metadata.is_empty() {
        return ResolveOutcome::unavailable("modinfo produced no output");
    }
    ResolveOutcome::Resolved(metadata)
}

/// Normalize `key: value` / `key=value` lines into a RawMetadata map.
/// Whichever separator appears first on a line wins; repeated keys keep
/// their first value.
pub fn parse_tool_output(output: &str) -> RawMetadata {
    let mut metadata = RawMetadata::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let colon = line.find(':');
        let equals = line.find('=');
        let split_at = match (colon, equals) {
            (Some(c), Some(e)) => c.min(e),
            (Some(c), None) => c,
            (None, Some(e)) => e,
            (None, None) => continue,
        };
        let key = line[..split_at].trim();
        let value = line[split_at + 1..].trim();
        if key.is_empty() {
            continue;
        }
        metadata
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }
    metadata
}
