//! `keel check`: rehearse an editor's edit-and-recompile cycle offline.
//!
//! Compiles a package, treats the given files as edited, recompiles whatever
//! became dirty, and reports which packages were actually rebuilt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use keel_common::ImportPath;
use keel_graph::{GraphError, PackageHandle};
use tracing::{info, warn};

use crate::pipeline::{report_error, Session};
use crate::{CheckArgs, GlobalArgs};

/// What one check cycle did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Touched files that belong to no compiled package.
    pub unknown_files: Vec<PathBuf>,
    /// Packages marked dirty by the touched files, sorted.
    pub dirtied: Vec<ImportPath>,
    /// Packages that got a new handle, sorted.
    pub rebuilt: Vec<ImportPath>,
}

/// Compiles `root`, invalidates `touched`, and recompiles dirty packages.
pub fn execute(session: &Session, root: &str, touched: &[PathBuf]) -> Result<CheckReport, GraphError> {
    let graph = &session.graph;
    graph.compile(root)?;
    let before: HashMap<ImportPath, PackageHandle> = graph
        .packages()
        .iter()
        .map(|p| (p.path.clone(), p.handle))
        .collect();

    let mut report = CheckReport::default();
    for file in touched {
        match graph.invalidate_file(file) {
            Some(owner) => info!(file = %file.display(), %owner, "touched"),
            None => report.unknown_files.push(file.clone()),
        }
    }
    report.dirtied = graph
        .packages()
        .iter()
        .filter(|p| p.is_dirty())
        .map(|p| p.path.clone())
        .collect();
    report.dirtied.sort();

    graph.recompile_dirty()?;
    report.rebuilt = graph
        .packages()
        .iter()
        .filter(|p| before.get(&p.path) != Some(&p.handle))
        .map(|p| p.path.clone())
        .collect();
    report.rebuilt.sort();
    Ok(report)
}

/// Runs the `keel check` command.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = Session::open(global)?;
    let cwd = std::env::current_dir()?;
    let touched: Vec<PathBuf> = args.touch.iter().map(|f| absolute(&cwd, f)).collect();

    let report = match execute(&session, &args.path, &touched) {
        Ok(report) => report,
        Err(err) => {
            report_error(&err, session.graph.source_db(), global.color);
            return Ok(1);
        }
    };

    for file in &report.unknown_files {
        warn!(file = %file.display(), "not part of any compiled package");
    }
    if !global.quiet {
        eprintln!("   Dirtied {}", join(&report.dirtied));
        eprintln!("   Rebuilt {}", join(&report.rebuilt));
    }
    Ok(0)
}

fn absolute(cwd: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        cwd.join(file)
    }
}

fn join(paths: &[ImportPath]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(ImportPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
