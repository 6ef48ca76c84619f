//! `keel graph`: compile packages and print the dependency graph.

use keel_graph::GraphSnapshot;
use tracing::warn;

use crate::pipeline::{report_error, Session};
use crate::{GlobalArgs, GraphArgs, ReportFormat};

/// Runs the `keel graph` command.
///
/// Roots that fail to compile are reported but do not stop the snapshot;
/// the exit code is 1 if any root failed.
pub fn run(args: &GraphArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = Session::open(global)?;
    let roots = session.roots(&args.paths)?;
    if roots.is_empty() {
        warn!(workspace = %session.root.display(), "no packages found");
    }

    let mut failed = false;
    for (path, result) in roots.iter().zip(session.graph.compile_all(&roots)) {
        if let Err(err) = result {
            failed = true;
            warn!(%path, "compile failed");
            report_error(&err, session.graph.source_db(), global.color);
        }
    }

    let snapshot = session.graph.snapshot();
    print!("{}", render(&snapshot, args.format)?);
    Ok(if failed { 1 } else { 0 })
}

fn render(snapshot: &GraphSnapshot, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(snapshot.to_string()),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(snapshot)? + "\n"),
    }
}
