//! `keel build`: compile packages and report the outcome.

use keel_common::ImportPath;
use keel_diagnostics::Diagnostic;
use keel_graph::GraphError;
use serde::Serialize;
use tracing::warn;

use crate::pipeline::{render_diagnostics, Session};
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// The outcome of compiling one root.
#[derive(Debug, Serialize)]
pub struct RootReport {
    /// The requested import path.
    pub path: ImportPath,
    /// The handle of the compiled version, on success.
    pub handle: Option<u64>,
    /// The number of globals in the package's IR.
    pub globals: usize,
    /// The failure message, if compilation failed.
    pub error: Option<String>,
}

/// Everything `keel build` reports.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    /// One entry per requested root, in request order.
    pub roots: Vec<RootReport>,
    /// Diagnostics from every failure, each problem listed once.
    pub diagnostics: Vec<Diagnostic>,
    /// Failures that carry no diagnostics (missing packages, I/O, cycles).
    #[serde(skip)]
    pub errors: Vec<GraphError>,
}

impl BuildReport {
    /// The number of roots that failed.
    pub fn failed(&self) -> usize {
        self.roots.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Compiles `roots` in `session` and collects the results.
pub fn execute(session: &Session, roots: &[ImportPath]) -> BuildReport {
    let results = session.graph.compile_all(roots);
    let mut report = BuildReport {
        roots: Vec::with_capacity(roots.len()),
        diagnostics: Vec::new(),
        errors: Vec::new(),
    };
    for (path, result) in roots.iter().zip(results) {
        match result {
            Ok(package) => report.roots.push(RootReport {
                path: path.clone(),
                handle: Some(package.handle.as_raw()),
                globals: package.ir.as_ref().map_or(0, |ir| ir.globals.len()),
                error: None,
            }),
            Err(err) => {
                // A dependency that fails under several roots is rebuilt for
                // each; unchanged files keep their id, so repeats compare equal.
                for diag in err.diagnostics() {
                    if !report.diagnostics.contains(diag) {
                        report.diagnostics.push(diag.clone());
                    }
                }
                report.roots.push(RootReport {
                    path: path.clone(),
                    handle: None,
                    globals: 0,
                    error: Some(err.to_string()),
                });
                if err.diagnostics().is_empty() {
                    report.errors.push(err);
                }
            }
        }
    }
    report
}

/// Runs the `keel build` command.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = Session::open(global)?;
    let roots = session.roots(&args.paths)?;
    if roots.is_empty() {
        warn!(workspace = %session.root.display(), "no packages found");
        return Ok(0);
    }

    if !global.quiet && args.format == ReportFormat::Text {
        eprintln!(
            "   Building {} ({} package(s))",
            session.config.workspace.name,
            roots.len()
        );
    }

    let report = execute(&session, &roots);

    match args.format {
        ReportFormat::Text => {
            render_diagnostics(&report.diagnostics, session.graph.source_db(), global.color);
            for err in &report.errors {
                eprintln!("error: {err}");
            }
            if !global.quiet {
                eprintln!(
                    "   Result: {} built, {} failed",
                    report.roots.len() - report.failed(),
                    report.failed()
                );
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(if report.failed() > 0 { 1 } else { 0 })
}
