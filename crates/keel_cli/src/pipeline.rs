//! Shared pipeline helpers for CLI commands.
//!
//! Workspace root resolution, logging setup, and the [`Session`] every
//! compiling command starts from: the loaded configuration, the overlay
//! source provider, the package locator and the compilation graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use keel_common::ImportPath;
use keel_config::{LogLevel, WorkspaceConfig, CONFIG_FILE};
use keel_diagnostics::{Diagnostic, DiagnosticRenderer, TerminalRenderer};
use keel_graph::{CompilationGraph, GraphError};
use keel_lang::{toolchain, workspace_locator, DirLocator, KeelLang};
use keel_source::{OverlayFs, SourceDb, SourceProvider};
use tracing_subscriber::EnvFilter;

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `keel.toml`.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the workspace root from global CLI args.
///
/// If `--config` is given, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `keel.toml`.
pub fn resolve_workspace_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &global.config {
        Some(config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                Ok(p.parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")))
            } else {
                Ok(p)
            }
        }
        None => find_workspace_root(&std::env::current_dir()?),
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `--verbose` selects `debug`,
/// `--quiet` selects `warn`, and the workspace's `[log] level` applies.
pub fn init_tracing(global: &GlobalArgs) {
    let level = if global.verbose {
        LogLevel::Debug
    } else if global.quiet {
        LogLevel::Warn
    } else {
        configured_log_level(global)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(global.verbose)
        .try_init();
}

fn configured_log_level(global: &GlobalArgs) -> LogLevel {
    resolve_workspace_root(global)
        .ok()
        .and_then(|root| keel_config::load_config(&root).ok())
        .map(|config| config.log.level)
        .unwrap_or(LogLevel::Info)
}

/// A loaded workspace ready to compile.
pub struct Session {
    /// The directory holding `keel.toml`.
    pub root: PathBuf,
    /// The parsed configuration.
    pub config: WorkspaceConfig,
    /// In-memory buffers layered over the workspace files.
    pub fs: Arc<OverlayFs>,
    /// The package locator over the configured roots.
    pub locator: Arc<DirLocator>,
    /// The compilation graph.
    pub graph: CompilationGraph<KeelLang>,
}

impl Session {
    /// Opens the workspace selected by the global args.
    pub fn open(global: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let root = resolve_workspace_root(global)?;
        Self::at(&root)
    }

    /// Opens the workspace rooted at `root`.
    pub fn at(root: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = keel_config::load_config(root)?;
        let fs = Arc::new(OverlayFs::new());
        let source: Arc<dyn SourceProvider> = fs.clone();
        let locator = Arc::new(workspace_locator(&config, root, Arc::clone(&source)));
        let graph = CompilationGraph::new(
            toolchain(Arc::clone(&locator), source),
            Arc::new(SourceDb::new()),
            &config.graph,
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            fs,
            locator,
            graph,
        })
    }

    /// Returns `paths` as import paths, or every package in the workspace when empty.
    pub fn roots(&self, paths: &[String]) -> Result<Vec<ImportPath>, Box<dyn std::error::Error>> {
        if paths.is_empty() {
            Ok(self.locator.discover()?)
        } else {
            Ok(paths.iter().map(ImportPath::new).collect())
        }
    }
}

/// Renders the diagnostics carried by `err`, or the error itself when it has none.
pub fn report_error(err: &GraphError, source_db: &SourceDb, color: bool) {
    if err.diagnostics().is_empty() {
        eprintln!("error: {err}");
        return;
    }
    render_diagnostics(err.diagnostics(), source_db, color);
}

/// Prints diagnostics to stderr in the terminal format.
pub fn render_diagnostics(diagnostics: &[Diagnostic], source_db: &SourceDb, color: bool) {
    let renderer = TerminalRenderer::new(color);
    for diag in diagnostics {
        eprintln!("{}", renderer.render(diag, source_db));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn global(config: Option<&Path>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: config.map(|p| p.display().to_string()),
        }
    }

    #[test]
    fn find_workspace_root_in_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[workspace]\nname = \"x\"\n").unwrap();
        let nested = tmp.path().join("src/app");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_workspace_root(&nested).unwrap(), tmp.path());
    }

    #[test]
    fn find_workspace_root_not_found() {
        let tmp = TempDir::new().unwrap();
        assert!(find_workspace_root(tmp.path()).is_err());
    }

    #[test]
    fn config_flag_accepts_file_or_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join(CONFIG_FILE);
        fs::write(&file, "[workspace]\nname = \"x\"\n").unwrap();
        assert_eq!(resolve_workspace_root(&global(Some(&file))).unwrap(), tmp.path());
        assert_eq!(
            resolve_workspace_root(&global(Some(tmp.path()))).unwrap(),
            tmp.path()
        );
    }

    #[test]
    fn session_discovers_packages() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[workspace]\nname = \"x\"\n").unwrap();
        for pkg in ["b", "a"] {
            let dir = tmp.path().join("src").join(pkg);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("main.kl"), "const x: int = 1").unwrap();
        }
        let session = Session::at(tmp.path()).unwrap();
        let all = session.roots(&[]).unwrap();
        assert_eq!(all, vec![ImportPath::new("a"), ImportPath::new("b")]);
        let some = session.roots(&["b".to_string()]).unwrap();
        assert_eq!(some, vec![ImportPath::new("b")]);
    }

    #[test]
    fn session_requires_config() {
        let tmp = TempDir::new().unwrap();
        assert!(Session::at(tmp.path()).is_err());
    }
}
