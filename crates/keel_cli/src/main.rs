//! Command-line interface for the keel incremental compiler.
//!
//! Provides `keel init` for workspace scaffolding, `keel build` to compile
//! packages, `keel graph` to print the dependency graph, and `keel check` to
//! rehearse an edit-and-recompile cycle.

#![warn(missing_docs)]

mod build;
mod check;
mod graph;
mod init;
mod pipeline;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Keel, an incremental package compiler.
#[derive(Parser, Debug)]
#[command(name = "keel", version, about = "Keel incremental compiler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `keel.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new keel workspace.
    Init {
        /// Workspace name (creates a subdirectory). If omitted, initializes in
        /// the current directory.
        name: Option<String>,
    },
    /// Compile packages.
    Build(BuildArgs),
    /// Compile packages and print the dependency graph.
    Graph(GraphArgs),
    /// Compile a package, touch files, and report what gets rebuilt.
    Check(CheckArgs),
}

/// Arguments for the `keel build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Import paths to compile. Defaults to every package in the workspace.
    pub paths: Vec<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `keel graph` subcommand.
#[derive(Parser, Debug)]
pub struct GraphArgs {
    /// Import paths to compile. Defaults to every package in the workspace.
    pub paths: Vec<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `keel check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Import path of the package to compile.
    pub path: String,

    /// Source files to treat as edited.
    #[arg(long, num_args = 1.., required = true)]
    pub touch: Vec<PathBuf>,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    pipeline::init_tracing(&global);

    let result = match cli.command {
        Command::Init { name } => init::run(name, &global),
        Command::Build(ref args) => build::run(args, &global),
        Command::Graph(ref args) => graph::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_init_default() {
        let cli = Cli::parse_from(["keel", "init"]);
        match cli.command {
            Command::Init { name } => assert!(name.is_none()),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_init_with_name() {
        let cli = Cli::parse_from(["keel", "init", "demo"]);
        match cli.command {
            Command::Init { name } => assert_eq!(name.as_deref(), Some("demo")),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["keel", "build"]);
        match cli.command {
            Command::Build(ref args) => {
                assert!(args.paths.is_empty());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_paths() {
        let cli = Cli::parse_from(["keel", "build", "app", "net/http", "--format", "json"]);
        match cli.command {
            Command::Build(ref args) => {
                assert_eq!(args.paths, vec!["app", "net/http"]);
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_graph() {
        let cli = Cli::parse_from(["keel", "graph", "-f", "json"]);
        match cli.command {
            Command::Graph(ref args) => assert_eq!(args.format, ReportFormat::Json),
            _ => panic!("expected Graph command"),
        }
    }

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["keel", "check", "app", "--touch", "a.kl", "b.kl"]);
        match cli.command {
            Command::Check(ref args) => {
                assert_eq!(args.path, "app");
                assert_eq!(args.touch, vec![PathBuf::from("a.kl"), PathBuf::from("b.kl")]);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn check_requires_touch() {
        assert!(Cli::try_parse_from(["keel", "check", "app"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["keel", "--quiet", "--color", "never", "build"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["keel", "--config", "/ws/keel.toml", "-v", "graph"]);
        assert_eq!(cli.config.as_deref(), Some("/ws/keel.toml"));
        assert!(cli.verbose);
    }
}
