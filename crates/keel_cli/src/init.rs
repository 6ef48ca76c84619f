//! `keel init`: workspace scaffolding.
//!
//! Creates a `keel.toml` and a `main` package under `src/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use keel_config::CONFIG_FILE;

use crate::GlobalArgs;

/// Runs the `keel init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory.
pub fn run(name: Option<String>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let workspace_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{n}' already exists").into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };
    if workspace_dir.join(CONFIG_FILE).exists() {
        return Err(format!("{} already contains {CONFIG_FILE}", workspace_dir.display()).into());
    }

    let workspace_name = workspace_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("my_workspace");

    if !global.quiet {
        eprintln!("  Creating new keel workspace `{workspace_name}`");
    }

    write_keel_toml(&workspace_dir, workspace_name)?;
    let main = write_main_package(&workspace_dir, workspace_name)?;

    if !global.quiet {
        eprintln!("     Created {}", workspace_dir.join(CONFIG_FILE).display());
        eprintln!("     Created {}", main.display());
    }
    Ok(0)
}

fn write_keel_toml(root: &Path, name: &str) -> io::Result<()> {
    let content = format!(
        r#"[workspace]
name = "{name}"
roots = ["src"]

[graph]
builtin = "unsafe"
jobs = 1

[log]
level = "info"
"#
    );
    fs::write(root.join(CONFIG_FILE), content)
}

fn write_main_package(root: &Path, name: &str) -> io::Result<PathBuf> {
    let dir = root.join("src").join("main");
    fs::create_dir_all(&dir)?;
    let path = dir.join("main.kl");
    let content = format!(
        r#"// Entry package of {name}.

pub const name: str = {name:?}
pub const answer: int = 40 + 2
"#
    );
    fs::write(&path, content)?;
    Ok(path)
}
