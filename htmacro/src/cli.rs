//! Command-line argument parsing.
//!
//! Usage:
//!   htmacro [-o FILE] [-I DIR]... [-C DIR] [-D NAME=VALUE]... [-f FILE] [-vq] [INPUT]

use std::path::{Path, PathBuf};

use clap::Parser;
use directories::ProjectDirs;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default, Parser)]
#[command(name = "htmacro", version, about = "Expand macro directives in HTML documents")]
pub struct CliArgs {
    /// Input document (reads stdin if not given)
    pub input: Option<PathBuf>,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Add a directory to the include search path (repeatable)
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Base directory for relative includes and shell commands
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Predefine a variable (repeatable)
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    pub define: Vec<String>,

    /// Load this rc file instead of searching for one
    #[arg(short = 'f', long = "config", value_name = "FILE", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Do not load any rc file
    #[arg(long)]
    pub no_config: bool,

    /// Start with `{expr}` interpolation disabled
    #[arg(long)]
    pub no_interpolate: bool,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// How to choose the rc file.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigFile {
    /// Search the standard locations.
    Search,
    /// `--no-config`.
    Skip,
    /// `-f <file>`.
    Explicit(PathBuf),
}

impl CliArgs {
    pub fn config_file(&self) -> ConfigFile {
        match (&self.config, self.no_config) {
            (_, true) => ConfigFile::Skip,
            (Some(path), false) => ConfigFile::Explicit(path.clone()),
            (None, false) => ConfigFile::Search,
        }
    }

    /// Log filter level implied by `-v` / `-q`.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`; prints usage and exits on error.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Parse a slice of argument strings, excluding the program name.
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("htmacro".to_owned()).chain(argv.iter().cloned()))
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "htmacro")
}

/// Search for the rc file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("./.htmacrorc")];
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(Path::new(&home).join(".htmacrorc"));
    }
    if let Some(dirs) = project_dirs() {
        candidates.push(dirs.config_dir().join("htmacrorc"));
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Build the include search path.
///
/// Priority: `-I` flags → `HTMACRO_PATH` → rc-file `/include`s → the
/// per-user data directory, when it exists.
pub fn resolve_include_paths(cli: &[PathBuf], rc: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = cli.to_vec();
    if let Some(list) = std::env::var_os("HTMACRO_PATH") {
        paths.extend(std::env::split_paths(&list).filter(|p| !p.as_os_str().is_empty()));
    }
    paths.extend(rc.iter().cloned());
    if let Some(dirs) = project_dirs() {
        let data = dirs.data_dir().join("include");
        if data.is_dir() {
            paths.push(data);
        }
    }
    paths
}

// ── Tests ─────────────────────────────────────────────────────────────────────
