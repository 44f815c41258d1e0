use std::io::{self, Read, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};

use htmacro::cli::{self, CliArgs, ConfigFile};
use htmacro::config::{parse_define, Config, EngineConfig};
use htmacro::{markup, Engine};

fn main() -> ExitCode {
    let args = cli::parse_args();
    init_logging(&args);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &CliArgs) {
    let ansi = unsafe { libc::isatty(libc::STDERR_FILENO) != 0 };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(args.log_level())
        .with_ansi(ansi)
        .with_target(false)
        .without_time()
        .init();
}

/// Returns `Ok(false)` when the run recorded errors.
fn run(args: CliArgs) -> Result<bool> {
    // ── Rc file ───────────────────────────────────────────────────────────────
    let rc_path = match args.config_file() {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(path) => Some(path),
        ConfigFile::Search => cli::find_user_config(),
    };
    let rc = match rc_path {
        Some(path) => {
            let (rc, errors) = Config::load_file(&path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            for e in errors {
                tracing::warn!("{}: {e}", path.display());
            }
            tracing::debug!(path = %path.display(), "config loaded");
            rc
        }
        None => Config::new(),
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let mut config = EngineConfig::default();
    if let Some(cwd) = &args.cwd {
        config.cwd = cwd.clone();
    }
    rc.apply(&mut config);
    config.include_paths = cli::resolve_include_paths(&args.include, &rc.include_paths);
    if args.no_interpolate {
        config.interpolate = false;
    }

    let mut engine = Engine::with_config(config);
    for (name, value) in &rc.vars {
        engine.env.set(name.clone(), value.clone());
    }
    for def in &args.define {
        let (name, value) = parse_define(def).map_err(anyhow::Error::msg)?;
        engine.env.set(name, value);
    }

    // ── Input → output ────────────────────────────────────────────────────────
    let nodes = match &args.input {
        Some(path) => engine.process_file(path)?,
        None => {
            let mut src = String::new();
            io::stdin()
                .read_to_string(&mut src)
                .context("cannot read stdin")?;
            engine.process_str(&src).context("<stdin>")?
        }
    };
    let text = markup::write(&nodes);

    match &args.output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(!engine.has_errors())
}
