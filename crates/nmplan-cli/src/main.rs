mod commands;

use clap::error::ErrorKind;
use clap::Parser;
use commands::EXIT_FAILURE;
use nmplan_core::{Engine, ImportConfig, Mode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(
    name = "nmplan-import",
    version,
    about = "Import a NetworkManager keyfile into the netplan YAML hierarchy"
)]
struct Cli {
    /// Search for and write configuration files below this root directory.
    #[arg(short, long, default_value = "/")]
    root_dir: PathBuf,

    /// The NetworkManager keyfile to load into the hierarchy.
    #[arg(short, long)]
    keyfile: Option<PathBuf>,

    /// Remove the definition the keyfile was imported as, instead of importing.
    #[arg(short, long, default_value_t = false)]
    delete: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,
}

/// Debug builds may run unconfined for test harnesses; release builds always
/// install the syscall filter.
fn sandbox_opted_out(value: Option<&str>) -> bool {
    cfg!(debug_assertions) && value == Some("1")
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_FAILURE),
            };
        }
    };

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("NMPLAN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let Some(keyfile) = cli.keyfile else {
        eprintln!("error: --keyfile is mandatory");
        return ExitCode::from(EXIT_FAILURE);
    };

    let confine = !sandbox_opted_out(std::env::var("NMPLAN_SKIP_SANDBOX").ok().as_deref());
    if !confine {
        warn!("NMPLAN_SKIP_SANDBOX=1: running without the syscall filter");
    }
    let mode = if cli.delete {
        Mode::Delete
    } else {
        Mode::Import
    };
    let engine = Engine::new(
        ImportConfig::new(cli.root_dir, keyfile)
            .with_mode(mode)
            .confined(confine),
    );

    match commands::run(&engine) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
