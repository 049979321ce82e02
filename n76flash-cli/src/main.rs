//! n76flash CLI - Command-line tool for flashing Nuvoton N76E003 / MS51 chips.
//!
//! ## Features
//!
//! - Flash raw binary images through the UART bootloader
//! - Serial port discovery under `/dev` with interactive selection
//! - Legacy single-dash options (`-file`, `-port`, ...) alongside `--file`
//! - Configuration file and environment variable support
//! - Ctrl-C aware: programming stops between blocks

use anyhow::Result;
use clap::{CommandFactory, Parser, error::ErrorKind};
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod serial;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether the user pressed Ctrl-C.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// n76flash - Flash Nuvoton N76E003 / MS51 chips through the UART bootloader.
///
/// Environment variables:
///   N76FLASH_PORT              - Serial port to use
///   N76FLASH_SEARCH            - Serial port name prefix (default: ttyUSB)
///   N76FLASH_TRIES             - Number of connection tries (default: 25)
///   N76FLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser, Debug)]
#[command(name = "n76flash")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Single-dash long options (-file, -search, -port, -tries, -help) are also accepted.")]
struct Cli {
    /// Binary file to flash.
    #[arg(short = 'f', long = "file", value_name = "PATH", required = true)]
    file: PathBuf,

    /// Serial port name prefix to search under /dev [default: ttyUSB].
    #[arg(short = 's', long, value_name = "PREFIX", env = "N76FLASH_SEARCH")]
    search: Option<String>,

    /// Serial port to use (skips discovery), e.g. ttyUSB0 or /dev/ttyACM0.
    #[arg(short = 'p', long, value_name = "PORT", env = "N76FLASH_PORT")]
    port: Option<String>,

    /// Number of connection tries [default: 25].
    #[arg(short = 't', long, value_name = "N", env = "N76FLASH_TRIES")]
    tries: Option<u32>,

    /// Timeout for the erase acknowledgment, in milliseconds [default: 5000].
    #[arg(long, value_name = "MS")]
    erase_timeout: Option<u64>,

    /// Tell the device to reset when programming is aborted.
    #[arg(long)]
    reset_on_abort: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, env = "N76FLASH_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
}

/// Long options that are also accepted with a single dash.
const LEGACY_LONG_OPTIONS: &[&str] = &["file", "search", "port", "tries", "help"];

/// Rewrite single-dash long options (`-file`) to their GNU form (`--file`).
fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| match arg.strip_prefix('-') {
            Some(name) if LEGACY_LONG_OPTIONS.contains(&name) => format!("-{arg}"),
            _ => arg,
        })
        .collect()
}

fn main() {
    let args = normalize_legacy_args(env::args());

    // No arguments at all: show help, like -h
    if args.len() <= 1 {
        let _ = Cli::command().print_help();
        std::process::exit(0);
    }

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        },
    };

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "n76flash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Could not install Ctrl-C handler: {e}");
    }
    n76flash::set_interrupt_checker(was_interrupted);

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    commands::flash::cmd_flash(cli, &config)
}
