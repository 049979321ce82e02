//! Flash command implementation.

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use n76flash::{
    DEFAULT_MAX_TRIES, DEFAULT_SEARCH_PREFIX, FirmwareImage, Response, Session, SessionConfig,
    SessionEvent, SessionState, Transport,
};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::serial::{SerialOptions, select_serial_port};
use crate::{Cli, use_fancy_output, was_interrupted};

fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        bail!("interrupted")
    } else {
        Ok(())
    }
}

/// Build the session settings from CLI flags, falling back to the config file.
fn session_config(cli: &Cli, config: &Config) -> SessionConfig {
    let mut session = SessionConfig::default()
        .with_max_tries(
            cli.tries
                .or(config.flash.tries)
                .unwrap_or(DEFAULT_MAX_TRIES),
        )
        .with_reset_on_abort(
            cli.reset_on_abort
                || config
                    .flash
                    .reset_on_abort
                    .unwrap_or(false),
        );

    if let Some(ms) = cli
        .erase_timeout
        .or(config.flash.erase_timeout_ms)
    {
        session = session.with_erase_timeout(Duration::from_millis(ms));
    }
    session
}

/// Port selection settings from CLI flags and the config file.
fn serial_options(cli: &Cli, config: &Config) -> SerialOptions {
    SerialOptions {
        port: cli.port.clone(),
        search: cli
            .search
            .clone()
            .or_else(|| {
                config
                    .connection
                    .search
                    .clone()
            })
            .unwrap_or_else(|| DEFAULT_SEARCH_PREFIX.to_string()),
        non_interactive: cli.non_interactive,
    }
}

fn new_progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(100);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

fn load_image(cli: &Cli, path: &Path) -> Result<FirmwareImage> {
    if !cli.quiet {
        eprintln!(
            "{} Loading firmware {}",
            style("📦").cyan(),
            path.display()
        );
    }

    let image = FirmwareImage::from_file(path)
        .with_context(|| format!("failed to load firmware {}", path.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} {} bytes, {} blocks",
            style("ℹ").blue(),
            image.len(),
            image.block_count()
        );
    }
    Ok(image)
}

/// Status line for an unanswered handshake probe.
fn probe_status(attempt: u32, response: &Response) -> String {
    format!("Try {}... {response}", attempt.saturating_add(1))
}

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &Config) -> Result<()> {
    let image = load_image(cli, &cli.file)?;

    let port = select_serial_port(&serial_options(cli, config), config)?;
    let port_name = port
        .to_string_lossy()
        .into_owned();
    if !cli.quiet {
        eprintln!("{} Using port {port_name}", style("🔌").cyan());
    }

    let transport = Transport::open(&port_name).with_context(|| {
        format!("cannot open {port_name} (check that it exists and that you may access it, e.g. membership of the dialout group)")
    })?;
    ensure_not_interrupted()?;

    let settings = session_config(cli, config);
    debug!("Session settings: {settings:?}");

    let pb = new_progress_bar(cli.quiet);
    let quiet = cli.quiet;
    let mut session = Session::new(transport, &image, settings);

    let result = session.run(|event| match event {
        SessionEvent::State(SessionState::Handshaking) if !quiet => {
            eprintln!(
                "{} Waiting for bootloader, reset the microcontroller now...",
                style("⏳").yellow()
            );
        },
        SessionEvent::ProbeFailed { attempt, response } => {
            if quiet {
                debug!("Try {attempt}: {response}");
            } else {
                eprintln!("  {}", probe_status(*attempt, response));
            }
        },
        SessionEvent::State(SessionState::Erasing) if !quiet => {
            eprintln!("{} Connected, erasing flash", style("✓").green());
        },
        SessionEvent::State(SessionState::Programming) => {
            pb.set_message("Writing");
        },
        SessionEvent::Block(progress) => {
            pb.set_position(u64::from(progress.percent));
        },
        SessionEvent::State(SessionState::Finalizing) => {
            pb.finish_with_message("Complete");
            if !quiet {
                eprintln!("{} Resetting device", style("🔄").cyan());
            }
        },
        _ => {},
    });

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            pb.abandon();
            ensure_not_interrupted()?;
            return Err(err).context("flashing failed");
        },
    };

    if !cli.quiet {
        eprintln!(
            "\n{} Flashing completed: {} bytes in {} blocks ({:.1}s)",
            style("🎉").green().bold(),
            report.bytes,
            report.blocks,
            report
                .elapsed
                .as_secs_f64()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["n76flash", "--file", "fw.bin"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_session_config_defaults() {
        let settings = session_config(&cli(&[]), &Config::default());
        assert_eq!(settings, SessionConfig::default());
        assert_eq!(settings.max_tries, DEFAULT_MAX_TRIES);
    }

    #[test]
    fn test_session_config_from_file() {
        let mut config = Config::default();
        config.flash.tries = Some(7);
        config.flash.erase_timeout_ms = Some(2500);
        config.flash.reset_on_abort = Some(true);

        let settings = session_config(&cli(&[]), &config);
        assert_eq!(settings.max_tries, 7);
        assert_eq!(settings.erase_timeout, Duration::from_millis(2500));
        assert!(settings.reset_on_abort);
    }

    #[test]
    fn test_cli_flags_override_config() {
        let mut config = Config::default();
        config.flash.tries = Some(7);
        config.flash.erase_timeout_ms = Some(2500);

        let settings = session_config(
            &cli(&["--tries", "3", "--erase-timeout", "400"]),
            &config,
        );
        assert_eq!(settings.max_tries, 3);
        assert_eq!(settings.erase_timeout, Duration::from_millis(400));
    }

    #[test]
    fn test_reset_on_abort_disabled_by_config() {
        let mut config = Config::default();
        config.flash.reset_on_abort = Some(false);
        assert!(!session_config(&cli(&[]), &config).reset_on_abort);

        // The flag only ever turns it on
        assert!(session_config(&cli(&["--reset-on-abort"]), &config).reset_on_abort);
    }

    #[test]
    fn test_probe_status_counts_from_one() {
        assert_eq!(probe_status(0, &Response::Timeout), "Try 1... no response");
        assert_eq!(
            probe_status(4, &Response::Spurious(0x41)),
            "Try 5... unexpected byte 0x41"
        );
    }

    #[test]
    fn test_serial_options_search_precedence() {
        let mut config = Config::default();
        assert_eq!(
            serial_options(&cli(&[]), &config).search,
            DEFAULT_SEARCH_PREFIX
        );

        config.connection.search = Some("ttyS".to_string());
        assert_eq!(serial_options(&cli(&[]), &config).search, "ttyS");
        assert_eq!(
            serial_options(&cli(&["--search", "ttyACM"]), &config).search,
            "ttyACM"
        );
    }

    #[test]
    fn test_load_image_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let err = load_image(&cli(&["-q"]), &path).unwrap_err();
        assert!(format!("{err:#}").contains("empty"));
    }

    #[test]
    fn test_load_image_missing_file() {
        let path = PathBuf::from("/nonexistent/n76flash/fw.bin");
        assert!(load_image(&cli(&["-q"]), &path).is_err());
    }
}
