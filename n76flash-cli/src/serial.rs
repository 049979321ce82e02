//! Serial port selection.
//!
//! An explicit port (CLI, environment or config file) is used as given.
//! Otherwise `/dev` is scanned for devices matching the search prefix:
//! a single match is picked automatically, several matches are offered in
//! an interactive menu (or rejected in non-interactive mode).

use {
    crate::config::Config,
    anyhow::{Result, anyhow, bail},
    console::style,
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, info},
    n76flash::{DetectedPort, auto_detect_port, discover_ports, resolve_port_path},
    std::{io::IsTerminal, path::PathBuf},
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI or environment.
    pub port: Option<String>,
    /// Device name prefix used for discovery.
    pub search: String,
    /// Non-interactive mode (fail if multiple ports).
    pub non_interactive: bool,
}

/// Select the serial port to flash through.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<PathBuf> {
    // If port explicitly specified, use it
    if let Some(port_name) = &options.port {
        return Ok(resolve_port_path(port_name));
    }

    // If port in config, use it
    if let Some(port_name) = &config
        .connection
        .port
    {
        debug!("Using port from config: {port_name}");
        return Ok(resolve_port_path(port_name));
    }

    match auto_detect_port(&options.search) {
        Ok(port) => {
            info!("Auto-selected port: {}", port.name);
            Ok(port.path)
        },
        // Several matches: let the user pick one
        Err(n76flash::Error::Config(_)) if !options.non_interactive => {
            let ports = discover_ports(&options.search)
                .map_err(|e| anyhow!("could not scan for serial ports: {e}"))?;
            ensure_interactive_terminal(&ports)?;
            select_port_interactive(ports)
        },
        Err(e) => Err(e.into()),
    }
}

fn port_names(ports: &[DetectedPort]) -> Vec<&str> {
    ports
        .iter()
        .map(|p| p.name.as_str())
        .collect()
}

fn ensure_interactive_terminal(ports: &[DetectedPort]) -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        bail!(
            "multiple serial ports found ({}) and no terminal to choose from, specify one with --port",
            port_names(ports).join(", ")
        )
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                anyhow!("port selection cancelled")
            } else {
                anyhow!("port selection prompt failed: {io_err}")
            }
        },
    }
}

/// Interactive port selection.
fn select_port_interactive(ports: Vec<DetectedPort>) -> Result<PathBuf> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    let labels: Vec<String> = ports
        .iter()
        .map(|port| {
            format!(
                "{} {}",
                style(&port.name).bold(),
                style(port.path.display()).dim()
            )
        })
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .into_iter()
            .nth(index)
            .map(|port| port.path)
            .ok_or_else(|| anyhow!("Invalid port index: {index}")),
        None => bail!("port selection cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(name: &str) -> DetectedPort {
        DetectedPort {
            name: name.to_string(),
            path: PathBuf::from(format!("/dev/{name}")),
        }
    }

    #[test]
    fn test_port_names() {
        let ports = vec![detected("ttyUSB0"), detected("ttyUSB1")];
        assert_eq!(port_names(&ports), ["ttyUSB0", "ttyUSB1"]);
    }

    #[test]
    fn test_explicit_port_wins() {
        let mut config = Config::default();
        config.connection.port = Some("ttyACM3".to_string());
        let options = SerialOptions {
            port: Some("/dev/ttyUSB7".to_string()),
            search: "n76flash-no-such-prefix".to_string(),
            non_interactive: true,
        };

        let path = select_serial_port(&options, &config).unwrap();
        assert_eq!(path, PathBuf::from("/dev/ttyUSB7"));
    }

    #[cfg(unix)]
    #[test]
    fn test_config_port_used_without_cli_port() {
        let mut config = Config::default();
        config.connection.port = Some("ttyACM3".to_string());
        let options = SerialOptions {
            port: None,
            search: "n76flash-no-such-prefix".to_string(),
            non_interactive: true,
        };

        let path = select_serial_port(&options, &config).unwrap();
        assert_eq!(path, PathBuf::from("/dev/ttyACM3"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_single_match_is_auto_selected() {
        // /dev/null is the only character device named "null*"
        let options = SerialOptions {
            port: None,
            search: "null".to_string(),
            non_interactive: true,
        };

        let path = select_serial_port(&options, &Config::default()).unwrap();
        assert_eq!(path, PathBuf::from("/dev/null"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_discovery_without_matches_fails() {
        let options = SerialOptions {
            port: None,
            search: "n76flash-no-such-prefix".to_string(),
            non_interactive: false,
        };
        let err = select_serial_port(&options, &Config::default()).unwrap_err();
        assert!(
            err.to_string()
                .contains("no serial port matching /dev/n76flash-no-such-prefix*")
        );
    }
}
