//! Host-side utilities for serial port discovery.
//!
//! USB-UART bridges show up as character devices under `/dev` with a
//! driver-specific prefix (`ttyUSB` for CH340/CP210x/FTDI, `ttyACM` for CDC
//! devices). Discovery lists the devices matching a prefix; choosing between
//! several is left to the caller.

use crate::error::{Error, Result};
use log::{debug, trace};
use std::path::{Path, PathBuf};

/// Directory scanned for serial devices.
pub const DEVICE_DIR: &str = "/dev";

/// Default device name prefix.
pub const DEFAULT_SEARCH_PREFIX: &str = "ttyUSB";

/// A serial device found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPort {
    /// Device name (e.g., "ttyUSB0").
    pub name: String,
    /// Full device path (e.g., "/dev/ttyUSB0").
    pub path: PathBuf,
}

/// Discover serial devices under `/dev` whose names start with `prefix`.
pub fn discover_ports(prefix: &str) -> Result<Vec<DetectedPort>> {
    discover_ports_in(Path::new(DEVICE_DIR), prefix)
}

/// Discover character devices in `dir` whose names start with `prefix`,
/// sorted by name.
pub fn discover_ports_in(dir: &Path, prefix: &str) -> Result<Vec<DetectedPort>> {
    let mut ports = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry
            .file_name()
            .to_str()
            .map(str::to_owned)
        else {
            continue;
        };

        if !name.starts_with(prefix) {
            continue;
        }
        if !is_char_device(&entry) {
            trace!("Skipping {name}: not a character device");
            continue;
        }

        ports.push(DetectedPort {
            path: entry.path(),
            name,
        });
    }

    ports.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
    });
    debug!(
        "Found {} port(s) matching {}/{prefix}*",
        ports.len(),
        dir.display()
    );
    Ok(ports)
}

#[cfg(unix)]
fn is_char_device(entry: &std::fs::DirEntry) -> bool {
    use std::os::unix::fs::FileTypeExt;

    entry
        .file_type()
        .is_ok_and(|t| t.is_char_device())
}

#[cfg(not(unix))]
fn is_char_device(_entry: &std::fs::DirEntry) -> bool {
    true
}

/// Auto-detect the single port matching `prefix`.
///
/// Fails when no port or more than one port matches.
pub fn auto_detect_port(prefix: &str) -> Result<DetectedPort> {
    let mut ports = discover_ports(prefix)?;
    match ports.len() {
        0 => Err(Error::DeviceNotFound(format!(
            "no serial port matching {DEVICE_DIR}/{prefix}*"
        ))),
        1 => Ok(ports.remove(0)),
        _ => {
            let names: Vec<_> = ports
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            Err(Error::Config(format!(
                "multiple serial ports found ({}), specify one with --port",
                names.join(", ")
            )))
        },
    }
}

/// Resolve a user-supplied port name to a device path.
///
/// Bare names such as `ttyUSB0` are taken relative to `/dev`; anything with
/// a path separator is used as given, as is every name on non-Unix hosts
/// (`COM3`).
pub fn resolve_port_path(name: &str) -> PathBuf {
    if cfg!(not(unix)) || name.contains('/') || name.contains('\\') {
        PathBuf::from(name)
    } else {
        Path::new(DEVICE_DIR).join(name)
    }
}
