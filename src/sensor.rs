//! Chip temperature readout from the kernel thermal class.

use log::{debug, warn};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Temperature sample in whole degrees Celsius
pub type Temperature = i64;

/// Default location of thermal zones
pub const THERMAL_CLASS_PATH: &str = "/sys/class/thermal";

/// Convert raw milli-degree reading to degrees. Truncates, does not round.
pub fn from_millidegrees(raw: i64) -> Temperature {
    raw / 1000
}

fn parse_millidegrees(text: &str) -> io::Result<Temperature> {
    text.trim()
        .parse::<i64>()
        .map(from_millidegrees)
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("cannot parse temperature {:?}: {}", text.trim(), e),
            )
        })
}

/// One thermal zone selected by matching its `type`
#[derive(Debug, Clone)]
pub struct ThermalZone {
    name: String,
    kind: String,
    temp_path: PathBuf,
}

impl ThermalZone {
    /// Look for the first `thermal_zone*` under `root` whose type contains `pattern`
    /// (case-insensitive). Zones are visited in name order.
    pub fn find<P: AsRef<Path>>(root: P, pattern: &str) -> Option<Self> {
        let root = root.as_ref();
        let pattern = pattern.to_lowercase();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list thermal zones in {}: {}", root.display(), e);
                return None;
            }
        };

        let mut zones = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| name.starts_with("thermal_zone"))
            })
            .collect::<Vec<PathBuf>>();
        zones.sort();

        for zone in zones {
            let kind = match fs::read_to_string(zone.join("type")) {
                Ok(kind) => kind.trim().to_string(),
                Err(_) => continue,
            };
            debug!("Found thermal zone {} of type {}", zone.display(), kind);
            if kind.to_lowercase().contains(&pattern) {
                return Some(Self {
                    name: zone
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    kind,
                    temp_path: zone.join("temp"),
                });
            }
        }
        None
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn read(&self) -> io::Result<Temperature> {
        parse_millidegrees(&fs::read_to_string(&self.temp_path)?)
    }
}
