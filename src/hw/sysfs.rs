//! PWM channel exposed through the Linux `pwm` sysfs class.

use super::{Hardware, Polarity, PwmChannelState};
use crate::error::HardwareError;
use crate::sensor::{self, Temperature, ThermalZone};

use log::{debug, info, warn};

use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Default location of PWM chips
pub const PWM_CLASS_PATH: &str = "/sys/class/pwm";

/// How many times to look for the channel directory after export
const EXPORT_POLL_COUNT: usize = 20;
/// Delay between looks
const EXPORT_POLL_DELAY: Duration = Duration::from_millis(50);

pub struct SysfsPwm {
    chip_path: PathBuf,
    channel: u32,
    channel_path: PathBuf,
    zone: Option<ThermalZone>,
}

impl SysfsPwm {
    /// Bind `pwmchip<chip>/pwm<channel>`. Temperature is read from the thermal zone matching
    /// `pattern`; no pattern means no sensor (fan runs at full speed).
    pub fn new(chip: u32, channel: u32, pattern: Option<&str>) -> Self {
        Self::with_roots(
            PWM_CLASS_PATH,
            sensor::THERMAL_CLASS_PATH,
            chip,
            channel,
            pattern,
        )
    }

    pub fn with_roots<P, Q>(
        pwm_root: P,
        thermal_root: Q,
        chip: u32,
        channel: u32,
        pattern: Option<&str>,
    ) -> Self
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let chip_path = pwm_root.as_ref().join(format!("pwmchip{}", chip));
        let channel_path = chip_path.join(format!("pwm{}", channel));
        let zone = pattern.and_then(|pattern| {
            let zone = ThermalZone::find(thermal_root.as_ref(), pattern);
            match &zone {
                Some(zone) => info!(
                    "Monitoring temperature of {} ({})",
                    zone.name(),
                    zone.kind()
                ),
                None => warn!("No thermal zone matches {:?}", pattern),
            }
            zone
        });

        Self {
            chip_path,
            channel,
            channel_path,
            zone,
        }
    }

    pub fn channel_path(&self) -> &Path {
        &self.channel_path
    }

    fn write_file<V: Display>(path: &Path, value: V) -> Result<(), HardwareError> {
        let value = value.to_string();
        debug!("Writing {} to {}", value, path.display());
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_attr<V: Display>(&self, name: &str, value: V) -> Result<(), HardwareError> {
        Self::write_file(&self.channel_path.join(name), value)
    }

    fn read_attr(&self, name: &str) -> Result<String, HardwareError> {
        Ok(fs::read_to_string(self.channel_path.join(name))?
            .trim()
            .to_string())
    }

    fn read_number(&self, name: &str) -> Result<u64, HardwareError> {
        self.read_attr(name)?
            .parse::<u64>()
            .map_err(|_| HardwareError::InvalidValue)
    }
}

impl Hardware for SysfsPwm {
    fn is_exported(&self) -> bool {
        self.channel_path.is_dir()
    }

    fn export(&mut self) -> Result<(), HardwareError> {
        Self::write_file(&self.chip_path.join("export"), self.channel)?;
        // the channel directory is created asynchronously by the kernel
        for _ in 0..EXPORT_POLL_COUNT {
            if self.is_exported() {
                return Ok(());
            }
            thread::sleep(EXPORT_POLL_DELAY);
        }
        Err(HardwareError::Unknown(format!(
            "{} did not appear after export",
            self.channel_path.display()
        )))
    }

    fn unexport(&mut self) -> Result<(), HardwareError> {
        Self::write_file(&self.chip_path.join("unexport"), self.channel)
    }

    fn set_enable(&mut self, enable: bool) -> Result<(), HardwareError> {
        self.write_attr("enable", if enable { 1 } else { 0 })
    }

    fn set_period(&mut self, ns: u64) -> Result<(), HardwareError> {
        self.write_attr("period", ns)
    }

    fn set_duty_cycle(&mut self, ns: u64) -> Result<(), HardwareError> {
        self.write_attr("duty_cycle", ns)
    }

    fn set_polarity(&mut self, polarity: Polarity) -> Result<(), HardwareError> {
        self.write_attr("polarity", polarity)
    }

    fn read_state(&self) -> Result<PwmChannelState, HardwareError> {
        Ok(PwmChannelState {
            period: self.read_number("period")?,
            duty_cycle: self.read_number("duty_cycle")?,
            enabled: self.read_number("enable")? != 0,
            polarity: self.read_attr("polarity")?.parse()?,
        })
    }

    fn read_max_supported_duty_cycle(&self) -> Result<u64, HardwareError> {
        self.read_number("period")
    }

    fn read_temperature(&mut self) -> Option<Temperature> {
        let zone = self.zone.as_ref()?;
        match zone.read() {
            Ok(temperature) => Some(temperature),
            Err(e) => {
                warn!("Cannot read temperature of {}: {}", zone.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    /// Build `pwmchip0` with `export`/`unexport` and optionally an exported `pwm0`
    fn fake_chip(root: &Path, exported: bool) {
        let chip = root.join("pwm/pwmchip0");
        fs::create_dir_all(&chip).unwrap();
        fs::write(chip.join("export"), "").unwrap();
        fs::write(chip.join("unexport"), "").unwrap();
        if exported {
            let channel = chip.join("pwm0");
            fs::create_dir_all(&channel).unwrap();
            fs::write(channel.join("enable"), "1\n").unwrap();
            fs::write(channel.join("period"), "25000000\n").unwrap();
            fs::write(channel.join("duty_cycle"), "12500000\n").unwrap();
            fs::write(channel.join("polarity"), "normal\n").unwrap();
        }
        let zone = root.join("thermal/thermal_zone0");
        fs::create_dir_all(&zone).unwrap();
        fs::write(zone.join("type"), "cpu-thermal\n").unwrap();
        fs::write(zone.join("temp"), "47250\n").unwrap();
    }

    fn open(root: &Path, pattern: Option<&str>) -> SysfsPwm {
        SysfsPwm::with_roots(root.join("pwm"), root.join("thermal"), 0, 0, pattern)
    }

    #[test]
    fn test_read_state() {
        let root = TempDir::new().unwrap();
        fake_chip(root.path(), true);
        let pwm = open(root.path(), None);

        assert!(pwm.is_exported());
        assert_eq!(
            pwm.read_state().unwrap(),
            PwmChannelState {
                period: 25_000_000,
                duty_cycle: 12_500_000,
                enabled: true,
                polarity: Polarity::Normal,
            }
        );
        assert_eq!(pwm.read_max_supported_duty_cycle().unwrap(), 25_000_000);
    }

    #[test]
    fn test_writes() {
        let root = TempDir::new().unwrap();
        fake_chip(root.path(), true);
        let mut pwm = open(root.path(), None);

        pwm.set_enable(false).unwrap();
        pwm.set_period(20_000_000).unwrap();
        pwm.set_duty_cycle(5_000_000).unwrap();
        pwm.set_polarity(Polarity::Inverted).unwrap();

        let channel = pwm.channel_path().to_path_buf();
        assert_eq!(fs::read_to_string(channel.join("enable")).unwrap(), "0");
        assert_eq!(
            fs::read_to_string(channel.join("period")).unwrap(),
            "20000000"
        );
        assert_eq!(
            fs::read_to_string(channel.join("duty_cycle")).unwrap(),
            "5000000"
        );
        assert_eq!(
            fs::read_to_string(channel.join("polarity")).unwrap(),
            "inversed"
        );
    }

    #[test]
    fn test_export_and_unexport() {
        let root = TempDir::new().unwrap();
        fake_chip(root.path(), true);
        let mut pwm = open(root.path(), None);

        pwm.export().unwrap();
        pwm.unexport().unwrap();
        let chip = root.path().join("pwm/pwmchip0");
        assert_eq!(fs::read_to_string(chip.join("export")).unwrap(), "0");
        assert_eq!(fs::read_to_string(chip.join("unexport")).unwrap(), "0");
    }

    #[test]
    fn test_export_channel_never_appears() {
        let root = TempDir::new().unwrap();
        fake_chip(root.path(), false);
        let mut pwm = open(root.path(), None);

        assert!(!pwm.is_exported());
        match pwm.export() {
            Err(HardwareError::Unknown(_)) => (),
            other => panic!("unexpected export result {:?}", other),
        }
    }

    #[test]
    fn test_missing_attribute() {
        let root = TempDir::new().unwrap();
        fake_chip(root.path(), false);
        let mut pwm = open(root.path(), None);

        // attributes are never created by a write
        assert!(pwm.set_duty_cycle(1).is_err());
        assert!(!pwm.channel_path().join("duty_cycle").exists());
    }

    #[test]
    fn test_temperature() {
        let root = TempDir::new().unwrap();
        fake_chip(root.path(), true);

        assert_eq!(open(root.path(), Some("cpu")).read_temperature(), Some(47));
        assert_eq!(open(root.path(), Some("gpu")).read_temperature(), None);
        assert_eq!(open(root.path(), None).read_temperature(), None);
    }
}
