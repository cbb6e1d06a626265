//! Temperature driven fan control for single-board computers.
//!
//! The fan is attached to a PWM channel exported through sysfs. After a full speed warmup the
//! [`monitor::Monitor`] samples the chip temperature every interval and adjusts the duty cycle
//! until a termination signal arrives; the channel is then stopped and released.

pub mod config;
pub mod error;
pub mod fan;
pub mod halt;
pub mod hw;
pub mod monitor;
pub mod sensor;

use crate::config::Config;
use crate::hw::{sysfs::SysfsPwm, Hardware};

use log::info;

pub static VERSION: &str = env!("CARGO_PKG_VERSION");

/// Control the fan described by `config` on the real sysfs PWM channel until `halt` fires
pub fn run(config: &Config, halt: &halt::Receiver) -> error::Result<()> {
    let pattern = if config.monitoring_enabled() {
        Some(config.monitored_device_pattern.as_str())
    } else {
        None
    };
    run_with(
        SysfsPwm::new(config.chip, config.channel, pattern),
        config,
        halt,
    )
}

/// Startup, control loop and shutdown on any hardware. Shutdown also runs when startup fails.
pub fn run_with<H: Hardware>(hw: H, config: &Config, halt: &halt::Receiver) -> error::Result<()> {
    config.validate()?;

    let mut fan = fan::Control::new(hw, fan::Settings::from_config(config));
    // on error `fan` is dropped, which shuts it down
    let startup = fan.start(halt)?;

    if !halt.is_halted() {
        let controller = fan::controller(config, startup.warmup_temperature);
        let mut monitor = monitor::Monitor::new(config, startup.bounds, controller);
        monitor.run(&mut fan, halt);
    }

    fan.shutdown();
    info!("Fan controller stopped");
    Ok(())
}
