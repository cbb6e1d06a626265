use pwmfan::config::{Config, ControllerKind};
use pwmfan::error::{self, ErrorKind};

use clap::Parser;
use log::LevelFilter;

use std::path::PathBuf;

/// Longest accepted sampling interval and warmup
const MAX_SECONDS: u64 = 3600;
/// Largest accepted thermal window
const MAX_WINDOW_CAPACITY: usize = 120;
/// Longest accepted PWM period (1 s)
const MAX_PERIOD_NS: u64 = 1_000_000_000;

#[derive(Parser, Debug)]
#[clap(
    name = "pwmfan",
    version,
    about = "Drives a PWM fan according to the chip temperature"
)]
pub struct Opt {
    /// TOML file with options; command line flags take precedence
    #[clap(short = 'c', long, value_name = "FILE", parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Number of the PWM chip (pwmchipN)
    #[clap(long)]
    pub chip: Option<u32>,

    /// Number of the PWM channel on the chip (pwmN)
    #[clap(long)]
    pub channel: Option<u32>,

    /// Seconds at full speed before regulation starts
    #[clap(long, value_name = "SECONDS")]
    pub startup: Option<u64>,

    /// Seconds between two temperature samples [1-3600]
    #[clap(short = 'i', long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Substring of the thermal zone type to monitor
    #[clap(short = 'd', long, value_name = "PATTERN")]
    pub device: Option<String>,

    /// Number of samples averaged by the controller [2-120]
    #[clap(long, value_name = "SAMPLES")]
    pub window: Option<usize>,

    /// At or below: minimal duty cycle
    #[clap(long, value_name = "CELSIUS", allow_hyphen_values = true)]
    pub temp_low: Option<i64>,

    /// At or above: maximal duty cycle
    #[clap(long, value_name = "CELSIUS", allow_hyphen_values = true)]
    pub temp_high: Option<i64>,

    /// At or below: fan off
    #[clap(long, value_name = "CELSIUS", allow_hyphen_values = true)]
    pub temp_off: Option<i64>,

    /// At or above: fan regulated (must be above --temp-off)
    #[clap(long, value_name = "CELSIUS", allow_hyphen_values = true)]
    pub temp_on: Option<i64>,

    /// Minimal duty cycle in percent of the maximum [0-49]
    #[clap(long, value_name = "PERCENT")]
    pub duty_min: Option<u8>,

    /// Maximal duty cycle in percent of the maximum [50-100]
    #[clap(long, value_name = "PERCENT")]
    pub duty_max: Option<u8>,

    /// PWM period in nanoseconds [1-1000000000]
    #[clap(long, value_name = "NS")]
    pub period: Option<u64>,

    /// Duty cycle algorithm: logistic or pid
    #[clap(long, value_name = "KIND")]
    pub controller: Option<ControllerKind>,

    /// Ignore the temperature and keep the fan at full speed
    #[clap(long)]
    pub full_speed: bool,

    /// PID proportional gain (ns per degree)
    #[clap(long, allow_hyphen_values = true)]
    pub kp: Option<f64>,

    /// PID integral gain (ns per degree)
    #[clap(long, allow_hyphen_values = true)]
    pub ki: Option<f64>,

    /// PID derivative gain (ns per degree)
    #[clap(long, allow_hyphen_values = true)]
    pub kd: Option<f64>,

    /// PID target temperature (default: warmup temperature + 5)
    #[clap(long, value_name = "CELSIUS", allow_hyphen_values = true)]
    pub ideal_temp: Option<i64>,

    /// More output (-v debug, -vv trace)
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: u64,

    /// Only report errors
    #[clap(short, long)]
    pub quiet: bool,
}

impl Opt {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Merge the configuration file (if any) with command line flags and validate the result
    pub fn to_config(&self) -> error::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        macro_rules! set {
            ($opt:ident, $config:ident; $($field:ident <- $flag:ident),* $(,)?) => {
                $(if let Some(value) = $opt.$flag.clone() {
                    $config.$field = value;
                })*
            };
        }
        let opt = self;
        set!(
            opt, config;
            chip <- chip,
            channel <- channel,
            startup_seconds <- startup,
            loop_interval_seconds <- interval,
            monitored_device_pattern <- device,
            window_capacity <- window,
            temp_low <- temp_low,
            temp_high <- temp_high,
            temp_off <- temp_off,
            temp_on <- temp_on,
            duty_min_percent <- duty_min,
            duty_max_percent <- duty_max,
            period_ns <- period,
            controller_kind <- controller,
            pid_kp <- kp,
            pid_ki <- ki,
            pid_kd <- kd,
        );
        if self.ideal_temp.is_some() {
            config.pid_ideal_temp = self.ideal_temp;
        }
        if self.full_speed {
            config.full_speed_override = true;
        }

        check_ranges(&config)?;
        config.validate()?;
        Ok(config)
    }
}

fn check_ranges(config: &Config) -> error::Result<()> {
    if !(1..=MAX_SECONDS).contains(&config.loop_interval_seconds) {
        return Err(ErrorKind::Config(format!(
            "interval must be within 1..={} seconds",
            MAX_SECONDS
        ))
        .into());
    }
    if config.startup_seconds > MAX_SECONDS {
        return Err(ErrorKind::Config(format!(
            "startup must be at most {} seconds",
            MAX_SECONDS
        ))
        .into());
    }
    if config.period_ns > MAX_PERIOD_NS {
        return Err(ErrorKind::Config(format!(
            "period must be at most {} ns",
            MAX_PERIOD_NS
        ))
        .into());
    }
    if config.window_capacity > MAX_WINDOW_CAPACITY {
        return Err(ErrorKind::Config(format!(
            "window must hold at most {} samples",
            MAX_WINDOW_CAPACITY
        ))
        .into());
    }
    Ok(())
}
