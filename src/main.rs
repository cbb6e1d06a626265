use clap::Parser;
use log::{error, info};

use std::process;

use crate::cli::Opt;

mod cli;

fn main() {
    let opt = Opt::parse();
    env_logger::builder()
        .filter_level(opt.log_level())
        .parse_default_env()
        .init();

    let config = match opt.to_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    info!("pwmfan {}", pwmfan::VERSION);
    info!(
        "Using pwmchip{}/pwm{}, period {} ns",
        config.chip, config.channel, config.period_ns
    );
    if config.full_speed_override {
        info!("Temperature monitoring disabled, fan runs at full speed");
    } else {
        info!(
            "Controller {} on thermal zone '{}': off <= {}, on >= {}, low {}, high {}",
            config.controller_kind,
            config.monitored_device_pattern,
            config.temp_off,
            config.temp_on,
            config.temp_low,
            config.temp_high
        );
    }

    let (sender, receiver) = pwmfan::halt::make_pair();
    if let Err(e) = sender.hook_termination_signals() {
        error!("{}", e);
        process::exit(1);
    }

    match pwmfan::run(&config, &receiver) {
        Ok(()) => info!("Exiting"),
        Err(e) => {
            error!("Fan control failed: {}", e);
            process::exit(1);
        }
    }
}
