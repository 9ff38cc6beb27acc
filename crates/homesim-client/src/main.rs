//! homesim CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use homesim_client::cli::{Cli, Command, ConfigAction, Device};
use homesim_client::commands;
use homesim_client::config::ClientConfig;
use homesim_client::error::ClientResult;
use homesim_core::devices::{AirPurifier, RoomAirConditioner, Window};
use homesim_core::{TracingConfig, init_tracing};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        let config = TracingConfig::cli_debug();
        let directive = config.default_directive();
        config.with_env_filter(directive)
    } else if matches!(cli.command, Command::Serve { .. }) {
        TracingConfig::default()
    } else {
        TracingConfig::default().with_level(Level::WARN)
    };
    if let Err(e) = init_tracing(tracing.with_format(cli.log_format)) {
        eprintln!("warning: {}", e);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one command. `Ok(false)` means a device call returned a non-OK
/// status, which was already printed.
fn run(cli: Cli) -> ClientResult<bool> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    if let Some(host) = cli.host {
        config.endpoint.host = host;
    }
    if let Some(port) = cli.port {
        config.endpoint.port = port;
    }

    match cli.command {
        Command::Serve { bind, commissioned } => {
            commands::serve::run(bind, commissioned)?;
            Ok(true)
        }
        Command::Get { device, method } => {
            let method = method.as_deref();
            match device {
                Device::AirPurifier => commands::device::get::<AirPurifier>(&config, method),
                Device::RoomAirConditioner => {
                    commands::device::get::<RoomAirConditioner>(&config, method)
                }
                Device::Window => commands::device::get::<Window>(&config, method),
            }
        }
        Command::Set {
            device,
            state,
            method,
        } => {
            let method = method.as_deref();
            match device {
                Device::AirPurifier => {
                    commands::device::set::<AirPurifier>(&config, &state, method)
                }
                Device::RoomAirConditioner => {
                    commands::device::set::<RoomAirConditioner>(&config, &state, method)
                }
                Device::Window => commands::device::set::<Window>(&config, &state, method),
            }
        }
        Command::Watch {
            device,
            interval_ms,
            count,
        } => match device {
            Device::AirPurifier => {
                commands::device::watch::<AirPurifier>(&config, interval_ms, count)
            }
            Device::RoomAirConditioner => {
                commands::device::watch::<RoomAirConditioner>(&config, interval_ms, count)
            }
            Device::Window => commands::device::watch::<Window>(&config, interval_ms, count),
        },
        Command::Init { device } => match device {
            Device::AirPurifier => commands::device::init::<AirPurifier>(&config),
            Device::RoomAirConditioner => commands::device::init::<RoomAirConditioner>(&config),
            Device::Window => commands::device::init::<Window>(&config),
        },
        Command::Config { action } => {
            match action {
                ConfigAction::Dump => commands::config::dump(&config)?,
                ConfigAction::Validate => commands::config::validate(&config)?,
                ConfigAction::Path => commands::config::path()?,
            }
            Ok(true)
        }
    }
}
