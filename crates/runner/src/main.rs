use aegis_clock::SystemClock;
use aegis_runner::{Autopilot, AutopilotConfig, LogAction, load_config, load_default_config};
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "Usage: aegis [--config <PATH>]";

fn parse_config() -> Result<Option<AutopilotConfig>, String> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                path = Some(args.next().ok_or("--config needs a path")?);
            }
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    let config = match path {
        Some(path) => load_config(&path),
        None => load_default_config(),
    };
    config.map(Some).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match parse_config() {
        Ok(Some(config)) => config,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };

    let autopilot = match Autopilot::build(config, Arc::new(SystemClock::new()), LogAction::all()) {
        Ok(autopilot) => autopilot,
        Err(e) => {
            error!("Failed to build autopilot: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = autopilot.start().await {
        error!("Failed to start autopilot: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
    }
    info!("Shutting down");
    autopilot.shutdown();

    match serde_json::to_string_pretty(&autopilot.status().await) {
        Ok(status) => info!("Final status:\n{}", status),
        Err(e) => error!("Failed to render status: {}", e),
    }
    ExitCode::SUCCESS
}
