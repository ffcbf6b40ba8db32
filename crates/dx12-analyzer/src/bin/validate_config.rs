//! Configuration checking tool
//!
//! Loads a YAML configuration, validates it the same way an analyzer run does,
//! and prints the pipeline kind and the configuration with its derived defaults.
//! Exits with a non-zero status if the configuration is invalid.

use dx12_analyzer::{Config, validate::validate_config};
use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 && args.len() != 3 {
        eprintln!("Usage: {} <config.yaml> [--verbose]", args[0]);
        eprintln!("Validates an analyzer configuration without loading the driver");
        process::exit(1);
    }

    let verbose = args.get(2).is_some_and(|arg| arg == "--verbose");
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install the log subscriber: {e}");
    }

    let config_path = &args[1];
    let mut config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration '{config_path}': {e}");
            process::exit(1);
        }
    };

    let kind = match validate_config(&mut config) {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("Invalid configuration '{config_path}': {e}");
            process::exit(1);
        }
    };
    tracing::info!("Configuration describes {kind:?}");

    // Print the effective configuration, including derived defaults
    match serde_norway::to_string(&config) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Error serializing configuration: {e}");
            process::exit(1);
        }
    }
}
