// src/main.rs

//! The main entry point for the account service.

use accountd::config::Config;
use accountd::console::ConsoleDesktop;
use accountd::server;
use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("accountd version {VERSION}");
        return Ok(());
    }

    // The configuration file is optional at its default location; an
    // explicitly named one must exist.
    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());
    let config_path = explicit_config.unwrap_or("accountd.toml");

    let mut config = if explicit_config.is_some() || std::path::Path::new(config_path).exists() {
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    if let Some(index) = args.iter().position(|arg| arg == "--socket") {
        match args.get(index + 1) {
            Some(path) => config.socket_path = PathBuf::from(path),
            None => {
                eprintln!("--socket flag requires a value");
                std::process::exit(1);
            }
        }
    }

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    info!("Starting accountd {}", VERSION);
    let desktop = Arc::new(ConsoleDesktop::new());
    if let Err(e) = server::run(config, desktop).await {
        error!("Account service error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
