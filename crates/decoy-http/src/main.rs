//! Decoy server binary.
//!
//! Usage:
//!   decoy --port 1080 [--config decoy.yaml] [--initialization-json expectations.json]

use anyhow::Context;
use clap::Parser;
use decoy_http::config::Config;
use decoy_http::server::MockServer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Decoy - programmable HTTP mock and proxy server
#[derive(Parser, Debug)]
#[command(name = "decoy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (0 picks a free port)
    #[arg(short, long, env = "DECOY_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "DECOY_HOST")]
    host: Option<String>,

    /// YAML configuration file
    #[arg(short, long, env = "DECOY_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file of expectations to load at start-up
    #[arg(short, long, env = "DECOY_INITIALIZATION_JSON")]
    initialization_json: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, env = "DECOY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format: text (default), json
    #[arg(long, env = "DECOY_LOG_FORMAT", default_value = "text")]
    log_format: String,
}

impl Args {
    /// Load the config file, if any, and apply command-line overrides.
    fn into_config(self) -> anyhow::Result<(Config, String)> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(path) = self.initialization_json {
            config.initialization.expectations_file = Some(path);
        }
        if let Some(level) = self.log_level {
            config.log_level = Some(level);
        }
        config.validate().context("Invalid configuration")?;
        Ok((config, self.log_format))
    }
}

fn init_tracing(level: Option<&str>, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, log_format) = Args::parse().into_config()?;
    init_tracing(config.log_level.as_deref(), &log_format);

    let server = MockServer::start(&config).await?;
    info!("Control plane available at http://{}/mockserver/", server.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    server.shutdown().await;
    Ok(())
}
