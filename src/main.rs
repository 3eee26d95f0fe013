//! TLS Forward Proxy command line tool
//!
//! This binary is the command-line interface for the forward proxy.

use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::Arc;

use tls_forward_proxy::common::init_logger;
use tls_forward_proxy::config::{auto_load, CliArgs, ConfigValidator};
use tls_forward_proxy::lifecycle::handle_signals;
use tls_forward_proxy::{Proxy, Result, TlsStore, APP_NAME, VERSION};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // The logger is configured from the loaded values, so errors here go to stderr
    let config = match auto_load(&args) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    init_logger(&config.logging.level, config.logging.timestamp);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Arc<tls_forward_proxy::config::ProxyConfig>) -> Result<()> {
    info!("Starting {} v{}", APP_NAME, VERSION);
    config.log();

    for warning in config.check_warnings() {
        warn!("{}", warning);
    }

    let tls = Arc::new(TlsStore::from_files(config.cert(), config.key())?);
    let proxy = Proxy::bind(Arc::clone(&config), tls).await?;

    let handle = proxy.handle();
    tokio::spawn(async move {
        if let Err(e) = handle_signals(handle).await {
            error!("Signal handling failed: {}", e);
        }
    });

    proxy.run().await
}
