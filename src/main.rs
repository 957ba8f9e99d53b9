//! cspc-operator - A Kubernetes operator for OpenEBS CStorPoolCluster resources.
//!
//! This is the main entry point that:
//! - Parses configuration
//! - Initializes structured logging
//! - Starts the health server
//! - Runs the operator until the first termination signal

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cspc_operator::app::{self, OperatorConfig};
use cspc_operator::health::{HealthState, run_health_server};

/// How long the health server gets to finish after the operator stops
const HEALTH_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OperatorConfig::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("cspc_operator=info".parse()?)
        .add_directive("kube=info".parse()?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting cspc-operator");

    let health_state = Arc::new(HealthState::new());
    let health_stop = CancellationToken::new();
    let health_handle = {
        let health_state = health_state.clone();
        let stop = health_stop.clone();
        let addr = config.health_addr;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr, stop).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let result = app::start(&config, Some(health_state)).await;

    health_stop.cancel();
    if tokio::time::timeout(HEALTH_SHUTDOWN_TIMEOUT, health_handle)
        .await
        .is_err()
    {
        error!("Health server did not stop in time");
    }

    if let Err(e) = result {
        let mut chain = vec![e.to_string()];
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        error!(error = %chain.join(": "), "Operator failed");
        #[allow(clippy::exit)]
        std::process::exit(1);
    }

    info!("Operator stopped");
    Ok(())
}
