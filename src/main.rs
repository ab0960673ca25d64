use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ewaste_stage::{
    config::AppConfig,
    hal::sim::SimBench,
    host_link::SocketServer,
    machine::{dispatcher::Machine, MachineManager},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting ewaste-stage on a simulated bench");

    let bench = Arc::new(SimBench::for_machine(&config.machine, &config.bench));
    let machine = Machine::from_config(&config.machine, config.protocol.clone(), bench.clone());
    bench.start_timers(Duration::from_micros(config.machine.z.control_interval_us));

    let manager = Arc::new(MachineManager::new(machine, config.manager.clone()));

    let mut server = SocketServer::new(config.server.clone(), manager.clone());
    server.start().await?;

    info!("Send 64-byte reports to {}", config.server.socket_path);
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    server.shutdown().await?;
    manager.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
