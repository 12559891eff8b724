//! Binary entry point: wires up tracing, loads the default config, and
//! runs the supervisor until `ctrl_c`.

use rescue_coord_server::matcher::DroneCentric;
use rescue_coord_server::{ServerConfig, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::default();
    let supervisor = Supervisor::new(config, Box::new(DroneCentric));

    supervisor.run_until_ctrl_c().await
}
