//! agent-bridge entry point - the composition root.

use agent_bridge_cli::{Cli, init_logging};
use agent_bridge_proxy::BridgeServer;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let server = BridgeServer::bind(cli.to_config()).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for ctrl-c: {e}"),
        }
    });

    server.run(cancel).await?;
    Ok(())
}
