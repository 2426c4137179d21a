use anyhow::Result;
use clap::Parser;
use op_cli::{init_tracing, redirect::run_redirect_server, server_cli::ServerArgs};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.log_level.as_deref());

    let config = args.to_run_config()?;

    // The HTTP responder is a convenience; its failure never stops the gateway.
    if let Some(redirect) = args.to_redirect_config() {
        tokio::spawn(async move {
            if let Err(error) = run_redirect_server(redirect).await {
                warn!(error = %format!("{error:#}"), "http redirect stopped");
            }
        });
    }

    server_core::run_server_with_shutdown(config, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received ctrl-c, no longer accepting connections"),
            Err(error) => {
                warn!(%error, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    })
    .await?;
    Ok(())
}
