//! Echo tool server for running the sidecar locally without the notebook
//! tool. Accepts the same command line the supervisor passes to the real
//! child, so it can be selected with `NOTEBOOKLM_MCP_BIN=echo-child`.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use notebook_sidecar::{echo::build_echo_app, logging, supervisor::ChildConfigFile};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "echo-child", version, about = "Local echo MCP tool server")]
struct Cli {
    /// Child config file written by the sidecar
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the echo tool
    Server {
        #[arg(long, default_value = "http")]
        transport: String,
        #[arg(long, default_value_t = 8001)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();
    let cli = Cli::parse();

    if let Some(path) = cli.config.as_deref() {
        match read_config(path).await {
            Ok(config) => info!(
                notebook = %config.default_notebook_id,
                headless = config.headless,
                "loaded child config"
            ),
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable config"),
        }
    }

    let Command::Server { transport, port } = cli.command;
    if transport != "http" {
        return Err(format!("unsupported transport: {transport}").into());
    }

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
    info!(port, "echo child listening");
    axum::serve(listener, build_echo_app().into_make_service()).await?;
    Ok(())
}

async fn read_config(path: &std::path::Path) -> Result<ChildConfigFile, Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&contents)?)
}
