use std::{sync::Arc, time::Duration};

use notebook_sidecar::{
    bridge::{rpc::RpcClient, ToolBridge},
    build_app,
    config::Config,
    logging,
    supervisor::{ChildSettings, Supervisor, CHILD_PORT},
    AppState,
};
use tracing::{info, warn};

const CHILD_STARTUP_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;

    let supervisor = Arc::new(Supervisor::new(ChildSettings::from_command_line(
        &config.child_program,
        config.child_config_path.clone(),
        CHILD_PORT,
        config.default_notebook_id.clone(),
    )));
    let bridge = Arc::new(ToolBridge::new(
        RpcClient::new(supervisor.settings().endpoint()),
        supervisor.clone(),
        config.mcp_enabled,
    ));

    let task_store_connected = config.service_account_key.is_some();
    if !task_store_connected {
        info!("no service account configured, task listener disabled");
    }

    if config.mcp_enabled {
        match supervisor.start().await {
            Ok(pid) => {
                tokio::time::sleep(CHILD_STARTUP_GRACE).await;
                if bridge.initialize_session().await.is_none() {
                    warn!(pid, "child started without a session, will retry on first call");
                }
            }
            Err(err) => warn!(error = %err, "continuing without child process"),
        }
    }

    let app = build_app(AppState::new(bridge, supervisor.clone(), task_store_connected));
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        mcp_enabled = config.mcp_enabled,
        "server starting"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    if let Err(err) = supervisor.stop().await {
        warn!(error = %err, "failed to stop child process");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
