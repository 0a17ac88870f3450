//! Serve command - run the HTTP front end until SIGINT/SIGTERM

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use pingsync_core::config::Config;
use pingsync_server::{shutdown_signal, AppState, HttpServer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on, overriding `server.bind`
    #[arg(long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(self, mut config: Config) -> Result<()> {
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }

        info!("pingsyncd starting");

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        let state = Arc::new(AppState::new(config, shutdown));
        let server = HttpServer::bind(state).await?;
        let result = server.run().await;

        match &result {
            Ok(()) => info!("pingsyncd shut down gracefully"),
            Err(e) => error!(error = %e, "pingsyncd exiting with error"),
        }
        result
    }
}
