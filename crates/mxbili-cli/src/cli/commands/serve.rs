//! `mxbili serve` – run the proxy until Ctrl-C, accepting live edits on the
//! control socket.

use anyhow::Result;
use mxbili_core::config::{self, MxbiliConfig};
use mxbili_core::port::LocalPortProbe;
use mxbili_core::reconcile::FileSettingsStore;
use mxbili_core::ProxySession;
use std::path::Path;
use std::sync::Arc;

use crate::cli::control_socket;
use crate::cli::notifier::StderrNotifier;

pub async fn run_serve(
    config_path: &Path,
    cfg: &MxbiliConfig,
    port: Option<u16>,
    sessdata: Option<&str>,
) -> Result<()> {
    let store = Arc::new(FileSettingsStore::new(config_path));
    let probe = Arc::new(LocalPortProbe::new(cfg.port_search.span));
    // Flag overrides are persisted and used for the very first bind.
    let session = Arc::new(
        ProxySession::start_with(
            cfg,
            store,
            probe,
            Arc::new(StderrNotifier),
            port,
            sessdata,
        )
        .await?,
    );

    match session.port().await {
        Some(port) => println!("mxbili proxy listening on http://127.0.0.1:{}", port),
        None => eprintln!("mxbili: proxy is not running; change the port with `mxbili set-port`"),
    }

    let socket_path = config::control_socket_path()?;
    let control = match control_socket::spawn_control_listener(Arc::clone(&session), &socket_path) {
        Ok(handle) => {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(path = %socket_path.display(), "control socket unavailable: {:#}", e);
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");

    if let Some(handle) = control {
        handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }
    session.stop().await;
    Ok(())
}
