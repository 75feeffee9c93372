//! `mxbili set-port` / `mxbili set-sessdata` – change a setting. A running
//! `serve` picks the edit up through the control socket; otherwise the config
//! file is updated for the next run.

use anyhow::Result;
use mxbili_core::config;
use mxbili_core::reconcile::{normalize_sessdata, FileSettingsStore, SettingsStore};
use std::path::Path;

use crate::cli::control_socket;

async fn send_to_running(line: &str) -> bool {
    let Ok(path) = config::control_socket_path() else {
        return false;
    };
    match control_socket::send_line(&path, line).await {
        Ok(sent) => sent,
        Err(e) => {
            tracing::warn!("control socket: {:#}", e);
            false
        }
    }
}

pub async fn run_set_port(config_path: &Path, port: u16) -> Result<()> {
    if send_to_running(&format!("port {}", port)).await {
        println!("Sent port {} to the running proxy", port);
        return Ok(());
    }
    let store = FileSettingsStore::new(config_path);
    let mut settings = store.load().await?;
    settings.port = port;
    store.save(&settings).await?;
    println!("Port set to {} in {}", port, config_path.display());
    Ok(())
}

pub async fn run_set_sessdata(config_path: &Path, value: &str) -> Result<()> {
    if send_to_running(&format!("sessdata {}", value.trim())).await {
        println!("Sent session cookie to the running proxy");
        return Ok(());
    }
    let store = FileSettingsStore::new(config_path);
    let mut settings = store.load().await?;
    settings.sessdata = normalize_sessdata(Some(value));
    store.save(&settings).await?;
    match settings.sessdata {
        Some(_) => println!("Session cookie saved to {}", config_path.display()),
        None => println!("Session cookie cleared in {}", config_path.display()),
    }
    Ok(())
}
