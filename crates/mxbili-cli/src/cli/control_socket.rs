//! Control socket: server (during `mxbili serve`) and client (for `set-port`
//! and `set-sessdata`).
//! Protocol: one line per command: "port <value>" or "sessdata <value>".
//! An empty sessdata value clears the cookie.

use anyhow::Result;
use mxbili_core::ProxySession;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, PartialEq, Eq)]
pub enum ControlCommand {
    Port(String),
    Sessdata(String),
}

/// Parses one protocol line. Unknown commands yield `None`.
pub fn parse_line(line: &str) -> Option<ControlCommand> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        "port" => Some(ControlCommand::Port(arg.trim().to_string())),
        "sessdata" => Some(ControlCommand::Sessdata(arg.to_string())),
        _ => None,
    }
}

fn dispatch(session: &ProxySession, line: &str) {
    match parse_line(line) {
        Some(ControlCommand::Port(value)) => {
            if let Err(e) = session.edit_port(&value) {
                tracing::warn!("control socket: {}", e);
            }
        }
        Some(ControlCommand::Sessdata(value)) => session.edit_sessdata(&value),
        None => tracing::debug!(line, "control socket: ignoring unknown command"),
    }
}

/// Binds `path` and spawns a task that feeds each command line into the
/// session's debounced edit path.
pub fn spawn_control_listener(
    session: Arc<ProxySession>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let session = Arc::clone(&session);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            dispatch(&session, &line);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends one line to a running `serve`. Returns false when nothing is
/// listening (no socket, or a stale one left by a crashed run).
pub async fn send_line(socket_path: &Path, line: &str) -> Result<bool> {
    if line.contains(['\r', '\n']) {
        anyhow::bail!("control command must be a single line");
    }
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(path = %socket_path.display(), "control socket connect: {}", e);
            return Ok(false);
        }
    };
    stream.write_all(format!("{}\n", line).as_bytes()).await?;
    stream.shutdown().await?;
    Ok(true)
}
