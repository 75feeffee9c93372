//! Listener lifecycle: start, restart on another port, stop.

use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::error::ProxyError;
use super::forward::{self, ProxyState};
use super::options::ProxyOptions;

/// How long `stop` waits for in-flight responses before cutting them off.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One bound listener and the task serving it.
struct Listener {
    port: u16,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Listener {
    async fn bind(port: u16, state: Arc<ProxyState>) -> Result<Self, ProxyError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let tcp = TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::from_bind(port, e))?;
        let port = tcp
            .local_addr()
            .map_err(|e| ProxyError::from_bind(port, e))?
            .port();

        let router = Router::new().fallback(forward::forward).with_state(state);
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(tcp, router).with_graceful_shutdown(async move {
                let _ = signal.await;
            });
            if let Err(e) = serve.await {
                tracing::error!(port, "proxy listener failed: {}", e);
            }
            tracing::debug!(port, "proxy listener closed");
        });
        tracing::info!(port, "proxy listening on 127.0.0.1:{}", port);
        Ok(Self {
            port,
            shutdown,
            task,
        })
    }

    /// Stops accepting immediately; waits up to `SHUTDOWN_GRACE` for open
    /// connections to drain.
    async fn close(self) {
        let Listener {
            port,
            shutdown,
            mut task,
        } = self;
        let _ = shutdown.send(());
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            tracing::warn!(port, "proxy connections still open after {:?}; aborting", SHUTDOWN_GRACE);
            task.abort();
            let _ = task.await;
        }
    }
}

/// Handle to the local proxy.
///
/// Holds at most one listener. The cookie and upstream options live in state
/// shared with connection tasks, so they outlive restarts.
pub struct ProxyServer {
    state: Arc<ProxyState>,
    listener: Option<Listener>,
}

impl ProxyServer {
    /// Bind `127.0.0.1:port` and start serving. Port 0 asks the OS for one;
    /// [`ProxyServer::port`] reports what was bound.
    pub async fn start(
        port: u16,
        cookie: Option<String>,
        options: ProxyOptions,
    ) -> Result<Self, ProxyError> {
        let client = options.build_client()?;
        let state = Arc::new(ProxyState::new(options, client, cookie));
        let listener = Listener::bind(port, Arc::clone(&state)).await?;
        Ok(Self {
            state,
            listener: Some(listener),
        })
    }

    /// Bound port, or `None` once stopped (or after a failed restart).
    pub fn port(&self) -> Option<u16> {
        self.listener.as_ref().map(|l| l.port)
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    pub fn cookie(&self) -> Option<String> {
        self.state.cookie()
    }

    /// Swap the injected cookie. Open connections stay up; the next request
    /// picks up the new value.
    pub fn reconfigure_cookie(&self, cookie: Option<String>) {
        tracing::debug!(with_cookie = cookie.is_some(), "proxy cookie reconfigured");
        self.state.set_cookie(cookie);
    }

    /// Close the current listener and bind `port`.
    ///
    /// On failure the server stays stopped and the error is returned; it
    /// never keeps reporting the old port.
    pub async fn restart(&mut self, port: u16) -> Result<u16, ProxyError> {
        if port != 0 && self.port() == Some(port) {
            return Ok(port);
        }
        if let Some(old) = self.listener.take() {
            tracing::info!(from = old.port, to = port, "restarting proxy");
            old.close().await;
        }
        let listener = Listener::bind(port, Arc::clone(&self.state)).await?;
        let bound = listener.port;
        self.listener = Some(listener);
        Ok(bound)
    }

    /// Close the listener and release the port. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            tracing::info!(port = listener.port, "stopping proxy");
            listener.close().await;
        }
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = listener.shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    fn options() -> ProxyOptions {
        let cfg = UpstreamConfig {
            use_system_proxy: false,
            ..UpstreamConfig::default()
        };
        ProxyOptions::from_config(&cfg).unwrap()
    }

    #[tokio::test]
    async fn start_reports_bound_port_and_stop_is_idempotent() {
        let mut server = ProxyServer::start(0, None, options()).await.unwrap();
        let port = server.port().unwrap();
        assert_ne!(port, 0);
        assert!(server.is_running());

        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.port(), None);
        server.stop().await;

        let rebound = std::net::TcpListener::bind(("127.0.0.1", port));
        assert!(rebound.is_ok(), "port should be released after stop");
    }

    #[tokio::test]
    async fn start_on_occupied_port_is_address_in_use() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let err = ProxyServer::start(port, None, options()).await.err().unwrap();
        assert!(err.is_address_in_use(), "got {err}");
    }

    #[tokio::test]
    async fn failed_restart_leaves_server_stopped() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let busy = holder.local_addr().unwrap().port();
        let mut server = ProxyServer::start(0, Some("a".into()), options()).await.unwrap();

        let err = server.restart(busy).await.unwrap_err();
        assert!(err.is_address_in_use());
        assert!(!server.is_running());
        assert_eq!(server.cookie().as_deref(), Some("a"));

        let port = server.restart(0).await.unwrap();
        assert_eq!(server.port(), Some(port));
    }

    #[tokio::test]
    async fn restart_to_same_port_is_a_no_op() {
        let mut server = ProxyServer::start(0, None, options()).await.unwrap();
        let port = server.port().unwrap();
        assert_eq!(server.restart(port).await.unwrap(), port);
        assert_eq!(server.port(), Some(port));
        server.stop().await;
    }
}
