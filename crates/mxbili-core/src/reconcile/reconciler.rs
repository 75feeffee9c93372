use std::sync::Arc;

use super::settings::{normalize_sessdata, Settings};
use super::store::SettingsStore;
use crate::notify::{Notice, Notifier};
use crate::port::{PortProbe, PortsExhausted};
use crate::proxy::{ProxyError, ProxyOptions, ProxyServer};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    PortsExhausted(#[from] PortsExhausted),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Keeps the proxy's port and cookie in line with the settings of record.
pub struct Reconciler {
    settings: Settings,
    options: ProxyOptions,
    store: Arc<dyn SettingsStore>,
    probe: Arc<dyn PortProbe>,
    notifier: Arc<dyn Notifier>,
    server: Option<ProxyServer>,
}

impl Reconciler {
    pub fn new(
        settings: Settings,
        options: ProxyOptions,
        store: Arc<dyn SettingsStore>,
        probe: Arc<dyn PortProbe>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            options,
            store,
            probe,
            notifier,
            server: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn server_port(&self) -> Option<u16> {
        self.server.as_ref().and_then(ProxyServer::port)
    }

    pub fn is_running(&self) -> bool {
        self.server.as_ref().is_some_and(ProxyServer::is_running)
    }

    /// Cookie the running proxy injects.
    pub fn server_cookie(&self) -> Option<String> {
        self.server.as_ref().and_then(ProxyServer::cookie)
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.settings).await {
            tracing::warn!("could not persist settings: {:#}", e);
        }
    }

    /// Find a free port at or near `desired`.
    ///
    /// A different answer is announced and becomes the port of record. The
    /// port this reconciler's own proxy holds counts as free.
    pub async fn ensure_port(&mut self, desired: u16) -> Result<u16, ReconcileError> {
        let actual = if self.server_port() == Some(desired) {
            desired
        } else {
            self.probe.find_free_port(desired).await?
        };
        if actual != desired {
            self.notifier.notify(Notice::PortReassigned {
                requested: desired,
                actual,
            });
        }
        if self.settings.port != actual {
            self.settings.port = actual;
            self.persist().await;
        }
        Ok(actual)
    }

    /// Record a new session cookie (blank clears it). Persists only on change.
    pub async fn set_sessdata(&mut self, value: Option<&str>) -> Option<String> {
        let sessdata = normalize_sessdata(value);
        if self.settings.sessdata != sessdata {
            self.settings.sessdata = sessdata.clone();
            self.persist().await;
        }
        sessdata
    }

    /// Make the proxy listen on `port` and inject `cookie`.
    ///
    /// Starts it if there is none, restarts it if the port differs, and
    /// swaps the cookie in place otherwise.
    pub async fn apply_config(
        &mut self,
        port: u16,
        cookie: Option<String>,
    ) -> Result<u16, ReconcileError> {
        let outcome = match self.server.take() {
            Some(mut server) => {
                if server.cookie() != cookie {
                    server.reconfigure_cookie(cookie);
                }
                let restarted = server.restart(port).await;
                self.server = Some(server);
                restarted
            }
            None => ProxyServer::start(port, cookie, self.options.clone())
                .await
                .map(|server| {
                    let bound = server.port().unwrap_or(port);
                    self.server = Some(server);
                    bound
                }),
        };
        match outcome {
            Ok(bound) => Ok(bound),
            Err(e) => {
                if e.is_address_in_use() {
                    self.notifier.notify(Notice::PortConflict { port });
                } else {
                    self.notifier.notify(Notice::ProxyError {
                        message: e.to_string(),
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Activation: settle the port of record, then start the proxy.
    pub async fn start(&mut self) -> Result<u16, ReconcileError> {
        let port = self.ensure_port(self.settings.port).await?;
        let cookie = self.settings.sessdata.clone();
        self.apply_config(port, cookie).await
    }

    /// Settled port edit: probe, persist, move the proxy.
    pub async fn update_port(&mut self, desired: u16) -> Result<u16, ReconcileError> {
        if self.settings.port == desired && self.server_port() == Some(desired) {
            return Ok(desired);
        }
        let port = self.ensure_port(desired).await?;
        let cookie = self.settings.sessdata.clone();
        self.apply_config(port, cookie).await
    }

    /// Settled cookie edit: persist, then hand it to the proxy.
    pub async fn update_sessdata(&mut self, value: Option<&str>) -> Result<(), ReconcileError> {
        let cookie = self.set_sessdata(value).await;
        let port = self.settings.port;
        self.apply_config(port, cookie).await.map(|_| ())
    }

    /// Stop the proxy and release its port.
    pub async fn shutdown(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.stop().await;
        }
    }
}
