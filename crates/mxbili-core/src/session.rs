//! Start/stop lifecycle around the reconciler.
//!
//! A [`ProxySession`] is what a host embeds: it loads the settings of record,
//! settles the port, starts the proxy and then feeds user edits through one
//! debouncer per field. Stopping it cancels pending edits and releases the port.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::MxbiliConfig;
use crate::notify::{Notice, Notifier};
use crate::port::{parse_port, InvalidPortInput, PortProbe};
use crate::proxy::ProxyOptions;
use crate::reconcile::{
    normalize_sessdata, Debouncer, ReconcileError, Reconciler, Settings, SettingsStore,
};

pub struct ProxySession {
    reconciler: Arc<Mutex<Reconciler>>,
    port_edits: Debouncer<u16>,
    sessdata_edits: Debouncer<String>,
}

impl ProxySession {
    /// Bring the proxy up.
    ///
    /// A proxy that fails to start is reported through `notifier` and the
    /// session stays alive without one, so a later port edit can recover.
    /// Only invalid upstream options are fatal.
    pub async fn start(
        cfg: &MxbiliConfig,
        store: Arc<dyn SettingsStore>,
        probe: Arc<dyn PortProbe>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ReconcileError> {
        Self::start_with(cfg, store, probe, notifier, None, None).await
    }

    /// Like [`start`](Self::start), with `port`/`sessdata` replacing the
    /// stored values before the first bind. Overrides are persisted.
    pub async fn start_with(
        cfg: &MxbiliConfig,
        store: Arc<dyn SettingsStore>,
        probe: Arc<dyn PortProbe>,
        notifier: Arc<dyn Notifier>,
        port: Option<u16>,
        sessdata: Option<&str>,
    ) -> Result<Self, ReconcileError> {
        let options = ProxyOptions::from_config(&cfg.upstream)?;
        let mut settings = match store.load().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("could not load settings, using config values: {:#}", e);
                Settings::from(cfg)
            }
        };
        let stored = settings.clone();
        if let Some(port) = port {
            settings.port = port;
        }
        if sessdata.is_some() {
            settings.sessdata = normalize_sessdata(sessdata);
        }
        if settings != stored {
            if let Err(e) = store.save(&settings).await {
                tracing::warn!("could not persist startup overrides: {:#}", e);
            }
        }
        let mut reconciler = Reconciler::new(settings, options, store, probe, Arc::clone(&notifier));
        match reconciler.start().await {
            Ok(port) => tracing::info!(port, "proxy session started"),
            Err(ReconcileError::PortsExhausted(e)) => {
                notifier.notify(Notice::ProxyError {
                    message: e.to_string(),
                });
            }
            // already announced by the reconciler
            Err(ReconcileError::Proxy(e)) => tracing::warn!("proxy not started: {}", e),
        }
        let reconciler = Arc::new(Mutex::new(reconciler));

        let r = Arc::clone(&reconciler);
        let port_edits = Debouncer::spawn(cfg.debounce.port(), move |port: u16| {
            let r = Arc::clone(&r);
            async move {
                if let Err(e) = r.lock().await.update_port(port).await {
                    tracing::warn!(port, "port change not applied: {}", e);
                }
            }
        });
        let r = Arc::clone(&reconciler);
        let sessdata_edits = Debouncer::spawn(cfg.debounce.sessdata(), move |value: String| {
            let r = Arc::clone(&r);
            async move {
                if let Err(e) = r.lock().await.update_sessdata(Some(&value)).await {
                    tracing::warn!("cookie change not applied: {}", e);
                }
            }
        });

        Ok(Self {
            reconciler,
            port_edits,
            sessdata_edits,
        })
    }

    /// Port field edit. Invalid text is rejected here and never reaches the
    /// reconciler; valid values settle after the port quiet period.
    pub fn edit_port(&self, input: &str) -> Result<(), InvalidPortInput> {
        let port = parse_port(input)?;
        if !self.port_edits.push(port) {
            tracing::debug!(port, "session stopped; port edit dropped");
        }
        Ok(())
    }

    /// Cookie field edit; blank clears the cookie.
    pub fn edit_sessdata(&self, input: &str) {
        if !self.sessdata_edits.push(input.to_string()) {
            tracing::debug!("session stopped; cookie edit dropped");
        }
    }

    /// Apply a port right away, bypassing the debouncer.
    pub async fn set_port(&self, port: u16) -> Result<u16, ReconcileError> {
        self.reconciler.lock().await.update_port(port).await
    }

    /// Apply a cookie right away, bypassing the debouncer.
    pub async fn set_sessdata(&self, value: Option<&str>) -> Result<(), ReconcileError> {
        self.reconciler.lock().await.update_sessdata(value).await
    }

    pub async fn settings(&self) -> Settings {
        self.reconciler.lock().await.settings().clone()
    }

    /// Port the proxy is bound to, if it is running.
    pub async fn port(&self) -> Option<u16> {
        self.reconciler.lock().await.server_port()
    }

    pub async fn is_running(&self) -> bool {
        self.reconciler.lock().await.is_running()
    }

    /// Discard pending edits and stop the proxy. Safe to call twice.
    pub async fn stop(&self) {
        self.port_edits.cancel();
        self.sessdata_edits.cancel();
        self.reconciler.lock().await.shutdown().await;
        tracing::info!("proxy session stopped");
    }
}
