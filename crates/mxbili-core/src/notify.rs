//! User-visible notices raised by the reconciler.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The requested port was busy; the proxy moved to `actual`.
    PortReassigned { requested: u16, actual: u16 },
    /// Start or restart hit a port that another process holds.
    PortConflict { port: u16 },
    /// Any other proxy failure the user should know about.
    ProxyError { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::PortReassigned { requested, actual } => {
                write!(f, "port {} is already in use, switched to {}", requested, actual)
            }
            Notice::PortConflict { port } => write!(
                f,
                "port {} is already in use; choose another port in the settings",
                port
            ),
            Notice::ProxyError { message } => write!(f, "proxy error: {}", message),
        }
    }
}

/// Sink for notices (the host's toast API, a terminal, a test recorder).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::PortReassigned { .. } => tracing::info!("{}", notice),
            Notice::PortConflict { .. } => tracing::warn!("{}", notice),
            Notice::ProxyError { .. } => tracing::error!("{}", notice),
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
