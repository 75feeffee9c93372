//! Port input validation and free-port discovery.
//!
//! Validation happens at the input boundary: a string that is not a canonical
//! port number never reaches the reconciler. Discovery is a capability the
//! reconciler is handed (`PortProbe`) so that tests and embedders can swap in
//! their own notion of "free".

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

/// User-entered port that is non-numeric or outside 1..=65535.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid port {input:?}: expected a number between 1 and 65535")]
pub struct InvalidPortInput {
    pub input: String,
}

/// Parse a port typed by the user.
///
/// Accepts only the canonical decimal form: ASCII digits, no sign, no
/// surrounding whitespace, no leading zero.
pub fn parse_port(input: &str) -> Result<u16, InvalidPortInput> {
    let invalid = || InvalidPortInput {
        input: input.to_string(),
    };
    if input.is_empty() || input.len() > 5 || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if input.starts_with('0') {
        return Err(invalid());
    }
    match input.parse::<u32>() {
        Ok(n) if (1..=65535).contains(&n) => Ok(n as u16),
        _ => Err(invalid()),
    }
}

pub fn is_valid_port(input: &str) -> bool {
    parse_port(input).is_ok()
}

/// No free port was found anywhere in the probe's search space.
#[derive(Debug, thiserror::Error)]
#[error("no free port found near {desired}")]
pub struct PortsExhausted {
    pub desired: u16,
}

/// Finds a free TCP port at or near a requested one.
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn find_free_port(&self, desired: u16) -> Result<u16, PortsExhausted>;
}

/// Probes by binding on the loopback interface.
///
/// Tries `desired`, then up to `span` ports above it, then lets the OS pick
/// an ephemeral port.
#[derive(Debug, Clone)]
pub struct LocalPortProbe {
    span: u16,
}

impl LocalPortProbe {
    pub fn new(span: u16) -> Self {
        Self { span }
    }

    fn candidates(&self, desired: u16) -> impl Iterator<Item = u16> {
        let start = desired.max(1);
        let end = start.saturating_add(self.span);
        start..=end
    }
}

impl Default for LocalPortProbe {
    fn default() -> Self {
        Self::new(100)
    }
}

/// True if `port` can be bound on 127.0.0.1 right now.
pub async fn is_port_free(port: u16) -> bool {
    TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
        .await
        .is_ok()
}

#[async_trait]
impl PortProbe for LocalPortProbe {
    async fn find_free_port(&self, desired: u16) -> Result<u16, PortsExhausted> {
        for port in self.candidates(desired) {
            if is_port_free(port).await {
                if port != desired {
                    tracing::debug!(desired, port, "requested port busy, using nearby port");
                }
                return Ok(port);
            }
        }
        match TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await {
            Ok(listener) => match listener.local_addr() {
                Ok(addr) => Ok(addr.port()),
                Err(_) => Err(PortsExhausted { desired }),
            },
            Err(e) => {
                tracing::warn!(desired, "ephemeral port probe failed: {}", e);
                Err(PortsExhausted { desired })
            }
        }
    }
}
