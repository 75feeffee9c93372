use std::io;

/// Failures that keep the proxy from listening.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Another process already holds the port.
    #[error("port {port} is already in use")]
    AddressInUse { port: u16 },
    /// Any other OS-level bind failure (permissions, invalid address).
    #[error("cannot listen on 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("invalid upstream setting `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("build upstream HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl ProxyError {
    pub(crate) fn from_bind(port: u16, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::AddrInUse {
            ProxyError::AddressInUse { port }
        } else {
            ProxyError::Bind { port, source }
        }
    }

    pub fn is_address_in_use(&self) -> bool {
        matches!(self, ProxyError::AddressInUse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_in_use_is_distinguished() {
        let e = ProxyError::from_bind(2233, io::Error::from(io::ErrorKind::AddrInUse));
        assert!(e.is_address_in_use());
        assert_eq!(e.to_string(), "port 2233 is already in use");

        let e = ProxyError::from_bind(80, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(e, ProxyError::Bind { port: 80, .. }));
        assert!(!e.is_address_in_use());
    }
}
