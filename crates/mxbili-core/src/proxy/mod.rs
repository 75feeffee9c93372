//! Local header-rewriting proxy.
//!
//! One listener on `127.0.0.1:<port>`. Every inbound request is replayed
//! against the platform CDN with the session cookie and the site's
//! `Referer`/`Origin` injected, and the upstream response is streamed back.

mod error;
pub mod forward;
mod options;
mod server;

pub use error::ProxyError;
pub use forward::ForwardError;
pub use options::ProxyOptions;
pub use server::ProxyServer;
