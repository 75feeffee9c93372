pub mod config;
pub mod logging;

pub mod notify;
pub mod port;
pub mod poster;
pub mod proxy;
pub mod reconcile;
pub mod retry;
pub mod session;

pub use session::ProxySession;
