//! Port/session reconciliation.
//!
//! The reconciler owns the settings of record and the one proxy server, and
//! is the only thing that mutates either. Edits arrive through debouncers so
//! a burst of keystrokes turns into a single restart.

mod debounce;
mod reconciler;
mod settings;
mod store;

pub use debounce::Debouncer;
pub use reconciler::{ReconcileError, Reconciler};
pub use settings::{normalize_sessdata, Settings};
pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore};
