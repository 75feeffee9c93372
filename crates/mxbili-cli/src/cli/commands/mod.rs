//! CLI command handlers, one file per command.

mod completions;
mod config;
mod poster;
mod serve;
mod settings;

pub use completions::run_completions;
pub use config::run_config;
pub use poster::run_poster;
pub use serve::run_serve;
pub use settings::{run_set_port, run_set_sessdata};
