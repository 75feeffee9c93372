//! `mxbili config` – show where the config and log live, and the config itself.

use anyhow::{Context, Result};
use mxbili_core::logging;
use std::path::Path;

pub async fn run_config(path: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read config: {}", path.display()))?;
    println!("# config: {}", path.display());
    if let Ok(log) = logging::log_file_path() {
        println!("# log:    {}", log.display());
    }
    print!("{}", contents);
    Ok(())
}
