//! CLI for the mxbili poster proxy.

mod commands;
mod control_socket;
mod notifier;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use mxbili_core::config;
use mxbili_core::port::parse_port;
use std::path::PathBuf;

use commands::{run_completions, run_config, run_poster, run_serve, run_set_port, run_set_sessdata};

/// Top-level CLI for mxbili.
#[derive(Debug, Parser)]
#[command(name = "mxbili")]
#[command(about = "mxbili: local proxy that fetches video posters with your session", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/mxbili/config.toml.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

fn port_arg(s: &str) -> Result<u16, String> {
    parse_port(s).map_err(|e| e.to_string())
}

/// Cookie values travel as one control-socket line; line breaks are refused.
fn sessdata_arg(s: &str) -> Result<String, String> {
    if s.contains(['\r', '\n']) {
        return Err("cookie value must not contain line breaks".to_string());
    }
    Ok(s.to_string())
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the proxy until interrupted (Ctrl-C).
    Serve {
        /// Listen on this port instead of the configured one (saved as the new setting).
        #[arg(long, value_parser = port_arg)]
        port: Option<u16>,
        /// Session cookie value to inject (saved as the new setting).
        #[arg(long, value_name = "VALUE", value_parser = sessdata_arg)]
        sessdata: Option<String>,
    },

    /// Change the proxy port. Applies live if `mxbili serve` is running.
    SetPort {
        /// Port number, 1-65535.
        #[arg(value_parser = port_arg)]
        port: u16,
    },

    /// Change the session cookie. An empty value clears it.
    SetSessdata {
        /// SESSDATA cookie value.
        #[arg(value_parser = sessdata_arg)]
        value: String,
    },

    /// Look up a video's poster and print its direct and proxied URLs.
    Poster {
        /// BV id, av id, numeric aid, or video page URL.
        id: String,
        /// Port to build the proxied URL with (defaults to the configured port).
        #[arg(long, value_parser = port_arg)]
        port: Option<u16>,
    },

    /// Print the config file location and contents.
    Config,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell, &mut Cli::command());
            return Ok(());
        }

        let path = match cli.config_path {
            Some(p) => p,
            None => config::config_path()?,
        };
        let cfg = config::load_or_init_at(&path)?;
        tracing::debug!("loaded config from {}: {:?}", path.display(), cfg);

        match cli.command {
            CliCommand::Serve { port, sessdata } => {
                run_serve(&path, &cfg, port, sessdata.as_deref()).await?
            }
            CliCommand::SetPort { port } => run_set_port(&path, port).await?,
            CliCommand::SetSessdata { value } => run_set_sessdata(&path, &value).await?,
            CliCommand::Poster { id, port } => run_poster(&cfg, &id, port).await?,
            CliCommand::Config => run_config(&path).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
