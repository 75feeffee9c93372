use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default local proxy port.
pub const DEFAULT_PORT: u16 = 2233;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per metadata lookup (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 5,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Quiet periods applied to settings edits before they reach the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub port_ms: u64,
    pub sessdata_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            port_ms: 500,
            sessdata_ms: 500,
        }
    }
}

impl DebounceConfig {
    pub fn port(&self) -> Duration {
        Duration::from_millis(self.port_ms)
    }

    pub fn sessdata(&self) -> Duration {
        Duration::from_millis(self.sessdata_ms)
    }
}

/// Where and how the proxy forwards requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// CDN origin used for plain paths (`/bfs/archive/x.jpg`).
    pub default_origin: String,
    /// Origin written into `Referer` and `Origin` of every forwarded request.
    pub site_origin: String,
    /// Host suffixes the proxy is willing to reach.
    pub allowed_hosts: Vec<String>,
    /// Sent when the local client supplies no `User-Agent`.
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    /// Inbound request bodies above this size are rejected with 413.
    pub max_request_body_bytes: usize,
    /// Honour `HTTPS_PROXY`/`ALL_PROXY` from the environment when reaching upstream.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            default_origin: "https://i0.hdslb.com".to_string(),
            site_origin: "https://www.bilibili.com".to_string(),
            allowed_hosts: vec![
                "hdslb.com".to_string(),
                "bilibili.com".to_string(),
                "biliimg.com".to_string(),
            ],
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            connect_timeout_secs: 10,
            timeout_secs: 30,
            max_request_body_bytes: 1024 * 1024,
            use_system_proxy: true,
        }
    }
}

/// Metadata API used to look up cover images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub api_base: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.bilibili.com".to_string(),
        }
    }
}

/// How far the free-port probe walks upward from the requested port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSearchConfig {
    pub span: u16,
}

impl Default for PortSearchConfig {
    fn default() -> Self {
        Self { span: 100 }
    }
}

/// Global configuration loaded from `~/.config/mxbili/config.toml`.
///
/// `port` and `sessdata` are the settings of record; the reconciler rewrites
/// them when the running proxy has to deviate from what was asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxbiliConfig {
    /// Local port the proxy listens on.
    pub port: u16,
    /// Value of the `SESSDATA` cookie; unlocks high-resolution covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessdata: Option<String>,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub port_search: PortSearchConfig,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Default for MxbiliConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sessdata: None,
            debounce: DebounceConfig::default(),
            upstream: UpstreamConfig::default(),
            resolver: ResolverConfig::default(),
            port_search: PortSearchConfig::default(),
            retry: None,
        }
    }
}

impl MxbiliConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mxbili")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Unix socket a running `mxbili serve` listens on for settings edits.
pub fn control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("mxbili")?.get_state_home();
    Ok(dir.join("control.sock"))
}

/// Load configuration from `path`, creating a default file if none exists.
pub fn load_or_init_at(path: &Path) -> Result<MxbiliConfig> {
    if !path.exists() {
        let default_cfg = MxbiliConfig::default();
        save_to(path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(path)
}

pub fn load_from(path: &Path) -> Result<MxbiliConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&data, path)
}

/// Parse config.toml text. Port 0 is rejected: the proxy needs a fixed port.
pub(crate) fn parse_config(data: &str, path: &Path) -> Result<MxbiliConfig> {
    let cfg: MxbiliConfig =
        toml::from_str(data).with_context(|| format!("parse config: {}", path.display()))?;
    if cfg.port == 0 {
        anyhow::bail!("invalid port 0 in {} (expected 1-65535)", path.display());
    }
    Ok(cfg)
}

/// Write the configuration (creates parent dir if needed).
pub fn save_to(path: &Path, cfg: &MxbiliConfig) -> Result<()> {
    let toml = toml::to_string_pretty(cfg).context("serialize config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}
