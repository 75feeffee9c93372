//! Persistence of the settings of record.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::settings::Settings;
use crate::config::{self, MxbiliConfig};

/// Where settings live between runs (the host's key-value store, a file, memory).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings>;
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// Persists into the `port`/`sessdata` keys of a config.toml, keeping every
/// other section as it is on disk.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_config(&self) -> Result<MxbiliConfig> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => config::parse_config(&data, &self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MxbiliConfig::default()),
            Err(e) => Err(e).with_context(|| format!("read config: {}", self.path.display())),
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Settings> {
        let cfg = self.read_config().await?;
        Ok(Settings::from(&cfg))
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let mut cfg = self.read_config().await?;
        settings.apply_to(&mut cfg);
        let toml = toml::to_string_pretty(&cfg).context("serialize config")?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, toml)
            .await
            .with_context(|| format!("write config: {}", self.path.display()))?;
        tracing::debug!(port = settings.port, path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// In-memory store; counts saves so callers can tell whether anything was persisted.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
    saves: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Settings {
        self.settings
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Settings> {
        Ok(self.current())
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        *guard = settings.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
